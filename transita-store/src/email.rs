use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::app_config::SmtpConfig;
use transita_core::notify::{BookingEmail, Notifier, NotifyError, OperatorNotice};

/// Plain-text booking emails over async SMTP. The operator mailbox gets a
/// copy of every booking and cancellation.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    operator_email: String,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, operator_email: String) -> Result<Self, NotifyError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.port);

        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
            operator_email,
        })
    }

    async fn send(&self, to: &str, subject: String, body: String) -> Result<(), NotifyError> {
        let message = Message::builder()
            .from(self.from_address.parse().map_err(|e: lettre::address::AddressError| {
                NotifyError::Address(e.to_string())
            })?)
            .to(to.parse().map_err(|e: lettre::address::AddressError| {
                NotifyError::Address(e.to_string())
            })?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_booking_confirmation(&self, email: &BookingEmail) -> Result<(), NotifyError> {
        let to = email
            .recipient_email
            .as_ref()
            .ok_or_else(|| NotifyError::MissingRecipient(email.booking_reference.clone()))?;
        let subject = format!("Booking Confirmed - {}", email.booking_reference);
        self.send(to.as_str(), subject, confirmation_body(email)).await
    }

    async fn send_booking_cancellation(&self, email: &BookingEmail) -> Result<(), NotifyError> {
        let to = email
            .recipient_email
            .as_ref()
            .ok_or_else(|| NotifyError::MissingRecipient(email.booking_reference.clone()))?;
        let subject = format!("Booking Cancelled - {}", email.booking_reference);
        self.send(to.as_str(), subject, cancellation_body(email)).await
    }

    async fn send_operator_notification(
        &self,
        email: &BookingEmail,
        notice: OperatorNotice,
    ) -> Result<(), NotifyError> {
        let subject = match notice {
            OperatorNotice::NewBooking => format!("New booking {}", email.booking_reference),
            OperatorNotice::Cancellation => format!("Cancellation {}", email.booking_reference),
        };
        self.send(&self.operator_email, subject, operator_body(email, notice)).await
    }
}

fn seats_line(seats: &[i32]) -> String {
    seats.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(", ")
}

fn price_line(total_price_minor: Option<i32>) -> String {
    match total_price_minor {
        Some(minor) => format!("{:.2}", minor as f64 / 100.0),
        None => "to be advised".to_string(),
    }
}

fn journey_block(email: &BookingEmail) -> String {
    format!(
        "Route: {} ({} -> {})\nDate: {}\nDeparture: {}\nBus: {}\nSeats: {}",
        email.route_number,
        email.origin,
        email.destination,
        email.journey_date.format("%d %b %Y"),
        email.departure_time,
        email.bus_number,
        seats_line(&email.seat_numbers),
    )
}

fn confirmation_body(email: &BookingEmail) -> String {
    format!(
        "Dear {},\n\nYour booking {} is confirmed.\n\n{}\nAmount: {}\n\nPlease arrive at the boarding point 15 minutes before departure.\n",
        email.recipient_name,
        email.booking_reference,
        journey_block(email),
        price_line(email.total_price_minor),
    )
}

fn cancellation_body(email: &BookingEmail) -> String {
    format!(
        "Dear {},\n\nYour booking {} has been cancelled and the seats released.\n\n{}\n",
        email.recipient_name,
        email.booking_reference,
        journey_block(email),
    )
}

fn operator_body(email: &BookingEmail, notice: OperatorNotice) -> String {
    let heading = match notice {
        OperatorNotice::NewBooking => "New booking received",
        OperatorNotice::Cancellation => "Booking cancelled",
    };
    format!(
        "{}: {}\nPassenger: {}\n\n{}\nAmount: {}\n",
        heading,
        email.booking_reference,
        email.recipient_name,
        journey_block(email),
        price_line(email.total_price_minor),
    )
}

/// Stand-in when SMTP is not configured: logs instead of sending, so the
/// outbox drains cleanly in development.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_booking_confirmation(&self, email: &BookingEmail) -> Result<(), NotifyError> {
        info!("Email delivery disabled; skipping confirmation for {}", email.booking_reference);
        Ok(())
    }

    async fn send_booking_cancellation(&self, email: &BookingEmail) -> Result<(), NotifyError> {
        info!("Email delivery disabled; skipping cancellation for {}", email.booking_reference);
        Ok(())
    }

    async fn send_operator_notification(
        &self,
        email: &BookingEmail,
        _notice: OperatorNotice,
    ) -> Result<(), NotifyError> {
        info!("Email delivery disabled; skipping operator notice for {}", email.booking_reference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use transita_shared::pii::Contact;

    fn email() -> BookingEmail {
        BookingEmail {
            booking_reference: "TRN-1700000000-AB12CD".to_string(),
            recipient_name: "Asha Rao".to_string(),
            recipient_email: Some(Contact("asha@example.com".to_string())),
            route_number: "R42".to_string(),
            origin: "Mysuru".to_string(),
            destination: "Bengaluru".to_string(),
            journey_date: NaiveDate::from_ymd_opt(2030, 6, 15).unwrap(),
            departure_time: "08:30".to_string(),
            bus_number: "KA-01-F-7777".to_string(),
            seat_numbers: vec![12, 13],
            total_price_minor: Some(90000),
        }
    }

    #[test]
    fn test_confirmation_body_lists_journey_details() {
        let body = confirmation_body(&email());
        assert!(body.contains("TRN-1700000000-AB12CD"));
        assert!(body.contains("Mysuru -> Bengaluru"));
        assert!(body.contains("Seats: 12, 13"));
        assert!(body.contains("Amount: 900.00"));
    }

    #[test]
    fn test_missing_price_is_tolerated() {
        let mut view = email();
        view.total_price_minor = None;
        assert!(confirmation_body(&view).contains("Amount: to be advised"));
    }

    #[test]
    fn test_operator_body_names_the_notice() {
        let body = operator_body(&email(), OperatorNotice::Cancellation);
        assert!(body.starts_with("Booking cancelled"));
        assert!(body.contains("Asha Rao"));
    }
}
