use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Succeeded,
    Failed,
}

/// Outcome of a charge attempt against the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub reference: String,
    pub amount_minor: i32,
    pub status: PaymentStatus,
    pub charged_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment gateway rejected the charge: {0}")]
    Rejected(String),

    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// Gateway seam. Only the simulated adapter exists; real gateway
/// integration is out of scope.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    async fn charge(&self, reference: &str, amount_minor: i32) -> Result<PaymentReceipt, PaymentError>;
}

/// Simulated gateway: every charge succeeds unless constructed with
/// `failing()`, which lets tests exercise the failure path.
pub struct SimulatedGateway {
    fail_charges: bool,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self { fail_charges: false }
    }

    pub fn failing() -> Self {
        Self { fail_charges: true }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentAdapter for SimulatedGateway {
    async fn charge(&self, reference: &str, amount_minor: i32) -> Result<PaymentReceipt, PaymentError> {
        if self.fail_charges {
            return Err(PaymentError::Rejected(format!("simulated decline for {}", reference)));
        }

        Ok(PaymentReceipt {
            reference: format!("pay_{}", reference.to_lowercase()),
            amount_minor,
            status: PaymentStatus::Succeeded,
            charged_at: Utc::now(),
        })
    }
}
