use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A specific bus run: one route, one date, one vehicle, a fixed number of
/// seats. Seat state is stored only as the booked-seat set; the available
/// count is always derived from it, so the two can never drift apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub route_id: Uuid,
    /// Human-facing identifier shown on tickets and manifests.
    pub schedule_ref: String,
    pub journey_date: NaiveDate,
    /// "HH:MM" wall-clock strings as entered by operations staff.
    pub departure_time: String,
    pub arrival_time: String,
    pub bus_number: String,
    pub driver_name: Option<String>,
    pub capacity: i32,
    /// Sorted set of seat numbers currently held by confirmed bookings.
    pub booked_seats: Vec<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SeatLedgerError {
    #[error("No seats selected")]
    EmptySelection,

    #[error("Duplicate seat numbers in selection: {0:?}")]
    DuplicateSeats(Vec<i32>),

    #[error("Invalid seat numbers {seats:?}: must be between 1 and {capacity}")]
    InvalidSeat { seats: Vec<i32>, capacity: i32 },

    #[error("Seats {0:?} are already booked")]
    Conflict(Vec<i32>),

    #[error("Not enough seats available: requested {requested}, available {available}")]
    CapacityExceeded { requested: i32, available: i32 },
}

impl Schedule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        route_id: Uuid,
        journey_date: NaiveDate,
        departure_time: String,
        arrival_time: String,
        bus_number: String,
        driver_name: Option<String>,
        capacity: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            route_id,
            schedule_ref: generate_schedule_ref(),
            journey_date,
            departure_time,
            arrival_time,
            bus_number,
            driver_name,
            capacity,
            booked_seats: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Derived, never stored.
    pub fn available_seats(&self) -> i32 {
        self.capacity - self.booked_seats.len() as i32
    }

    pub fn is_seat_booked(&self, seat: i32) -> bool {
        self.booked_seats.contains(&seat)
    }

    /// Check a seat selection against this ledger without mutating it.
    /// Validation order: shape of the request first (empty, duplicates,
    /// out-of-range), then conflicts, then capacity.
    pub fn validate_seat_request(&self, seats: &[i32]) -> Result<(), SeatLedgerError> {
        if seats.is_empty() {
            return Err(SeatLedgerError::EmptySelection);
        }

        let mut seen = Vec::with_capacity(seats.len());
        let mut duplicates = Vec::new();
        for &s in seats {
            if seen.contains(&s) {
                if !duplicates.contains(&s) {
                    duplicates.push(s);
                }
            } else {
                seen.push(s);
            }
        }
        if !duplicates.is_empty() {
            return Err(SeatLedgerError::DuplicateSeats(duplicates));
        }

        let invalid: Vec<i32> = seats
            .iter()
            .copied()
            .filter(|&s| s < 1 || s > self.capacity)
            .collect();
        if !invalid.is_empty() {
            return Err(SeatLedgerError::InvalidSeat {
                seats: invalid,
                capacity: self.capacity,
            });
        }

        let conflicts: Vec<i32> = seats
            .iter()
            .copied()
            .filter(|s| self.booked_seats.contains(s))
            .collect();
        if !conflicts.is_empty() {
            return Err(SeatLedgerError::Conflict(conflicts));
        }

        if self.available_seats() < seats.len() as i32 {
            return Err(SeatLedgerError::CapacityExceeded {
                requested: seats.len() as i32,
                available: self.available_seats(),
            });
        }

        Ok(())
    }

    /// Validate and take the seats. In-memory counterpart of the store's
    /// conditional update; used by the in-memory repository and tests.
    pub fn reserve(&mut self, seats: &[i32]) -> Result<(), SeatLedgerError> {
        self.validate_seat_request(seats)?;
        self.booked_seats.extend_from_slice(seats);
        self.booked_seats.sort_unstable();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Return seats to the pool. Removing a seat that is not held is a
    /// no-op, not an error, so a release can always be replayed safely.
    pub fn release(&mut self, seats: &[i32]) {
        self.booked_seats.retain(|s| !seats.contains(s));
        self.updated_at = Utc::now();
    }

    /// The instant this run leaves, for the manifest past-date guards.
    /// An unparseable or empty departure time falls back to end of day,
    /// which keeps same-day manifests editable until midnight.
    pub fn departure_instant(&self) -> DateTime<Utc> {
        let time = NaiveTime::parse_from_str(&self.departure_time, "%H:%M")
            .unwrap_or_else(|_| NaiveTime::from_hms_opt(23, 59, 59).unwrap());
        Utc.from_utc_datetime(&self.journey_date.and_time(time))
    }
}

fn generate_schedule_ref() -> String {
    let timestamp = Utc::now().timestamp();
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("SCH-{}-{}", timestamp, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(capacity: i32) -> Schedule {
        Schedule::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2030, 6, 15).unwrap(),
            "08:30".to_string(),
            "14:00".to_string(),
            "KA-01-F-7777".to_string(),
            Some("R. Gowda".to_string()),
            capacity,
        )
    }

    #[test]
    fn test_reserve_and_release_roundtrip() {
        let mut s = schedule(40);
        s.reserve(&[3, 1, 2]).unwrap();

        assert_eq!(s.booked_seats, vec![1, 2, 3]);
        assert_eq!(s.available_seats(), 37);

        s.release(&[2]);
        assert_eq!(s.booked_seats, vec![1, 3]);
        assert_eq!(s.available_seats(), 38);
    }

    #[test]
    fn test_conflict_names_overlapping_seats() {
        let mut s = schedule(40);
        s.reserve(&[5, 6]).unwrap();

        let err = s.reserve(&[6, 7]).unwrap_err();
        assert_eq!(err, SeatLedgerError::Conflict(vec![6]));
        // Failed reservation must not change state
        assert_eq!(s.booked_seats, vec![5, 6]);
    }

    #[test]
    fn test_seat_numbers_bounded_by_capacity() {
        let s = schedule(12);
        let err = s.validate_seat_request(&[0, 5, 13]).unwrap_err();
        assert_eq!(
            err,
            SeatLedgerError::InvalidSeat { seats: vec![0, 13], capacity: 12 }
        );
    }

    #[test]
    fn test_full_bus_reports_conflict_on_held_seats() {
        let mut s = schedule(2);
        s.reserve(&[1, 2]).unwrap();

        let err = s.validate_seat_request(&[1]).unwrap_err();
        assert_eq!(err, SeatLedgerError::Conflict(vec![1]));
    }

    #[test]
    fn test_capacity_exceeded_under_ledger_drift() {
        // A clean ledger can never hit the capacity check: disjoint,
        // in-range seats always fit. Legacy data with duplicate entries in
        // the booked set can, and the ledger must refuse rather than
        // oversell.
        let mut s = schedule(2);
        s.booked_seats = vec![1, 1];

        let err = s.validate_seat_request(&[2]).unwrap_err();
        assert_eq!(err, SeatLedgerError::CapacityExceeded { requested: 1, available: 0 });
    }

    #[test]
    fn test_duplicate_and_empty_selection_rejected() {
        let s = schedule(40);
        assert_eq!(s.validate_seat_request(&[]).unwrap_err(), SeatLedgerError::EmptySelection);
        assert_eq!(
            s.validate_seat_request(&[4, 4, 9]).unwrap_err(),
            SeatLedgerError::DuplicateSeats(vec![4])
        );
    }

    #[test]
    fn test_release_of_unheld_seat_is_noop() {
        let mut s = schedule(40);
        s.reserve(&[10]).unwrap();
        s.release(&[10, 11]);
        assert_eq!(s.booked_seats, Vec::<i32>::new());
        assert_eq!(s.available_seats(), 40);
    }

    #[test]
    fn test_departure_instant_parses_time() {
        let s = schedule(40);
        let dep = s.departure_instant();
        assert_eq!(dep.to_rfc3339(), "2030-06-15T08:30:00+00:00");
    }

    #[test]
    fn test_departure_instant_defaults_to_end_of_day() {
        let mut s = schedule(40);
        s.departure_time = "half past eight".to_string();
        let dep = s.departure_instant();
        assert_eq!(dep.to_rfc3339(), "2030-06-15T23:59:59+00:00");
    }
}
