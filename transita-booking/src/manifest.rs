use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use transita_shared::pii::Contact;
use uuid::Uuid;

use crate::models::{Booking, BookingStatus, Gender};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManifestStatus {
    Draft,
    Finalized,
    Departed,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BoardingStatus {
    NotBoarded,
    Boarded,
    NoShow,
}

/// One roster line. `entry_id` is stable across regenerations as long as
/// the same (booking, passenger_index) slot survives, so boarding-status
/// edits keyed on it are never silently transferred to another traveller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestPassenger {
    pub entry_id: Uuid,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub booking_reference: String,
    pub name: String,
    /// None for legacy entries synthesized from a bare seat count.
    pub age: Option<i32>,
    pub gender: Option<Gender>,
    /// Position of this traveller within its booking; the reconciliation key.
    pub passenger_index: i32,
    pub contact_phone: Option<Contact>,
    pub boarding_status: BoardingStatus,
}

/// The boarding roster for one schedule: a projection over confirmed
/// bookings, rebuilt on every booking change and always disposable. Boarding
/// status is the only state that is not re-derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerManifest {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub passengers: Vec<ManifestPassenger>,
    pub total_passengers: i32,
    /// Sum of `seats` over confirmed bookings. Can differ from
    /// `total_passengers` where legacy data disagrees with itself.
    pub total_seats_booked: i32,
    pub manifest_status: ManifestStatus,
    pub finalized_at: Option<DateTime<Utc>>,
    pub departed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Invalid manifest transition from {from:?} to {to:?}")]
    InvalidTransition { from: ManifestStatus, to: ManifestStatus },

    #[error("Journey has already departed; the manifest can no longer be modified")]
    JourneyDeparted,

    #[error("Passenger entry not found in manifest: {0}")]
    PassengerNotFound(Uuid),
}

impl PassengerManifest {
    /// Rebuild the roster from the confirmed bookings of a schedule,
    /// reconciling against the previous manifest. Matching is keyed by
    /// (booking_id, passenger_index): a surviving slot keeps its entry id
    /// and boarding status, a new slot starts as not-boarded, a vanished
    /// slot (cancelled booking) is dropped. Regenerating twice with the
    /// same bookings yields an identical manifest.
    pub fn regenerate(
        schedule_id: Uuid,
        bookings: &[Booking],
        previous: Option<&PassengerManifest>,
    ) -> PassengerManifest {
        let mut carried: HashMap<(Uuid, i32), &ManifestPassenger> = HashMap::new();
        if let Some(prev) = previous {
            for entry in &prev.passengers {
                carried.insert((entry.booking_id, entry.passenger_index), entry);
            }
        }

        // Deterministic scan order keeps regeneration idempotent regardless
        // of how the store returns rows.
        let mut confirmed: Vec<&Booking> = bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .collect();
        confirmed.sort_by_key(|b| (b.created_at, b.id));

        let mut passengers = Vec::new();
        let mut total_seats_booked = 0;

        for booking in confirmed {
            total_seats_booked += booking.seats;

            if booking.is_legacy() {
                // One synthesized traveller per seat, named after the booker.
                for index in 0..booking.seats {
                    passengers.push(Self::entry(booking, index, None, None, &carried));
                }
            } else {
                for (index, passenger) in booking.passengers.iter().enumerate() {
                    passengers.push(Self::entry(
                        booking,
                        index as i32,
                        Some(passenger.name.clone()),
                        Some((passenger.age, passenger.gender)),
                        &carried,
                    ));
                }
            }
        }

        let total_passengers = passengers.len() as i32;
        let now = Utc::now();

        match previous {
            Some(prev) => PassengerManifest {
                id: prev.id,
                schedule_id,
                passengers,
                total_passengers,
                total_seats_booked,
                manifest_status: prev.manifest_status,
                finalized_at: prev.finalized_at,
                departed_at: prev.departed_at,
                created_at: prev.created_at,
                updated_at: now,
            },
            None => PassengerManifest {
                id: Uuid::new_v4(),
                schedule_id,
                passengers,
                total_passengers,
                total_seats_booked,
                manifest_status: ManifestStatus::Draft,
                finalized_at: None,
                departed_at: None,
                created_at: now,
                updated_at: now,
            },
        }
    }

    fn entry(
        booking: &Booking,
        index: i32,
        name: Option<String>,
        details: Option<(i32, Gender)>,
        carried: &HashMap<(Uuid, i32), &ManifestPassenger>,
    ) -> ManifestPassenger {
        let prior = carried.get(&(booking.id, index));
        ManifestPassenger {
            entry_id: prior.map(|p| p.entry_id).unwrap_or_else(Uuid::new_v4),
            booking_id: booking.id,
            user_id: booking.user_id,
            booking_reference: booking.booking_reference.clone(),
            name: name.unwrap_or_else(|| booking.contact_name.clone()),
            age: details.map(|(age, _)| age),
            gender: details.map(|(_, gender)| gender),
            passenger_index: index,
            contact_phone: booking.contact_phone.clone(),
            boarding_status: prior
                .map(|p| p.boarding_status)
                .unwrap_or(BoardingStatus::NotBoarded),
        }
    }

    /// Draft -> Finalized. Blocked once the journey has departed.
    pub fn finalize(
        &mut self,
        departure_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), ManifestError> {
        Self::guard_departure(departure_at, now)?;
        if self.manifest_status != ManifestStatus::Draft {
            return Err(ManifestError::InvalidTransition {
                from: self.manifest_status,
                to: ManifestStatus::Finalized,
            });
        }
        self.manifest_status = ManifestStatus::Finalized;
        self.finalized_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Finalized -> Departed. Same past-date guard as finalize.
    pub fn mark_departed(
        &mut self,
        departure_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), ManifestError> {
        Self::guard_departure(departure_at, now)?;
        if self.manifest_status != ManifestStatus::Finalized {
            return Err(ManifestError::InvalidTransition {
                from: self.manifest_status,
                to: ManifestStatus::Departed,
            });
        }
        self.manifest_status = ManifestStatus::Departed;
        self.departed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Departed -> Completed. Nothing in the system triggers this; it only
    /// happens through an explicit administrative call.
    pub fn mark_completed(&mut self) -> Result<(), ManifestError> {
        if self.manifest_status != ManifestStatus::Departed {
            return Err(ManifestError::InvalidTransition {
                from: self.manifest_status,
                to: ManifestStatus::Completed,
            });
        }
        self.manifest_status = ManifestStatus::Completed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Targeted boarding-status edit; does not touch any derived state, so
    /// a concurrent regeneration keyed on the same entry cannot transfer
    /// the status to a different traveller.
    pub fn set_boarding_status(
        &mut self,
        entry_id: Uuid,
        status: BoardingStatus,
        departure_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), ManifestError> {
        Self::guard_departure(departure_at, now)?;
        let entry = self
            .passengers
            .iter_mut()
            .find(|p| p.entry_id == entry_id)
            .ok_or(ManifestError::PassengerNotFound(entry_id))?;
        entry.boarding_status = status;
        self.updated_at = now;
        Ok(())
    }

    fn guard_departure(
        departure_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), ManifestError> {
        if now > departure_at {
            return Err(ManifestError::JourneyDeparted);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Passenger;
    use chrono::{Duration, TimeZone};

    fn detailed_booking(schedule_id: Uuid, seats: Vec<i32>, names: &[&str]) -> Booking {
        let passengers = names
            .iter()
            .enumerate()
            .map(|(i, n)| Passenger {
                name: n.to_string(),
                age: 30 + i as i32,
                gender: Gender::Other,
            })
            .collect();
        Booking::new(Uuid::new_v4(), schedule_id, seats, passengers, "Booker".to_string())
    }

    fn legacy_booking(schedule_id: Uuid, seats: Vec<i32>, owner: &str) -> Booking {
        Booking::new(Uuid::new_v4(), schedule_id, seats, vec![], owner.to_string())
    }

    #[test]
    fn test_detailed_bookings_produce_one_entry_per_passenger() {
        let schedule_id = Uuid::new_v4();
        let booking = detailed_booking(schedule_id, vec![1, 2], &["Asha", "Vikram"]);

        let manifest = PassengerManifest::regenerate(schedule_id, &[booking.clone()], None);

        assert_eq!(manifest.total_passengers, 2);
        assert_eq!(manifest.total_seats_booked, 2);
        assert_eq!(manifest.passengers[0].name, "Asha");
        assert_eq!(manifest.passengers[0].age, Some(30));
        assert_eq!(manifest.passengers[1].name, "Vikram");
        assert_eq!(manifest.passengers[1].passenger_index, 1);
        assert!(manifest
            .passengers
            .iter()
            .all(|p| p.boarding_status == BoardingStatus::NotBoarded));
        assert_eq!(manifest.manifest_status, ManifestStatus::Draft);
        assert_eq!(manifest.passengers[0].booking_reference, booking.booking_reference);
    }

    #[test]
    fn test_legacy_booking_synthesizes_one_entry_per_seat() {
        let schedule_id = Uuid::new_v4();
        let booking = legacy_booking(schedule_id, vec![5, 6, 7], "M. Iyer");

        let manifest = PassengerManifest::regenerate(schedule_id, &[booking], None);

        assert_eq!(manifest.total_passengers, 3);
        assert!(manifest.passengers.iter().all(|p| p.name == "M. Iyer"));
        assert!(manifest.passengers.iter().all(|p| p.age.is_none() && p.gender.is_none()));
        assert_eq!(
            manifest.passengers.iter().map(|p| p.passenger_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_regeneration_is_idempotent() {
        let schedule_id = Uuid::new_v4();
        let bookings = vec![
            detailed_booking(schedule_id, vec![1], &["Asha"]),
            legacy_booking(schedule_id, vec![2, 3], "M. Iyer"),
        ];

        let first = PassengerManifest::regenerate(schedule_id, &bookings, None);
        let second = PassengerManifest::regenerate(schedule_id, &bookings, Some(&first));

        assert_eq!(first.id, second.id);
        assert_eq!(first.total_passengers, second.total_passengers);
        assert_eq!(first.total_seats_booked, second.total_seats_booked);
        let ids = |m: &PassengerManifest| m.passengers.iter().map(|p| p.entry_id).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        let statuses =
            |m: &PassengerManifest| m.passengers.iter().map(|p| p.boarding_status).collect::<Vec<_>>();
        assert_eq!(statuses(&first), statuses(&second));
    }

    #[test]
    fn test_boarding_status_survives_regeneration() {
        let schedule_id = Uuid::new_v4();
        let first_booking = detailed_booking(schedule_id, vec![1], &["Asha"]);
        let mut manifest = PassengerManifest::regenerate(schedule_id, &[first_booking.clone()], None);

        let departure = Utc::now() + Duration::hours(4);
        let entry_id = manifest.passengers[0].entry_id;
        manifest
            .set_boarding_status(entry_id, BoardingStatus::Boarded, departure, Utc::now())
            .unwrap();

        // A new booking arrives and the manifest is rebuilt
        let second_booking = detailed_booking(schedule_id, vec![2], &["Vikram"]);
        let regenerated = PassengerManifest::regenerate(
            schedule_id,
            &[first_booking.clone(), second_booking],
            Some(&manifest),
        );

        let asha = regenerated
            .passengers
            .iter()
            .find(|p| p.booking_id == first_booking.id)
            .unwrap();
        assert_eq!(asha.entry_id, entry_id);
        assert_eq!(asha.boarding_status, BoardingStatus::Boarded);

        let vikram = regenerated
            .passengers
            .iter()
            .find(|p| p.booking_id != first_booking.id)
            .unwrap();
        assert_eq!(vikram.boarding_status, BoardingStatus::NotBoarded);
    }

    #[test]
    fn test_cancelled_bookings_drop_out_of_the_roster() {
        let schedule_id = Uuid::new_v4();
        let keep = detailed_booking(schedule_id, vec![1], &["Asha"]);
        let mut gone = detailed_booking(schedule_id, vec![2], &["Vikram"]);

        let manifest =
            PassengerManifest::regenerate(schedule_id, &[keep.clone(), gone.clone()], None);
        assert_eq!(manifest.total_passengers, 2);

        gone.cancel();
        let regenerated =
            PassengerManifest::regenerate(schedule_id, &[keep.clone(), gone], Some(&manifest));

        assert_eq!(regenerated.total_passengers, 1);
        assert_eq!(regenerated.total_seats_booked, 1);
        assert_eq!(regenerated.passengers[0].booking_id, keep.id);
    }

    #[test]
    fn test_totals_differ_for_inconsistent_legacy_data() {
        let schedule_id = Uuid::new_v4();
        let mut booking = detailed_booking(schedule_id, vec![1, 2], &["Asha", "Vikram"]);
        // Legacy records sometimes hold a seat count that disagrees with
        // their passenger list
        booking.passengers.truncate(1);

        let manifest = PassengerManifest::regenerate(schedule_id, &[booking], None);

        assert_eq!(manifest.total_passengers, 1);
        assert_eq!(manifest.total_seats_booked, 2);
    }

    fn empty_manifest() -> PassengerManifest {
        PassengerManifest::regenerate(Uuid::new_v4(), &[], None)
    }

    #[test]
    fn test_finalize_then_depart() {
        let mut manifest = empty_manifest();
        let departure = Utc::now() + Duration::hours(2);

        manifest.finalize(departure, Utc::now()).unwrap();
        assert_eq!(manifest.manifest_status, ManifestStatus::Finalized);
        assert!(manifest.finalized_at.is_some());

        manifest.mark_departed(departure, Utc::now()).unwrap();
        assert_eq!(manifest.manifest_status, ManifestStatus::Departed);
        assert!(manifest.departed_at.is_some());
    }

    #[test]
    fn test_finalize_rejected_after_departure() {
        let mut manifest = empty_manifest();
        let departure = Utc.with_ymd_and_hms(2020, 1, 1, 8, 30, 0).unwrap();

        let err = manifest.finalize(departure, Utc::now()).unwrap_err();
        assert!(matches!(err, ManifestError::JourneyDeparted));
        assert_eq!(manifest.manifest_status, ManifestStatus::Draft);
    }

    #[test]
    fn test_depart_requires_finalized() {
        let mut manifest = empty_manifest();
        let departure = Utc::now() + Duration::hours(2);

        let err = manifest.mark_departed(departure, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidTransition { from: ManifestStatus::Draft, to: ManifestStatus::Departed }
        ));
    }

    #[test]
    fn test_completed_only_from_departed() {
        let mut manifest = empty_manifest();
        assert!(manifest.mark_completed().is_err());

        let departure = Utc::now() + Duration::hours(2);
        manifest.finalize(departure, Utc::now()).unwrap();
        manifest.mark_departed(departure, Utc::now()).unwrap();
        manifest.mark_completed().unwrap();
        assert_eq!(manifest.manifest_status, ManifestStatus::Completed);
    }

    #[test]
    fn test_boarding_edit_rejected_after_departure_or_for_unknown_entry() {
        let schedule_id = Uuid::new_v4();
        let booking = detailed_booking(schedule_id, vec![1], &["Asha"]);
        let mut manifest = PassengerManifest::regenerate(schedule_id, &[booking], None);

        let past = Utc.with_ymd_and_hms(2020, 1, 1, 8, 30, 0).unwrap();
        let entry_id = manifest.passengers[0].entry_id;
        assert!(matches!(
            manifest.set_boarding_status(entry_id, BoardingStatus::Boarded, past, Utc::now()),
            Err(ManifestError::JourneyDeparted)
        ));

        let future = Utc::now() + Duration::hours(2);
        let unknown = Uuid::new_v4();
        assert!(matches!(
            manifest.set_boarding_status(unknown, BoardingStatus::Boarded, future, Utc::now()),
            Err(ManifestError::PassengerNotFound(id)) if id == unknown
        ));
    }
}
