use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::{LabNumber, Purpose, ReservationId, ReservationStatus, TimetableEntry};
use super::interval::TimeSlot;
use super::repository::{LabStore, RepositoryError};

/// Existing occupancy that clashes with a candidate slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Conflict {
    /// Scheduled class. Never overridable.
    FixedClass { entry: TimetableEntry },
    Reservation {
        reservation_id: ReservationId,
        priority_score: f64,
        requester: String,
        purpose: Purpose,
        status: ReservationStatus,
    },
}

impl Conflict {
    pub const fn is_fixed_class(&self) -> bool {
        matches!(self, Conflict::FixedClass { .. })
    }

    pub const fn reason_code(&self) -> &'static str {
        match self {
            Conflict::FixedClass { .. } => "occupied_by_class",
            Conflict::Reservation { .. } => "reserved",
        }
    }
}

/// Looks up fixed classes first, then active reservations.
pub struct ConflictDetector<S> {
    store: Arc<S>,
}

impl<S> Clone for ConflictDetector<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> ConflictDetector<S>
where
    S: LabStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn find_conflict(
        &self,
        lab: &LabNumber,
        slot: &TimeSlot,
    ) -> Result<Option<Conflict>, RepositoryError> {
        self.find_conflict_excluding(lab, slot, None)
    }

    /// Same as [`Self::find_conflict`] but ignores one reservation, e.g. the one being modified.
    pub fn find_conflict_excluding(
        &self,
        lab: &LabNumber,
        slot: &TimeSlot,
        exclude: Option<ReservationId>,
    ) -> Result<Option<Conflict>, RepositoryError> {
        if let Some(entry) = self.find_fixed_class(lab, slot)? {
            return Ok(Some(Conflict::FixedClass { entry }));
        }

        self.find_reservation_conflict(lab, slot, exclude)
    }

    /// First class occupying any part of `slot`, checking each session the slot spans.
    pub fn find_fixed_class(
        &self,
        lab: &LabNumber,
        slot: &TimeSlot,
    ) -> Result<Option<TimetableEntry>, RepositoryError> {
        for session in slot.interval.sessions() {
            let entries = self.store.timetable_entries(lab, slot.date, session)?;
            if let Some(entry) = entries
                .into_iter()
                .find(|entry| entry.occupies(&slot.interval))
            {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Reservation clashes only; fixed classes are not consulted.
    pub fn find_reservation_conflict(
        &self,
        lab: &LabNumber,
        slot: &TimeSlot,
        exclude: Option<ReservationId>,
    ) -> Result<Option<Conflict>, RepositoryError> {
        let existing =
            self.store
                .reservation_conflict(lab, slot, &ReservationStatus::ACTIVE, exclude)?;

        Ok(existing.map(|reservation| Conflict::Reservation {
            reservation_id: reservation.id,
            priority_score: reservation.priority_score,
            requester: reservation.request.requester.email,
            purpose: reservation.request.purpose,
            status: reservation.status,
        }))
    }
}
