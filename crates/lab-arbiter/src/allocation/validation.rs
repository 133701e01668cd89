use std::sync::Arc;

use super::domain::{Lab, LabNumber, ReservationId, ReservationRequest};
use super::interval::{format_time, Interval};
use super::repository::{LabStore, RepositoryError};

/// Problems with the request itself. Surfaced before any scoring happens.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("lab {0} not found")]
    UnknownLab(LabNumber),
    #[error("lab {0} is not accepting reservations")]
    InactiveLab(LabNumber),
    #[error("reservation {0} not found")]
    UnknownReservation(ReservationId),
    #[error("end time {end} must be after start time {start}")]
    InvalidInterval { start: String, end: String },
    #[error("participant count must be at least 1")]
    NoParticipants,
    #[error("requester email is required")]
    MissingRequester,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Checks structural preconditions and resolves the target lab.
pub struct RequestGuard<S> {
    store: Arc<S>,
}

impl<S> RequestGuard<S>
where
    S: LabStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn check_interval(interval: &Interval) -> Result<(), ValidationError> {
        if interval.is_well_formed() {
            Ok(())
        } else {
            Err(ValidationError::InvalidInterval {
                start: format_time(interval.start),
                end: format_time(interval.end),
            })
        }
    }

    /// Lab must exist; inactive labs are reported separately.
    pub fn lab(&self, lab_number: &LabNumber) -> Result<Lab, ValidationError> {
        self.store
            .lab(lab_number)?
            .ok_or_else(|| ValidationError::UnknownLab(lab_number.clone()))
    }

    pub fn validate(&self, request: &ReservationRequest) -> Result<Lab, ValidationError> {
        if request.requester.email.trim().is_empty() {
            return Err(ValidationError::MissingRequester);
        }
        if request.participants == 0 {
            return Err(ValidationError::NoParticipants);
        }
        Self::check_interval(&request.interval())?;

        let lab = self.lab(&request.lab_number)?;
        if !lab.is_active() {
            return Err(ValidationError::InactiveLab(lab.lab_number));
        }
        Ok(lab)
    }
}
