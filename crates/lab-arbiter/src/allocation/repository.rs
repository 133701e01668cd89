use chrono::NaiveDate;

use super::alternatives::Alternatives;
use super::domain::{
    Lab, LabNumber, NewReservation, Reservation, ReservationId, ReservationStatus,
    TimetableEntry, UserHistorySnapshot,
};
use super::interval::{Session, TimeSlot};

/// Persistence collaborator holding labs, the fixed timetable and reservations.
pub trait LabStore: Send + Sync {
    fn active_labs(&self) -> Result<Vec<Lab>, RepositoryError>;

    fn lab(&self, lab_number: &LabNumber) -> Result<Option<Lab>, RepositoryError>;

    /// Classes held in `room` during `session` on `date`.
    fn timetable_entries(
        &self,
        room: &LabNumber,
        date: NaiveDate,
        session: Session,
    ) -> Result<Vec<TimetableEntry>, RepositoryError>;

    /// First reservation of `lab` in one of `statuses` overlapping `slot`, skipping `exclude`.
    fn reservation_conflict(
        &self,
        lab: &LabNumber,
        slot: &TimeSlot,
        statuses: &[ReservationStatus],
        exclude: Option<ReservationId>,
    ) -> Result<Option<Reservation>, RepositoryError>;

    /// Insert `draft` and, when given, reject `preempt` as one atomic step.
    fn commit_allocation(
        &self,
        draft: NewReservation,
        preempt: Option<ReservationId>,
    ) -> Result<Reservation, RepositoryError>;

    /// Fails with [`RepositoryError::Conflict`] unless the stored status may move to `status`.
    fn update_reservation_status(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<(), RepositoryError>;

    /// Fails with [`RepositoryError::Conflict`] unless the stored reservation is still active.
    fn update_reservation(&self, reservation: Reservation) -> Result<(), RepositoryError>;

    fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, RepositoryError>;

    fn reservations(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, RepositoryError>;

    /// Behavior snapshot for the fairness factor. `None` for first-time requesters.
    fn user_history(&self, requester: &str) -> Result<Option<UserHistorySnapshot>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Optional filters for reservation listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    pub requester: Option<String>,
}

impl ReservationFilter {
    pub fn matches(&self, reservation: &Reservation) -> bool {
        let status_ok = self
            .status
            .map(|status| reservation.status == status)
            .unwrap_or(true);
        let requester_ok = self
            .requester
            .as_deref()
            .map(|email| reservation.request.requester.email.eq_ignore_ascii_case(email))
            .unwrap_or(true);
        status_ok && requester_ok
    }
}

/// Outbound notification hooks (e-mail or similar). Owns no decision logic.
pub trait Notifier: Send + Sync {
    fn notify_approved(&self, reservation: &Reservation) -> Result<(), NotifyError>;

    fn notify_pending(
        &self,
        reservation: &Reservation,
        alternatives: &Alternatives,
    ) -> Result<(), NotifyError>;

    fn notify_rejected(&self, reservation: &Reservation, reason: &str) -> Result<(), NotifyError>;

    fn notify_modified(
        &self,
        reservation: &Reservation,
        changed_fields: &[String],
    ) -> Result<(), NotifyError>;

    fn notify_cancelled(&self, reservation: &Reservation) -> Result<(), NotifyError>;
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
