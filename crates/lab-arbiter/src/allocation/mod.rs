//! Lab reservation arbitration: request scoring, conflict detection,
//! priority preemption and alternative-slot search.
//!
//! [`ScoringEngine`] and [`decide`] are pure. [`ReservationService`] wires
//! them to a [`LabStore`] and a [`Notifier`] and serializes commits per lab
//! and date.

pub mod alternatives;
pub mod clock;
pub mod conflict;
pub mod domain;
pub mod interval;
pub mod policy;
pub mod repository;
pub mod resolver;
pub mod router;
pub mod scoring;
pub mod service;
pub(crate) mod validation;

#[cfg(test)]
mod tests;

pub use alternatives::{
    slot_catalog, AlternativeQuery, AlternativeSuggester, Alternatives, LabAlternative,
    TimeAlternative,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use conflict::{Conflict, ConflictDetector};
pub use domain::{
    BookingSample, Lab, LabNumber, LabStatus, NewReservation, ProofType, Purpose, Requester,
    RequesterRole, Reservation, ReservationId, ReservationRequest, ReservationStatus,
    TimetableEntry, Urgency, UserHistorySnapshot,
};
pub use interval::{format_time, parse_time, Interval, Session, TimeSlot};
pub use policy::AllocationPolicy;
pub use repository::{LabStore, Notifier, NotifyError, RepositoryError, ReservationFilter};
pub use resolver::{
    decide, AllocationResolver, Decision, NotificationObligation, PendingReason, Resolution,
};
pub use router::reservation_router;
pub use scoring::{
    AuthenticityStrategy, Explanation, FraudFlag, RuleBasedAuthenticity, ScoreBreakdown,
    ScoringConfig, ScoringConfigError, ScoringEngine, ScoringResult,
};
pub use service::{
    Availability, ModificationOutcome, ReservationChanges, ReservationService,
    ReservationServiceError, ScorePreview, SubmissionOutcome,
};
pub use validation::ValidationError;
