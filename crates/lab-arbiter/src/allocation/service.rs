use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::alternatives::{AlternativeQuery, AlternativeSuggester, Alternatives};
use super::clock::{Clock, SystemClock};
use super::conflict::{Conflict, ConflictDetector};
use super::domain::{
    Lab, LabNumber, NewReservation, Reservation, ReservationId, ReservationRequest,
    ReservationStatus,
};
use super::interval::{hhmm_option, Interval, TimeSlot};
use super::policy::AllocationPolicy;
use super::repository::{LabStore, Notifier, NotifyError, RepositoryError, ReservationFilter};
use super::resolver::{AllocationResolver, Decision, NotificationObligation, Resolution};
use super::scoring::{Explanation, ScoringEngine, ScoringResult};
use super::validation::{RequestGuard, ValidationError};

pub(crate) const PREEMPTION_REASON: &str = "Higher priority request received";

/// Result of submitting a new request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    /// Score below the acceptance floor. Nothing was stored.
    Rejected {
        scoring: ScoringResult,
        explanation: Explanation,
        alternatives: Alternatives,
    },
    Committed {
        reservation: Reservation,
        scoring: ScoringResult,
        decision: Decision,
        conflict: Option<Conflict>,
        alternatives: Option<Alternatives>,
    },
}

impl SubmissionOutcome {
    pub fn reservation(&self) -> Option<&Reservation> {
        match self {
            SubmissionOutcome::Committed { reservation, .. } => Some(reservation),
            SubmissionOutcome::Rejected { .. } => None,
        }
    }

    pub fn scoring(&self) -> &ScoringResult {
        match self {
            SubmissionOutcome::Rejected { scoring, .. }
            | SubmissionOutcome::Committed { scoring, .. } => scoring,
        }
    }
}

/// Fields a requester may change on an existing reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationChanges {
    #[serde(default, with = "hhmm_option", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm_option", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
    #[serde(default, alias = "num_participants", skip_serializing_if = "Option::is_none")]
    pub participants: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ReservationChanges {
    pub fn is_empty(&self) -> bool {
        self.start_time.is_none()
            && self.end_time.is_none()
            && self.participants.is_none()
            && self.description.is_none()
    }

    /// Apply onto `request`, returning the names of fields whose value changed.
    fn apply(&self, request: &mut ReservationRequest) -> Vec<String> {
        let mut changed = Vec::new();
        if let Some(start) = self.start_time.filter(|start| *start != request.start_time) {
            request.start_time = start;
            changed.push("start_time".to_string());
        }
        if let Some(end) = self.end_time.filter(|end| *end != request.end_time) {
            request.end_time = end;
            changed.push("end_time".to_string());
        }
        if let Some(participants) = self
            .participants
            .filter(|participants| *participants != request.participants)
        {
            request.participants = participants;
            changed.push("num_participants".to_string());
        }
        if let Some(description) = self
            .description
            .as_ref()
            .filter(|description| **description != request.description)
        {
            request.description = description.clone();
            changed.push("description".to_string());
        }
        changed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModificationOutcome {
    pub reservation: Reservation,
    pub changed_fields: Vec<String>,
    /// `None` when nothing changed and no re-score happened.
    pub scoring: Option<ScoringResult>,
}

/// Availability answer for one lab and slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<Conflict>,
}

/// Score preview without persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScorePreview {
    pub lab: LabNumber,
    pub scoring: ScoringResult,
    pub explanation: Explanation,
}

/// Resolve-and-commit facade over the store and notifier.
pub struct ReservationService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
    guard: RequestGuard<S>,
    resolver: AllocationResolver<S>,
    suggester: AlternativeSuggester<S>,
    detector: ConflictDetector<S>,
    slot_locks: Mutex<HashMap<(LabNumber, NaiveDate), Arc<Mutex<()>>>>,
}

impl<S, N> ReservationService<S, N>
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifier: Arc<N>,
        engine: Arc<ScoringEngine>,
        policy: AllocationPolicy,
    ) -> Self {
        Self::with_clock(store, notifier, engine, policy, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<S>,
        notifier: Arc<N>,
        engine: Arc<ScoringEngine>,
        policy: AllocationPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            guard: RequestGuard::new(Arc::clone(&store)),
            resolver: AllocationResolver::new(engine, Arc::clone(&store), policy),
            suggester: AlternativeSuggester::new(Arc::clone(&store)),
            detector: ConflictDetector::new(Arc::clone(&store)),
            slot_locks: Mutex::new(HashMap::new()),
            store,
            notifier,
            clock,
        }
    }

    pub fn policy(&self) -> &AllocationPolicy {
        self.resolver.policy()
    }

    pub fn engine(&self) -> &ScoringEngine {
        self.resolver.engine()
    }

    /// Validate, score, resolve conflicts and commit a new request.
    pub fn submit(
        &self,
        request: ReservationRequest,
    ) -> Result<SubmissionOutcome, ReservationServiceError> {
        let lab = self.guard.validate(&request)?;
        let history = self.store.user_history(&request.requester.email)?;
        let query = AlternativeQuery::from(&request);

        let lock = self.slot_lock(&request.lab_number, request.date);
        let held = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let today = self.clock.today();
        let Resolution {
            scoring,
            decision,
            conflict,
        } = self.resolver.resolve(&request, &lab, history.as_ref(), today)?;

        let Some(status) = decision.status() else {
            drop(held);
            let alternatives = self.suggester.suggest(&query)?;
            let explanation = scoring.explain();
            return Ok(SubmissionOutcome::Rejected {
                scoring,
                explanation,
                alternatives,
            });
        };

        let alternatives = match status {
            ReservationStatus::Pending => Some(self.suggester.suggest(&query)?),
            _ => None,
        };

        let draft = NewReservation {
            request,
            priority_score: scoring.score,
            status,
            created_at: self.clock.now(),
        };
        let reservation = self.store.commit_allocation(draft, decision.preempted())?;
        drop(held);

        info!(
            reservation = %reservation.id,
            lab = %reservation.lab_number(),
            status = reservation.status.label(),
            score = reservation.priority_score,
            "reservation committed"
        );

        let resolution = Resolution {
            scoring,
            decision,
            conflict,
        };
        self.dispatch(&resolution, &reservation, alternatives.as_ref());

        let Resolution {
            scoring,
            decision,
            conflict,
        } = resolution;
        Ok(SubmissionOutcome::Committed {
            reservation,
            scoring,
            decision,
            conflict,
            alternatives,
        })
    }

    /// Change time, participants or description. The reservation returns to `pending`.
    pub fn modify(
        &self,
        id: ReservationId,
        changes: ReservationChanges,
    ) -> Result<ModificationOutcome, ReservationServiceError> {
        let lock = self.reservation_lock(id)?;
        let held = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = self.fetch(id)?;
        if !existing.status.is_active() {
            return Err(ReservationServiceError::InvalidTransition {
                id,
                from: existing.status,
                to: ReservationStatus::Pending,
            });
        }

        let now = self.clock.now();
        let starts_at = existing.request.starts_at();
        let window = Duration::hours(self.policy().modification_window_hours());
        if starts_at - now < window {
            return Err(ReservationServiceError::ModificationWindowClosed {
                id,
                starts_at,
                hours: self.policy().modification_window_hours(),
            });
        }

        let mut request = existing.request.clone();
        let changed_fields = changes.apply(&mut request);
        if changed_fields.is_empty() {
            return Ok(ModificationOutcome {
                reservation: existing,
                changed_fields,
                scoring: None,
            });
        }
        if request.participants == 0 {
            return Err(ValidationError::NoParticipants.into());
        }
        RequestGuard::<S>::check_interval(&request.interval())?;
        let lab = self.guard.lab(&request.lab_number)?;
        let history = self.store.user_history(&request.requester.email)?;

        let resolution = self.resolver.resolve_excluding(
            &request,
            &lab,
            history.as_ref(),
            now.date(),
            Some(id),
        )?;
        if resolution.decision == Decision::RejectedByScore {
            return Err(ReservationServiceError::ModificationRejected {
                id,
                scoring: Box::new(resolution.scoring),
            });
        }

        let updated = Reservation {
            request,
            priority_score: resolution.scoring.score,
            status: ReservationStatus::Pending,
            updated_at: Some(now),
            ..existing
        };
        self.store.update_reservation(updated.clone())?;
        drop(held);

        info!(
            reservation = %id,
            fields = ?changed_fields,
            score = updated.priority_score,
            "reservation modified"
        );
        deliver(
            "modified",
            id,
            self.notifier.notify_modified(&updated, &changed_fields),
        );

        Ok(ModificationOutcome {
            reservation: updated,
            changed_fields,
            scoring: Some(resolution.scoring),
        })
    }

    pub fn cancel(&self, id: ReservationId) -> Result<Reservation, ReservationServiceError> {
        let reservation = self.transition(id, ReservationStatus::Cancelled)?;
        deliver(
            "cancelled",
            id,
            self.notifier.notify_cancelled(&reservation),
        );
        Ok(reservation)
    }

    /// Manual approval of a pending reservation. Refused while the slot is held
    /// by a class or another approved reservation.
    pub fn approve(&self, id: ReservationId) -> Result<Reservation, ReservationServiceError> {
        let lock = self.reservation_lock(id)?;
        let held = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = self.fetch(id)?;
        if !existing.status.can_transition_to(ReservationStatus::Approved) {
            return Err(ReservationServiceError::InvalidTransition {
                id,
                from: existing.status,
                to: ReservationStatus::Approved,
            });
        }

        let slot = existing.slot();
        if let Some(entry) = self.detector.find_fixed_class(existing.lab_number(), &slot)? {
            return Err(ReservationServiceError::SlotOccupied {
                id,
                conflict: Box::new(Conflict::FixedClass { entry }),
            });
        }
        if let Some(blocking) = self.store.reservation_conflict(
            existing.lab_number(),
            &slot,
            &[ReservationStatus::Approved],
            Some(id),
        )? {
            return Err(ReservationServiceError::SlotOccupied {
                id,
                conflict: Box::new(Conflict::Reservation {
                    reservation_id: blocking.id,
                    priority_score: blocking.priority_score,
                    requester: blocking.request.requester.email,
                    purpose: blocking.request.purpose,
                    status: blocking.status,
                }),
            });
        }

        self.store
            .update_reservation_status(id, ReservationStatus::Approved)?;
        drop(held);

        let approved = Reservation {
            status: ReservationStatus::Approved,
            updated_at: Some(self.clock.now()),
            ..existing
        };
        info!(reservation = %id, "reservation approved manually");
        deliver("approved", id, self.notifier.notify_approved(&approved));
        Ok(approved)
    }

    pub fn get(&self, id: ReservationId) -> Result<Reservation, ReservationServiceError> {
        self.fetch(id)
    }

    /// Admin listing ordered by date then start time.
    pub fn list(
        &self,
        filter: &ReservationFilter,
    ) -> Result<Vec<Reservation>, ReservationServiceError> {
        let mut reservations = self.store.reservations(filter)?;
        reservations.sort_by(|a, b| {
            (a.request.date, a.request.start_time, a.id).cmp(&(
                b.request.date,
                b.request.start_time,
                b.id,
            ))
        });
        Ok(reservations)
    }

    /// One requester's reservations, newest first.
    pub fn requester_reservations(
        &self,
        email: &str,
    ) -> Result<Vec<Reservation>, ReservationServiceError> {
        let filter = ReservationFilter {
            status: None,
            requester: Some(email.to_string()),
        };
        let mut reservations = self.store.reservations(&filter)?;
        reservations.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(reservations)
    }

    pub fn labs(&self) -> Result<Vec<Lab>, ReservationServiceError> {
        let mut labs = self.store.active_labs()?;
        labs.retain(Lab::is_active);
        labs.sort_by(|a, b| a.lab_number.cmp(&b.lab_number));
        Ok(labs)
    }

    pub fn check_availability(
        &self,
        lab_number: &LabNumber,
        slot: &TimeSlot,
    ) -> Result<Availability, ReservationServiceError> {
        RequestGuard::<S>::check_interval(&slot.interval)?;
        self.guard.lab(lab_number)?;

        let conflict = self.detector.find_conflict(lab_number, slot)?;
        Ok(Availability {
            available: conflict.is_none(),
            reason: conflict.as_ref().map(Conflict::reason_code),
            conflict,
        })
    }

    pub fn suggest(
        &self,
        query: &AlternativeQuery,
    ) -> Result<Alternatives, ReservationServiceError> {
        RequestGuard::<S>::check_interval(&Interval::new(query.start_time, query.end_time))?;
        Ok(self.suggester.suggest(query)?)
    }

    /// Score a request exactly as `submit` would, without storing anything.
    pub fn score(
        &self,
        request: &ReservationRequest,
    ) -> Result<ScorePreview, ReservationServiceError> {
        let lab = self.guard.validate(request)?;
        let history = self.store.user_history(&request.requester.email)?;
        let scoring = self
            .engine()
            .score(request, lab.capacity, history.as_ref(), self.clock.today());
        let explanation = scoring.explain();
        Ok(ScorePreview {
            lab: lab.lab_number,
            scoring,
            explanation,
        })
    }

    fn fetch(&self, id: ReservationId) -> Result<Reservation, ReservationServiceError> {
        self.store
            .reservation(id)?
            .ok_or_else(|| ValidationError::UnknownReservation(id).into())
    }

    fn transition(
        &self,
        id: ReservationId,
        next: ReservationStatus,
    ) -> Result<Reservation, ReservationServiceError> {
        let lock = self.reservation_lock(id)?;
        let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = self.fetch(id)?;
        if !existing.status.can_transition_to(next) {
            return Err(ReservationServiceError::InvalidTransition {
                id,
                from: existing.status,
                to: next,
            });
        }
        self.store.update_reservation_status(id, next)?;
        info!(reservation = %id, from = existing.status.label(), to = next.label(), "status changed");
        Ok(Reservation {
            status: next,
            updated_at: Some(self.clock.now()),
            ..existing
        })
    }

    /// Slot lock guarding an existing reservation. Lab and date never change after booking.
    fn reservation_lock(&self, id: ReservationId) -> Result<Arc<Mutex<()>>, ReservationServiceError> {
        let reservation = self.fetch(id)?;
        Ok(self.slot_lock(reservation.lab_number(), reservation.request.date))
    }

    fn slot_lock(&self, lab: &LabNumber, date: NaiveDate) -> Arc<Mutex<()>> {
        let mut locks = self
            .slot_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry((lab.clone(), date)).or_default())
    }

    fn dispatch(
        &self,
        resolution: &Resolution,
        reservation: &Reservation,
        alternatives: Option<&Alternatives>,
    ) {
        for obligation in resolution.notifications() {
            match obligation {
                NotificationObligation::Approved => deliver(
                    "approved",
                    reservation.id,
                    self.notifier.notify_approved(reservation),
                ),
                NotificationObligation::Pending => {
                    let empty = Alternatives::default();
                    deliver(
                        "pending",
                        reservation.id,
                        self.notifier
                            .notify_pending(reservation, alternatives.unwrap_or(&empty)),
                    );
                }
                NotificationObligation::PreemptedRejection { reservation_id } => {
                    match self.store.reservation(reservation_id) {
                        Ok(Some(preempted)) => deliver(
                            "rejected",
                            reservation_id,
                            self.notifier.notify_rejected(&preempted, PREEMPTION_REASON),
                        ),
                        Ok(None) => warn!(
                            reservation = %reservation_id,
                            "preempted reservation vanished before notification"
                        ),
                        Err(error) => warn!(
                            reservation = %reservation_id,
                            %error,
                            "could not load preempted reservation for notification"
                        ),
                    }
                }
            }
        }
    }
}

fn deliver(kind: &'static str, id: ReservationId, result: Result<(), NotifyError>) {
    if let Err(error) = result {
        warn!(reservation = %id, notification = kind, %error, "notification failed");
    }
}

/// Error raised by the reservation service.
#[derive(Debug, thiserror::Error)]
pub enum ReservationServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("reservation {id} cannot move from {} to {}", .from.label(), .to.label())]
    InvalidTransition {
        id: ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
    },
    #[error("reservation {id} starts at {starts_at}; changes close {hours} hours before start")]
    ModificationWindowClosed {
        id: ReservationId,
        starts_at: NaiveDateTime,
        hours: i64,
    },
    #[error("modified reservation {id} scored {} and falls below the acceptance floor", .scoring.score)]
    ModificationRejected {
        id: ReservationId,
        scoring: Box<ScoringResult>,
    },
    #[error("reservation {id} cannot be approved: slot is {}", .conflict.reason_code())]
    SlotOccupied {
        id: ReservationId,
        conflict: Box<Conflict>,
    },
}
