use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::conflict::{Conflict, ConflictDetector};
use super::domain::{Lab, ReservationId, ReservationRequest, ReservationStatus, UserHistorySnapshot};
use super::policy::AllocationPolicy;
use super::repository::{LabStore, RepositoryError};
use super::scoring::{ScoringEngine, ScoringResult};

/// Why an accepted request could not be approved outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingReason {
    BelowAutoApprove,
    FixedClass,
    Contested,
}

/// Final status decision for a new request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    RejectedByScore,
    Approved {
        #[serde(skip_serializing_if = "Option::is_none")]
        preempted: Option<ReservationId>,
    },
    Pending {
        reason: PendingReason,
    },
}

impl Decision {
    /// Status to persist; `None` when nothing is stored.
    pub const fn status(&self) -> Option<ReservationStatus> {
        match self {
            Decision::RejectedByScore => None,
            Decision::Approved { .. } => Some(ReservationStatus::Approved),
            Decision::Pending { .. } => Some(ReservationStatus::Pending),
        }
    }

    pub const fn preempted(&self) -> Option<ReservationId> {
        match self {
            Decision::Approved { preempted } => *preempted,
            _ => None,
        }
    }
}

/// Notification the caller owes once the decision is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationObligation {
    Approved,
    Pending,
    PreemptedRejection { reservation_id: ReservationId },
}

/// Outcome of resolving one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub scoring: ScoringResult,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<Conflict>,
}

impl Resolution {
    pub fn notifications(&self) -> Vec<NotificationObligation> {
        match self.decision {
            Decision::RejectedByScore => Vec::new(),
            Decision::Pending { .. } => vec![NotificationObligation::Pending],
            Decision::Approved { preempted } => {
                let mut obligations = Vec::with_capacity(2);
                if let Some(reservation_id) = preempted {
                    obligations.push(NotificationObligation::PreemptedRejection { reservation_id });
                }
                obligations.push(NotificationObligation::Approved);
                obligations
            }
        }
    }
}

/// Pure decision rule for an accepted score against an optional conflict.
///
/// Preemption requires beating the existing score by more than the margin so
/// near-ties do not flap.
pub fn decide(score: f64, conflict: Option<&Conflict>, policy: &AllocationPolicy) -> Decision {
    match conflict {
        None if score >= policy.auto_approve_threshold() => Decision::Approved { preempted: None },
        None => Decision::Pending {
            reason: PendingReason::BelowAutoApprove,
        },
        Some(Conflict::FixedClass { .. }) => Decision::Pending {
            reason: PendingReason::FixedClass,
        },
        Some(Conflict::Reservation {
            reservation_id,
            priority_score,
            ..
        }) => {
            if score > priority_score + policy.preemption_margin() {
                Decision::Approved {
                    preempted: Some(*reservation_id),
                }
            } else {
                Decision::Pending {
                    reason: PendingReason::Contested,
                }
            }
        }
    }
}

/// Orchestrates scoring and conflict detection for a new request.
pub struct AllocationResolver<S> {
    engine: Arc<ScoringEngine>,
    detector: ConflictDetector<S>,
    policy: AllocationPolicy,
}

impl<S> AllocationResolver<S>
where
    S: LabStore + 'static,
{
    pub fn new(engine: Arc<ScoringEngine>, store: Arc<S>, policy: AllocationPolicy) -> Self {
        Self {
            engine,
            detector: ConflictDetector::new(store),
            policy,
        }
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    pub fn resolve(
        &self,
        request: &ReservationRequest,
        lab: &Lab,
        history: Option<&UserHistorySnapshot>,
        today: NaiveDate,
    ) -> Result<Resolution, RepositoryError> {
        self.resolve_excluding(request, lab, history, today, None)
    }

    /// Resolve while ignoring one existing reservation during conflict lookup.
    pub fn resolve_excluding(
        &self,
        request: &ReservationRequest,
        lab: &Lab,
        history: Option<&UserHistorySnapshot>,
        today: NaiveDate,
        exclude: Option<ReservationId>,
    ) -> Result<Resolution, RepositoryError> {
        let scoring = self.engine.score(request, lab.capacity, history, today);
        if !scoring.accepted {
            info!(
                lab = %request.lab_number,
                requester = %request.requester.email,
                score = scoring.score,
                flags = ?scoring.flags,
                "request rejected by score"
            );
            return Ok(Resolution {
                scoring,
                decision: Decision::RejectedByScore,
                conflict: None,
            });
        }

        let conflict =
            self.detector
                .find_conflict_excluding(&request.lab_number, &request.slot(), exclude)?;
        let decision = decide(scoring.score, conflict.as_ref(), &self.policy);

        info!(
            lab = %request.lab_number,
            date = %request.date,
            interval = %request.interval(),
            score = scoring.score,
            conflict = conflict.as_ref().map(Conflict::reason_code),
            ?decision,
            "resolved reservation request"
        );

        Ok(Resolution {
            scoring,
            decision,
            conflict,
        })
    }
}
