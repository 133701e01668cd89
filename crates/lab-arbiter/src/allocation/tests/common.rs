use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::allocation::alternatives::Alternatives;
use crate::allocation::clock::FixedClock;
use crate::allocation::domain::{
    Lab, LabNumber, LabStatus, NewReservation, ProofType, Purpose, Requester, RequesterRole,
    Reservation, ReservationId, ReservationRequest, ReservationStatus, TimetableEntry, Urgency,
    UserHistorySnapshot,
};
use crate::allocation::interval::{Session, TimeSlot};
use crate::allocation::policy::AllocationPolicy;
use crate::allocation::repository::{
    LabStore, Notifier, NotifyError, RepositoryError, ReservationFilter,
};
use crate::allocation::scoring::{ScoringConfig, ScoringEngine};
use crate::allocation::service::ReservationService;

pub(super) fn booking_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 3).expect("valid date")
}

pub(super) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
}

pub(super) fn now() -> NaiveDateTime {
    today().and_hms_opt(10, 0, 0).expect("valid time")
}

pub(super) fn time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).expect("valid time")
}

pub(super) fn lab(number: &str, capacity: u32) -> Lab {
    Lab {
        lab_number: LabNumber::new(number),
        building: "Main Block".to_string(),
        floor: 4,
        capacity,
        equipment: "40 workstations, projector".to_string(),
        status: LabStatus::Active,
    }
}

pub(super) fn labs() -> Vec<Lab> {
    let mut closed = lab("E999", 40);
    closed.status = LabStatus::Inactive;
    vec![
        lab("E401", 40),
        lab("E402", 40),
        lab("E301", 60),
        lab("E101", 20),
        closed,
    ]
}

/// Faculty workshop with proof and a detailed description. Scores 95 in E401.
pub(super) fn strong_request() -> ReservationRequest {
    ReservationRequest {
        lab_number: LabNumber::new("E401"),
        date: booking_date(),
        start_time: time(14),
        end_time: time(16),
        participants: 36,
        purpose: Purpose::Workshop,
        description: "Hands-on workshop for students from CSE on March 3 at 14:00 with Prof. Rao in room 204"
            .to_string(),
        urgency: Urgency::Normal,
        requester: Requester {
            email: "rao@campus.edu".to_string(),
            name: "Prof. Rao".to_string(),
        },
        has_proof: true,
        proof_type: Some(ProofType::FacultyApproval),
        role: RequesterRole::Faculty,
    }
}

/// Student study group at 65% utilization. Accepted but below auto-approve.
pub(super) fn moderate_request() -> ReservationRequest {
    ReservationRequest {
        participants: 26,
        purpose: Purpose::Practice,
        description: "Study group session for students from the CSE department in the afternoon"
            .to_string(),
        requester: Requester {
            email: "meera@campus.edu".to_string(),
            name: "Meera".to_string(),
        },
        has_proof: false,
        proof_type: None,
        role: RequesterRole::Student,
        ..strong_request()
    }
}

/// Unproven exam for five people in a forty-seat lab.
pub(super) fn weak_request() -> ReservationRequest {
    ReservationRequest {
        participants: 5,
        purpose: Purpose::Exam,
        description: "exam".to_string(),
        requester: Requester {
            email: "sam@campus.edu".to_string(),
            name: "Sam".to_string(),
        },
        has_proof: false,
        proof_type: None,
        role: RequesterRole::Student,
        ..strong_request()
    }
}

pub(super) fn timetable_entry(room: &str, session: Session) -> TimetableEntry {
    TimetableEntry {
        room_number: LabNumber::new(room),
        date: booking_date(),
        session,
        class_name: "CSE".to_string(),
        section: "A".to_string(),
        batch: "2024".to_string(),
        subject: "Data Structures".to_string(),
        faculty_name: "Dr. Kumar".to_string(),
        start_time: None,
        end_time: None,
    }
}

pub(super) fn scoring_engine() -> ScoringEngine {
    ScoringEngine::new(ScoringConfig::default()).expect("default scoring config compiles")
}

pub(super) fn build_service() -> (
    ReservationService<MemoryStore, MemoryNotifier>,
    Arc<MemoryStore>,
    Arc<MemoryNotifier>,
) {
    let store = Arc::new(MemoryStore::with_labs(labs()));
    let notifier = Arc::new(MemoryNotifier::default());
    let service = service_with(Arc::clone(&store), Arc::clone(&notifier));
    (service, store, notifier)
}

pub(super) fn service_with<S, N>(store: Arc<S>, notifier: Arc<N>) -> ReservationService<S, N>
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    ReservationService::with_clock(
        store,
        notifier,
        Arc::new(scoring_engine()),
        AllocationPolicy::default(),
        Arc::new(FixedClock(now())),
    )
}

#[derive(Default)]
pub(super) struct MemoryStore {
    labs: Mutex<Vec<Lab>>,
    timetable: Mutex<Vec<TimetableEntry>>,
    reservations: Mutex<BTreeMap<ReservationId, Reservation>>,
    histories: Mutex<HashMap<String, UserHistorySnapshot>>,
    change_after_read: Mutex<Option<(ReservationId, ReservationStatus)>>,
    next_id: AtomicU64,
}

impl MemoryStore {
    pub(super) fn with_labs(labs: Vec<Lab>) -> Self {
        let store = Self::default();
        *store.labs.lock().expect("labs mutex poisoned") = labs;
        store
    }

    pub(super) fn add_class(&self, entry: TimetableEntry) {
        self.timetable
            .lock()
            .expect("timetable mutex poisoned")
            .push(entry);
    }

    /// After the next read of `id` returns, move it to `status` as a concurrent writer would.
    pub(super) fn change_status_after_next_read(&self, id: ReservationId, status: ReservationStatus) {
        *self.change_after_read.lock().expect("change mutex poisoned") = Some((id, status));
    }

    pub(super) fn set_history(&self, history: UserHistorySnapshot) {
        self.histories
            .lock()
            .expect("history mutex poisoned")
            .insert(history.requester.clone(), history);
    }

    /// Store a reservation directly, bypassing scoring.
    pub(super) fn seed(
        &self,
        request: ReservationRequest,
        priority_score: f64,
        status: ReservationStatus,
    ) -> Reservation {
        self.commit_allocation(
            NewReservation {
                request,
                priority_score,
                status,
                created_at: now(),
            },
            None,
        )
        .expect("seed reservation")
    }

    pub(super) fn stored(&self, id: ReservationId) -> Reservation {
        self.reservations
            .lock()
            .expect("reservation mutex poisoned")
            .get(&id)
            .cloned()
            .expect("reservation stored")
    }

    pub(super) fn count(&self) -> usize {
        self.reservations
            .lock()
            .expect("reservation mutex poisoned")
            .len()
    }
}

impl LabStore for MemoryStore {
    fn active_labs(&self) -> Result<Vec<Lab>, RepositoryError> {
        let labs = self.labs.lock().expect("labs mutex poisoned");
        Ok(labs.iter().filter(|lab| lab.is_active()).cloned().collect())
    }

    fn lab(&self, lab_number: &LabNumber) -> Result<Option<Lab>, RepositoryError> {
        let labs = self.labs.lock().expect("labs mutex poisoned");
        Ok(labs
            .iter()
            .find(|lab| &lab.lab_number == lab_number)
            .cloned())
    }

    fn timetable_entries(
        &self,
        room: &LabNumber,
        date: NaiveDate,
        session: Session,
    ) -> Result<Vec<TimetableEntry>, RepositoryError> {
        let timetable = self.timetable.lock().expect("timetable mutex poisoned");
        Ok(timetable
            .iter()
            .filter(|entry| &entry.room_number == room && entry.date == date && entry.session == session)
            .cloned()
            .collect())
    }

    fn reservation_conflict(
        &self,
        lab: &LabNumber,
        slot: &TimeSlot,
        statuses: &[ReservationStatus],
        exclude: Option<ReservationId>,
    ) -> Result<Option<Reservation>, RepositoryError> {
        let reservations = self.reservations.lock().expect("reservation mutex poisoned");
        Ok(reservations
            .values()
            .find(|existing| {
                Some(existing.id) != exclude
                    && existing.lab_number() == lab
                    && statuses.contains(&existing.status)
                    && existing.slot().overlaps(slot)
            })
            .cloned())
    }

    fn commit_allocation(
        &self,
        draft: NewReservation,
        preempt: Option<ReservationId>,
    ) -> Result<Reservation, RepositoryError> {
        let mut reservations = self.reservations.lock().expect("reservation mutex poisoned");
        if let Some(preempted_id) = preempt {
            let preempted = reservations
                .get_mut(&preempted_id)
                .ok_or(RepositoryError::NotFound)?;
            if !preempted.status.is_active() {
                return Err(RepositoryError::Conflict);
            }
            preempted.status = ReservationStatus::Rejected;
            preempted.updated_at = Some(draft.created_at);
        }

        let id = ReservationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let reservation = draft.into_reservation(id);
        reservations.insert(id, reservation.clone());
        Ok(reservation)
    }

    fn update_reservation_status(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<(), RepositoryError> {
        let mut reservations = self.reservations.lock().expect("reservation mutex poisoned");
        let existing = reservations.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if !existing.status.can_transition_to(status) {
            return Err(RepositoryError::Conflict);
        }
        existing.status = status;
        Ok(())
    }

    fn update_reservation(&self, reservation: Reservation) -> Result<(), RepositoryError> {
        let mut reservations = self.reservations.lock().expect("reservation mutex poisoned");
        let existing = reservations
            .get_mut(&reservation.id)
            .ok_or(RepositoryError::NotFound)?;
        if !existing.status.is_active() {
            return Err(RepositoryError::Conflict);
        }
        *existing = reservation;
        Ok(())
    }

    fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, RepositoryError> {
        let mut reservations = self.reservations.lock().expect("reservation mutex poisoned");
        let found = reservations.get(&id).cloned();
        let mut change = self.change_after_read.lock().expect("change mutex poisoned");
        if let Some((target, status)) = *change {
            if target == id {
                if let Some(stored) = reservations.get_mut(&id) {
                    stored.status = status;
                }
                *change = None;
            }
        }
        Ok(found)
    }

    fn reservations(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, RepositoryError> {
        let reservations = self.reservations.lock().expect("reservation mutex poisoned");
        Ok(reservations
            .values()
            .filter(|reservation| filter.matches(reservation))
            .cloned()
            .collect())
    }

    fn user_history(&self, requester: &str) -> Result<Option<UserHistorySnapshot>, RepositoryError> {
        let histories = self.histories.lock().expect("history mutex poisoned");
        Ok(histories.get(requester).cloned())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Sent {
    Approved(ReservationId),
    Pending {
        id: ReservationId,
        alternative_labs: usize,
    },
    Rejected {
        id: ReservationId,
        reason: String,
    },
    Modified {
        id: ReservationId,
        fields: Vec<String>,
    },
    Cancelled(ReservationId),
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    fn record(&self, message: Sent) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(message);
        Ok(())
    }
}

impl Notifier for MemoryNotifier {
    fn notify_approved(&self, reservation: &Reservation) -> Result<(), NotifyError> {
        self.record(Sent::Approved(reservation.id))
    }

    fn notify_pending(
        &self,
        reservation: &Reservation,
        alternatives: &Alternatives,
    ) -> Result<(), NotifyError> {
        self.record(Sent::Pending {
            id: reservation.id,
            alternative_labs: alternatives.labs.len(),
        })
    }

    fn notify_rejected(&self, reservation: &Reservation, reason: &str) -> Result<(), NotifyError> {
        self.record(Sent::Rejected {
            id: reservation.id,
            reason: reason.to_string(),
        })
    }

    fn notify_modified(
        &self,
        reservation: &Reservation,
        changed_fields: &[String],
    ) -> Result<(), NotifyError> {
        self.record(Sent::Modified {
            id: reservation.id,
            fields: changed_fields.to_vec(),
        })
    }

    fn notify_cancelled(&self, reservation: &Reservation) -> Result<(), NotifyError> {
        self.record(Sent::Cancelled(reservation.id))
    }
}

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify_approved(&self, _reservation: &Reservation) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp offline".to_string()))
    }

    fn notify_pending(
        &self,
        _reservation: &Reservation,
        _alternatives: &Alternatives,
    ) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp offline".to_string()))
    }

    fn notify_rejected(&self, _reservation: &Reservation, _reason: &str) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp offline".to_string()))
    }

    fn notify_modified(
        &self,
        _reservation: &Reservation,
        _changed_fields: &[String],
    ) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp offline".to_string()))
    }

    fn notify_cancelled(&self, _reservation: &Reservation) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp offline".to_string()))
    }
}

pub(super) struct UnavailableStore;

impl LabStore for UnavailableStore {
    fn active_labs(&self) -> Result<Vec<Lab>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn lab(&self, _lab_number: &LabNumber) -> Result<Option<Lab>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn timetable_entries(
        &self,
        _room: &LabNumber,
        _date: NaiveDate,
        _session: Session,
    ) -> Result<Vec<TimetableEntry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn reservation_conflict(
        &self,
        _lab: &LabNumber,
        _slot: &TimeSlot,
        _statuses: &[ReservationStatus],
        _exclude: Option<ReservationId>,
    ) -> Result<Option<Reservation>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit_allocation(
        &self,
        _draft: NewReservation,
        _preempt: Option<ReservationId>,
    ) -> Result<Reservation, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_reservation_status(
        &self,
        _id: ReservationId,
        _status: ReservationStatus,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_reservation(&self, _reservation: Reservation) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn reservation(&self, _id: ReservationId) -> Result<Option<Reservation>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn reservations(&self, _filter: &ReservationFilter) -> Result<Vec<Reservation>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn user_history(&self, _requester: &str) -> Result<Option<UserHistorySnapshot>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
