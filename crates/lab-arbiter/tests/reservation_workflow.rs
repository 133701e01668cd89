//! End-to-end reservation scenarios driven through the public service facade and router.

mod common {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    use lab_arbiter::allocation::{
        AllocationPolicy, Alternatives, FixedClock, Lab, LabNumber, LabStatus, LabStore,
        NewReservation, Notifier, NotifyError, ProofType, Purpose, RepositoryError, Requester,
        RequesterRole, Reservation, ReservationFilter, ReservationId, ReservationRequest,
        ReservationService, ReservationStatus, ScoringConfig, ScoringEngine, Session, TimeSlot,
        TimetableEntry, Urgency, UserHistorySnapshot,
    };

    pub(super) fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 12).expect("valid date")
    }

    pub(super) fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 4)
            .and_then(|day| day.and_hms_opt(9, 30, 0))
            .expect("valid timestamp")
    }

    pub(super) fn at(hour: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, 0, 0).expect("valid time")
    }

    pub(super) fn request(requester: &str, participants: u32) -> ReservationRequest {
        ReservationRequest {
            lab_number: LabNumber::new("CS-Lab1"),
            date: date(),
            start_time: at(9),
            end_time: at(11),
            participants,
            purpose: Purpose::Research,
            description: "Model training session for members of the vision group with Dr. Iyer in lab 3"
                .to_string(),
            urgency: Urgency::Normal,
            requester: Requester {
                email: format!("{requester}@campus.edu"),
                name: requester.to_string(),
            },
            has_proof: true,
            proof_type: Some(ProofType::OfficialLetter),
            role: RequesterRole::Phd,
        }
    }

    #[derive(Default)]
    pub(super) struct SharedStore {
        labs: Vec<Lab>,
        reservations: Mutex<BTreeMap<ReservationId, Reservation>>,
    }

    impl SharedStore {
        pub(super) fn campus() -> Self {
            let lab = |number: &str, capacity: u32| Lab {
                lab_number: LabNumber::new(number),
                building: "Engineering".to_string(),
                floor: 2,
                capacity,
                equipment: "GPU workstations".to_string(),
                status: LabStatus::Active,
            };
            Self {
                labs: vec![lab("CS-Lab1", 30), lab("CS-Lab2", 30), lab("CS-Lab3", 50)],
                reservations: Mutex::default(),
            }
        }

        pub(super) fn statuses(&self) -> Vec<ReservationStatus> {
            self.reservations
                .lock()
                .expect("store mutex poisoned")
                .values()
                .map(|reservation| reservation.status)
                .collect()
        }
    }

    impl LabStore for SharedStore {
        fn active_labs(&self) -> Result<Vec<Lab>, RepositoryError> {
            Ok(self.labs.clone())
        }

        fn lab(&self, lab_number: &LabNumber) -> Result<Option<Lab>, RepositoryError> {
            Ok(self
                .labs
                .iter()
                .find(|lab| &lab.lab_number == lab_number)
                .cloned())
        }

        fn timetable_entries(
            &self,
            _room: &LabNumber,
            _date: NaiveDate,
            _session: Session,
        ) -> Result<Vec<TimetableEntry>, RepositoryError> {
            Ok(Vec::new())
        }

        fn reservation_conflict(
            &self,
            lab: &LabNumber,
            slot: &TimeSlot,
            statuses: &[ReservationStatus],
            exclude: Option<ReservationId>,
        ) -> Result<Option<Reservation>, RepositoryError> {
            let reservations = self.reservations.lock().expect("store mutex poisoned");
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
            let mut reservations = self.reservations.lock().expect("store mutex poisoned");
            if let Some(id) = preempt {
                let existing = reservations.get_mut(&id).ok_or(RepositoryError::NotFound)?;
                existing.status = ReservationStatus::Rejected;
            }
            let id = ReservationId(reservations.len() as u64 + 1);
            let reservation = draft.into_reservation(id);
            reservations.insert(id, reservation.clone());
            Ok(reservation)
        }

        fn update_reservation_status(
            &self,
            id: ReservationId,
            status: ReservationStatus,
        ) -> Result<(), RepositoryError> {
            let mut reservations = self.reservations.lock().expect("store mutex poisoned");
            let existing = reservations.get_mut(&id).ok_or(RepositoryError::NotFound)?;
            if !existing.status.can_transition_to(status) {
                return Err(RepositoryError::Conflict);
            }
            existing.status = status;
            Ok(())
        }

        fn update_reservation(&self, reservation: Reservation) -> Result<(), RepositoryError> {
            let mut reservations = self.reservations.lock().expect("store mutex poisoned");
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
            let reservations = self.reservations.lock().expect("store mutex poisoned");
            Ok(reservations.get(&id).cloned())
        }

        fn reservations(
            &self,
            filter: &ReservationFilter,
        ) -> Result<Vec<Reservation>, RepositoryError> {
            let reservations = self.reservations.lock().expect("store mutex poisoned");
            Ok(reservations
                .values()
                .filter(|reservation| filter.matches(reservation))
                .cloned()
                .collect())
        }

        fn user_history(
            &self,
            _requester: &str,
        ) -> Result<Option<UserHistorySnapshot>, RepositoryError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    pub(super) struct CountingNotifier {
        pub(super) approvals: Mutex<u32>,
        pub(super) rejections: Mutex<Vec<String>>,
    }

    impl Notifier for CountingNotifier {
        fn notify_approved(&self, _reservation: &Reservation) -> Result<(), NotifyError> {
            *self.approvals.lock().expect("notifier mutex poisoned") += 1;
            Ok(())
        }

        fn notify_pending(
            &self,
            _reservation: &Reservation,
            _alternatives: &Alternatives,
        ) -> Result<(), NotifyError> {
            Ok(())
        }

        fn notify_rejected(
            &self,
            _reservation: &Reservation,
            reason: &str,
        ) -> Result<(), NotifyError> {
            self.rejections
                .lock()
                .expect("notifier mutex poisoned")
                .push(reason.to_string());
            Ok(())
        }

        fn notify_modified(
            &self,
            _reservation: &Reservation,
            _changed_fields: &[String],
        ) -> Result<(), NotifyError> {
            Ok(())
        }

        fn notify_cancelled(&self, _reservation: &Reservation) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    pub(super) fn service() -> (
        Arc<ReservationService<SharedStore, CountingNotifier>>,
        Arc<SharedStore>,
        Arc<CountingNotifier>,
    ) {
        let store = Arc::new(SharedStore::campus());
        let notifier = Arc::new(CountingNotifier::default());
        let engine = ScoringEngine::new(ScoringConfig::default()).expect("default config");
        let service = ReservationService::with_clock(
            Arc::clone(&store),
            Arc::clone(&notifier),
            Arc::new(engine),
            AllocationPolicy::default(),
            Arc::new(FixedClock(now())),
        );
        (Arc::new(service), store, notifier)
    }
}

use std::sync::Arc;
use std::thread;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use lab_arbiter::allocation::{
    reservation_router, Decision, ReservationStatus, SubmissionOutcome,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;

#[test]
fn concurrent_requests_for_one_slot_approve_exactly_one() {
    let (service, store, notifier) = service();

    thread::scope(|scope| {
        for index in 0..8 {
            let service = Arc::clone(&service);
            scope.spawn(move || {
                service
                    .submit(request(&format!("student{index}"), 27))
                    .expect("submit succeeds");
            });
        }
    });

    let statuses = store.statuses();
    assert_eq!(statuses.len(), 8);
    let approved = statuses
        .iter()
        .filter(|status| **status == ReservationStatus::Approved)
        .count();
    assert_eq!(approved, 1, "{statuses:?}");
    assert_eq!(*notifier.approvals.lock().expect("notifier mutex"), 1);
}

#[test]
fn stronger_request_preempts_and_notifies_loser() {
    let (service, store, notifier) = service();

    let first = service.submit(request("club", 18)).expect("submit");
    let first_id = first.reservation().expect("stored").id;
    let first_score = first.scoring().score;

    let second = service.submit(request("lab-lead", 27)).expect("submit");
    let second_score = second.scoring().score;
    assert!(second_score > first_score + 15.0, "{second_score} vs {first_score}");

    match second {
        SubmissionOutcome::Committed { decision, .. } => {
            assert_eq!(
                decision,
                Decision::Approved {
                    preempted: Some(first_id)
                }
            );
        }
        other => panic!("expected committed outcome, got {other:?}"),
    }
    assert_eq!(
        store.statuses(),
        vec![ReservationStatus::Rejected, ReservationStatus::Approved]
    );
    assert_eq!(
        *notifier.rejections.lock().expect("notifier mutex"),
        vec!["Higher priority request received".to_string()]
    );
}

#[tokio::test]
async fn router_round_trip_lists_newest_first() {
    let (service, _store, _notifier) = service();
    let router = reservation_router(service);

    for (start, end) in [(9, 11), (14, 16)] {
        let mut body = serde_json::to_value(request("asha", 27)).expect("json");
        body["start_time"] = json!(format!("{start:02}:00"));
        body["end_time"] = json!(format!("{end:02}:00"));
        let response = router
            .clone()
            .oneshot(
                Request::post("/api/v1/reservations")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&body).expect("encode")))
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = router
        .oneshot(
            Request::get("/api/v1/requesters/asha@campus.edu/reservations")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body");
    let payload: Value = serde_json::from_slice(&bytes).expect("json");
    let ids: Vec<u64> = payload
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|reservation| reservation["id"].as_u64())
        .collect();
    assert_eq!(ids, vec![2, 1]);
}
