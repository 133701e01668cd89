use std::sync::Arc;

use super::common::*;
use crate::allocation::conflict::{Conflict, ConflictDetector};
use crate::allocation::domain::{LabNumber, ReservationRequest, ReservationStatus, TimetableEntry};
use crate::allocation::interval::{Interval, Session, TimeSlot};

fn slot(start: u32, end: u32) -> TimeSlot {
    TimeSlot::new(booking_date(), Interval::new(time(start), time(end)))
}

fn detector() -> (ConflictDetector<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_labs(labs()));
    (ConflictDetector::new(Arc::clone(&store)), store)
}

fn booked(start: u32, end: u32) -> ReservationRequest {
    ReservationRequest {
        start_time: time(start),
        end_time: time(end),
        ..strong_request()
    }
}

#[test]
fn overlapping_reservation_is_reported_with_its_score() {
    let (detector, store) = detector();
    let existing = store.seed(booked(9, 11), 62.5, ReservationStatus::Approved);

    let conflict = detector
        .find_conflict(&LabNumber::new("E401"), &slot(10, 12))
        .expect("lookup")
        .expect("conflict");

    match conflict {
        Conflict::Reservation {
            reservation_id,
            priority_score,
            status,
            ..
        } => {
            assert_eq!(reservation_id, existing.id);
            assert_eq!(priority_score, 62.5);
            assert_eq!(status, ReservationStatus::Approved);
        }
        other => panic!("expected reservation conflict, got {other:?}"),
    }
}

#[test]
fn touching_intervals_do_not_conflict() {
    let (detector, store) = detector();
    store.seed(booked(9, 11), 70.0, ReservationStatus::Approved);

    let conflict = detector
        .find_conflict(&LabNumber::new("E401"), &slot(11, 13))
        .expect("lookup");
    assert!(conflict.is_none());
}

#[test]
fn inactive_reservations_are_ignored() {
    let (detector, store) = detector();
    store.seed(booked(14, 16), 70.0, ReservationStatus::Cancelled);
    store.seed(booked(14, 16), 70.0, ReservationStatus::Rejected);

    let conflict = detector
        .find_conflict(&LabNumber::new("E401"), &slot(14, 16))
        .expect("lookup");
    assert!(conflict.is_none());
}

#[test]
fn other_labs_and_dates_do_not_conflict() {
    let (detector, store) = detector();
    store.seed(booked(14, 16), 70.0, ReservationStatus::Pending);

    let other_lab = detector
        .find_conflict(&LabNumber::new("E402"), &slot(14, 16))
        .expect("lookup");
    assert!(other_lab.is_none());

    let next_day = TimeSlot::new(
        booking_date().succ_opt().expect("next day"),
        Interval::new(time(14), time(16)),
    );
    let other_date = detector
        .find_conflict(&LabNumber::new("E401"), &next_day)
        .expect("lookup");
    assert!(other_date.is_none());
}

#[test]
fn fixed_class_wins_over_reservations() {
    let (detector, store) = detector();
    store.seed(booked(14, 16), 30.0, ReservationStatus::Pending);
    store.add_class(timetable_entry("E401", Session::Afternoon));

    let conflict = detector
        .find_conflict(&LabNumber::new("E401"), &slot(16, 18))
        .expect("lookup")
        .expect("class conflict");
    assert!(conflict.is_fixed_class());
    assert_eq!(conflict.reason_code(), "occupied_by_class");

    let morning = detector
        .find_conflict(&LabNumber::new("E401"), &slot(9, 11))
        .expect("lookup");
    assert!(morning.is_none());
}

#[test]
fn class_in_a_later_session_blocks_a_spanning_request() {
    let (detector, store) = detector();
    store.add_class(timetable_entry("E401", Session::Afternoon));

    let all_day = detector
        .find_conflict(&LabNumber::new("E401"), &slot(9, 17))
        .expect("lookup")
        .expect("class conflict");
    match all_day {
        Conflict::FixedClass { entry } => assert_eq!(entry.session, Session::Afternoon),
        other => panic!("expected fixed class, got {other:?}"),
    }

    let into_evening = detector
        .find_conflict(&LabNumber::new("E401"), &slot(11, 19))
        .expect("lookup");
    assert!(into_evening.is_some_and(|conflict| conflict.is_fixed_class()));

    let morning_only = detector
        .find_conflict(&LabNumber::new("E401"), &slot(9, 12))
        .expect("lookup");
    assert!(morning_only.is_none());
}

#[test]
fn explicit_class_times_narrow_the_blocked_window() {
    let (detector, store) = detector();
    store.add_class(TimetableEntry {
        start_time: Some(time(9)),
        end_time: Some(time(11)),
        ..timetable_entry("E401", Session::Morning)
    });
    store.add_class(TimetableEntry {
        start_time: Some(time(14)),
        end_time: Some(time(15)),
        ..timetable_entry("E401", Session::Afternoon)
    });

    let after_class = detector
        .find_conflict(&LabNumber::new("E401"), &slot(11, 12))
        .expect("lookup");
    assert!(after_class.is_none());

    let overlapping = detector
        .find_conflict(&LabNumber::new("E401"), &slot(10, 12))
        .expect("lookup")
        .expect("class conflict");
    assert!(overlapping.is_fixed_class());

    let late_afternoon = detector
        .find_conflict(&LabNumber::new("E401"), &slot(15, 17))
        .expect("lookup");
    assert!(late_afternoon.is_none());

    let across_both = detector
        .find_fixed_class(&LabNumber::new("E401"), &slot(11, 15))
        .expect("lookup")
        .expect("afternoon class");
    assert_eq!(across_both.start_time, Some(time(14)));
}

#[test]
fn excluded_reservation_is_skipped() {
    let (detector, store) = detector();
    let existing = store.seed(booked(14, 16), 70.0, ReservationStatus::Approved);

    let conflict = detector
        .find_conflict_excluding(&LabNumber::new("E401"), &slot(15, 17), Some(existing.id))
        .expect("lookup");
    assert!(conflict.is_none());
}

#[test]
fn store_failures_propagate() {
    let detector = ConflictDetector::new(Arc::new(UnavailableStore));
    let result = detector.find_conflict(&LabNumber::new("E401"), &slot(9, 11));
    assert!(result.is_err());
}
