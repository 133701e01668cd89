use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use lab_arbiter::allocation::{
    Alternatives, BookingSample, Lab, LabNumber, LabStatus, LabStore, NewReservation, Notifier,
    NotifyError, RepositoryError, Reservation, ReservationFilter, ReservationId,
    ReservationStatus, Session, TimeSlot, TimetableEntry, UserHistorySnapshot,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// A class that occupies a room in the same session every weekday.
#[derive(Debug, Clone)]
struct WeeklyClass {
    room: &'static str,
    session: Session,
    class_name: &'static str,
    section: &'static str,
    batch: &'static str,
    subject: &'static str,
    faculty: &'static str,
    start: (u32, u32),
    end: (u32, u32),
}

impl WeeklyClass {
    fn entry_on(&self, date: NaiveDate) -> TimetableEntry {
        TimetableEntry {
            room_number: LabNumber::new(self.room),
            date,
            session: self.session,
            class_name: self.class_name.to_string(),
            section: self.section.to_string(),
            batch: self.batch.to_string(),
            subject: self.subject.to_string(),
            faculty_name: self.faculty.to_string(),
            start_time: NaiveTime::from_hms_opt(self.start.0, self.start.1, 0),
            end_time: NaiveTime::from_hms_opt(self.end.0, self.end.1, 0),
        }
    }
}

#[derive(Default)]
struct Ledger {
    next_id: u64,
    reservations: BTreeMap<ReservationId, Reservation>,
}

/// Process-local [`LabStore`] seeded with the campus lab inventory and weekday timetable.
#[derive(Clone)]
pub(crate) struct InMemoryLabStore {
    labs: Arc<Vec<Lab>>,
    classes: Arc<Vec<WeeklyClass>>,
    ledger: Arc<Mutex<Ledger>>,
}

impl InMemoryLabStore {
    pub(crate) fn campus() -> Self {
        Self {
            labs: Arc::new(campus_labs()),
            classes: Arc::new(weekly_classes()),
            ledger: Arc::new(Mutex::new(Ledger::default())),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find_lab(&self, lab_number: &LabNumber) -> Option<&Lab> {
        self.labs.iter().find(|lab| &lab.lab_number == lab_number)
    }
}

impl LabStore for InMemoryLabStore {
    fn active_labs(&self) -> Result<Vec<Lab>, RepositoryError> {
        Ok(self
            .labs
            .iter()
            .filter(|lab| lab.is_active())
            .cloned()
            .collect())
    }

    fn lab(&self, lab_number: &LabNumber) -> Result<Option<Lab>, RepositoryError> {
        Ok(self.find_lab(lab_number).cloned())
    }

    fn timetable_entries(
        &self,
        room: &LabNumber,
        date: NaiveDate,
        session: Session,
    ) -> Result<Vec<TimetableEntry>, RepositoryError> {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return Ok(Vec::new());
        }
        Ok(self
            .classes
            .iter()
            .filter(|class| class.room == room.as_str() && class.session == session)
            .map(|class| class.entry_on(date))
            .collect())
    }

    fn reservation_conflict(
        &self,
        lab: &LabNumber,
        slot: &TimeSlot,
        statuses: &[ReservationStatus],
        exclude: Option<ReservationId>,
    ) -> Result<Option<Reservation>, RepositoryError> {
        let ledger = self.ledger();
        Ok(ledger
            .reservations
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
        let mut ledger = self.ledger();
        if let Some(id) = preempt {
            let loser = ledger
                .reservations
                .get_mut(&id)
                .ok_or(RepositoryError::NotFound)?;
            if !loser.status.can_transition_to(ReservationStatus::Rejected) {
                return Err(RepositoryError::Conflict);
            }
            loser.status = ReservationStatus::Rejected;
            loser.updated_at = Some(draft.created_at);
        }
        ledger.next_id += 1;
        let reservation = draft.into_reservation(ReservationId(ledger.next_id));
        ledger
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    fn update_reservation_status(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<(), RepositoryError> {
        let mut ledger = self.ledger();
        let existing = ledger
            .reservations
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        if !existing.status.can_transition_to(status) {
            return Err(RepositoryError::Conflict);
        }
        existing.status = status;
        Ok(())
    }

    fn update_reservation(&self, reservation: Reservation) -> Result<(), RepositoryError> {
        let mut ledger = self.ledger();
        let existing = ledger
            .reservations
            .get_mut(&reservation.id)
            .ok_or(RepositoryError::NotFound)?;
        if !existing.status.is_active() {
            return Err(RepositoryError::Conflict);
        }
        *existing = reservation;
        Ok(())
    }

    fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, RepositoryError> {
        Ok(self.ledger().reservations.get(&id).cloned())
    }

    fn reservations(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>, RepositoryError> {
        Ok(self
            .ledger()
            .reservations
            .values()
            .filter(|reservation| filter.matches(reservation))
            .cloned()
            .collect())
    }

    /// Derived from stored reservations: every booking counts, approved ones contribute samples.
    fn user_history(&self, requester: &str) -> Result<Option<UserHistorySnapshot>, RepositoryError> {
        let ledger = self.ledger();
        let mut owned: Vec<&Reservation> = ledger
            .reservations
            .values()
            .filter(|reservation| reservation.request.requester.email.eq_ignore_ascii_case(requester))
            .collect();
        if owned.is_empty() {
            return Ok(None);
        }
        owned.sort_by_key(|reservation| (reservation.created_at, reservation.id));

        let cancellations = owned
            .iter()
            .filter(|reservation| reservation.status == ReservationStatus::Cancelled)
            .count();
        let samples = owned
            .iter()
            .filter(|reservation| reservation.status == ReservationStatus::Approved)
            .filter_map(|reservation| {
                let capacity = self.find_lab(reservation.lab_number())?.capacity;
                (capacity > 0).then(|| BookingSample {
                    utilization: f64::from(reservation.request.participants) / f64::from(capacity),
                    participants: reservation.request.participants,
                })
            })
            .collect();

        Ok(Some(UserHistorySnapshot {
            requester: requester.to_string(),
            bookings: owned.len() as u32,
            cancellations: cancellations as u32,
            samples,
        }))
    }
}

/// Notifier that records every lifecycle event in the structured log.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify_approved(&self, reservation: &Reservation) -> Result<(), NotifyError> {
        info!(
            reservation_id = %reservation.id,
            requester = %reservation.request.requester.email,
            lab = %reservation.lab_number(),
            "reservation approved"
        );
        Ok(())
    }

    fn notify_pending(
        &self,
        reservation: &Reservation,
        alternatives: &Alternatives,
    ) -> Result<(), NotifyError> {
        info!(
            reservation_id = %reservation.id,
            requester = %reservation.request.requester.email,
            alternative_labs = alternatives.labs.len(),
            alternative_times = alternatives.times.len(),
            "reservation pending review"
        );
        Ok(())
    }

    fn notify_rejected(&self, reservation: &Reservation, reason: &str) -> Result<(), NotifyError> {
        info!(
            reservation_id = %reservation.id,
            requester = %reservation.request.requester.email,
            reason,
            "reservation rejected"
        );
        Ok(())
    }

    fn notify_modified(
        &self,
        reservation: &Reservation,
        changed_fields: &[String],
    ) -> Result<(), NotifyError> {
        info!(
            reservation_id = %reservation.id,
            changed = %changed_fields.join(","),
            "reservation modified"
        );
        Ok(())
    }

    fn notify_cancelled(&self, reservation: &Reservation) -> Result<(), NotifyError> {
        info!(reservation_id = %reservation.id, "reservation cancelled");
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_clock_time(raw: &str) -> Result<NaiveTime, String> {
    lab_arbiter::allocation::parse_time(raw)
}

fn campus_labs() -> Vec<Lab> {
    let lab = |number: &str, building: &str, floor: i32, capacity: u32, equipment: &str| Lab {
        lab_number: LabNumber::new(number),
        building: building.to_string(),
        floor,
        capacity,
        equipment: equipment.to_string(),
        status: LabStatus::Active,
    };
    vec![
        lab("E401", "Engineering Block", 4, 60, "Computers, Projector, Whiteboard"),
        lab("E402", "Engineering Block", 4, 50, "Computers, Projector"),
        lab("E403", "Engineering Block", 4, 45, "Computers, Smart Board"),
        lab("E301", "Engineering Block", 3, 40, "Computers, Projector"),
        lab("E302", "Engineering Block", 3, 40, "Computers"),
        lab("E201", "Engineering Block", 2, 35, "Computers, Projector"),
        lab("E202", "Engineering Block", 2, 30, "Computers"),
        lab("CS-Lab1", "CS Block", 1, 55, "High-end Workstations, Multiple Monitors"),
        lab("CS-Lab2", "CS Block", 1, 55, "Workstations, Network Equipment"),
        lab("CS-Lab3", "CS Block", 2, 45, "Computers, Server Rack"),
        lab("ECE-Lab1", "ECE Block", 1, 40, "Oscilloscopes, Signal Generators"),
        lab("ECE-Lab2", "ECE Block", 1, 40, "VLSI Equipment, Testing Boards"),
        lab("Mech-Lab1", "Mechanical Block", 1, 30, "Workbenches, Tools"),
        lab("Seminar-Hall", "Main Building", 2, 100, "Projector, Audio System, Stage"),
        lab("Conference-Room", "Admin Block", 3, 25, "Video Conferencing, Whiteboard"),
    ]
}

fn weekly_classes() -> Vec<WeeklyClass> {
    #[allow(clippy::too_many_arguments)]
    fn class(
        room: &'static str,
        session: Session,
        class_name: &'static str,
        section: &'static str,
        batch: &'static str,
        subject: &'static str,
        faculty: &'static str,
        start: (u32, u32),
        end: (u32, u32),
    ) -> WeeklyClass {
        WeeklyClass {
            room,
            session,
            class_name,
            section,
            batch,
            subject,
            faculty,
            start,
            end,
        }
    }

    use Session::{Afternoon, Morning};
    vec![
        class("E401", Morning, "CSDS", "A", "2022", "Operating Systems", "Dr. Madhuri", (9, 0), (11, 0)),
        class("E401", Afternoon, "CSE", "B", "2023", "Data Structures", "Dr. Ramesh", (14, 0), (16, 0)),
        class("E402", Morning, "ECE", "A", "2022", "Digital Signal Processing", "Dr. Kavitha", (9, 0), (11, 0)),
        class("E403", Morning, "IT", "A", "2023", "Database Management", "Dr. Suresh", (9, 0), (11, 0)),
        class("E301", Afternoon, "CSE", "C", "2024", "Programming Fundamentals", "Dr. Priya", (14, 0), (16, 0)),
        class("CS-Lab1", Morning, "CSDS", "B", "2022", "Machine Learning", "Dr. Anil", (9, 0), (12, 0)),
        class("CS-Lab2", Afternoon, "CSE", "A", "2023", "Computer Networks", "Dr. Vijay", (14, 0), (17, 0)),
        class("ECE-Lab1", Morning, "ECE", "B", "2023", "VLSI Design", "Dr. Lakshmi", (9, 0), (12, 0)),
    ]
}
