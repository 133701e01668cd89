use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::conflict::ConflictDetector;
use super::domain::{LabNumber, ReservationRequest};
use super::interval::{hhmm, Interval, Session, TimeSlot};
use super::repository::{LabStore, RepositoryError};

const MAX_LAB_ALTERNATIVES: usize = 5;
const MAX_TIME_ALTERNATIVES: usize = 3;

/// Fixed slots offered when no other lab is free.
pub fn slot_catalog() -> Vec<Interval> {
    [(9, 11), (11, 13), (14, 16), (16, 18)]
        .into_iter()
        .filter_map(|(start, end)| {
            Some(Interval::new(
                NaiveTime::from_hms_opt(start, 0, 0)?,
                NaiveTime::from_hms_opt(end, 0, 0)?,
            ))
        })
        .collect()
}

/// What the suggester needs to know about the unsatisfied request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeQuery {
    pub lab_number: LabNumber,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(alias = "num_participants")]
    pub participants: u32,
}

impl AlternativeQuery {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot::new(self.date, Interval::new(self.start_time, self.end_time))
    }
}

impl From<&ReservationRequest> for AlternativeQuery {
    fn from(request: &ReservationRequest) -> Self {
        Self {
            lab_number: request.lab_number.clone(),
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            participants: request.participants,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabAlternative {
    pub lab_number: LabNumber,
    pub building: String,
    pub floor: i32,
    pub capacity: u32,
    pub equipment: String,
    pub is_original: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAlternative {
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub session: Session,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternatives {
    #[serde(rename = "alternative_labs")]
    pub labs: Vec<LabAlternative>,
    #[serde(rename = "alternative_times")]
    pub times: Vec<TimeAlternative>,
}

impl Alternatives {
    pub fn is_empty(&self) -> bool {
        self.labs.is_empty() && self.times.is_empty()
    }
}

/// Searches other labs at the same slot, then other catalog slots in the same lab.
pub struct AlternativeSuggester<S> {
    store: Arc<S>,
    detector: ConflictDetector<S>,
}

impl<S> AlternativeSuggester<S>
where
    S: LabStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        let detector = ConflictDetector::new(Arc::clone(&store));
        Self { store, detector }
    }

    pub fn suggest(&self, query: &AlternativeQuery) -> Result<Alternatives, RepositoryError> {
        let labs = self.lab_alternatives(query)?;
        let times = if labs.is_empty() {
            self.time_alternatives(query)?
        } else {
            Vec::new()
        };
        Ok(Alternatives { labs, times })
    }

    fn lab_alternatives(&self, query: &AlternativeQuery) -> Result<Vec<LabAlternative>, RepositoryError> {
        let slot = query.slot();
        let mut found = Vec::new();

        for lab in self.store.active_labs()? {
            if found.len() == MAX_LAB_ALTERNATIVES {
                break;
            }
            if !lab.is_active() || lab.capacity < query.participants {
                continue;
            }
            if self.detector.find_conflict(&lab.lab_number, &slot)?.is_some() {
                continue;
            }
            let is_original = lab.lab_number == query.lab_number;
            found.push(LabAlternative {
                lab_number: lab.lab_number,
                building: lab.building,
                floor: lab.floor,
                capacity: lab.capacity,
                equipment: lab.equipment,
                is_original,
            });
        }

        Ok(found)
    }

    fn time_alternatives(&self, query: &AlternativeQuery) -> Result<Vec<TimeAlternative>, RepositoryError> {
        let requested = Interval::new(query.start_time, query.end_time);
        let mut found = Vec::new();

        for interval in slot_catalog() {
            if found.len() == MAX_TIME_ALTERNATIVES {
                break;
            }
            if interval == requested {
                continue;
            }
            let slot = TimeSlot::new(query.date, interval);
            if self
                .detector
                .find_reservation_conflict(&query.lab_number, &slot, None)?
                .is_some()
            {
                continue;
            }
            found.push(TimeAlternative {
                start_time: interval.start,
                end_time: interval.end,
                session: interval.session(),
            });
        }

        Ok(found)
    }
}
