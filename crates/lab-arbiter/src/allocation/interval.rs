use std::fmt;

use chrono::{Duration, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const TIME_FORMAT: &str = "%H:%M";

/// Parse an `HH:MM` wall-clock time. Seconds are not accepted.
pub fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT)
        .map_err(|err| format!("failed to parse '{raw}' as HH:MM ({err})"))
}

pub fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

pub(crate) mod hhmm {
    use super::*;

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_time(*time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod hhmm_option {
    use super::*;

    pub fn serialize<S: Serializer>(
        time: &Option<NaiveTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(time) => serializer.serialize_some(&format_time(*time)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .map(|raw| parse_time(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Half-open `[start, end)` range of local wall-clock time.
///
/// Callers must ensure `start < end`; the model itself does not validate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl Interval {
    pub const fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Build from two `HH:MM` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, String> {
        Ok(Self::new(parse_time(start)?, parse_time(end)?))
    }

    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn session(&self) -> Session {
        Session::for_start(self.start)
    }

    /// Every session the interval touches, in day order. The end is exclusive.
    pub fn sessions(&self) -> Vec<Session> {
        let first = self.session();
        let last = Session::for_start(self.end - Duration::minutes(1));
        if last < first || !self.is_well_formed() {
            return vec![first];
        }
        Session::ALL
            .into_iter()
            .filter(|session| (first..=last).contains(session))
            .collect()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_time(self.start), format_time(self.end))
    }
}

/// A concrete date plus interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSlot {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub interval: Interval,
}

impl TimeSlot {
    pub const fn new(date: NaiveDate, interval: Interval) -> Self {
        Self { date, interval }
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.date == other.date && self.interval.overlaps(&other.interval)
    }
}

/// Coarse part of the day used by the fixed timetable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Morning,
    Afternoon,
    Evening,
}

impl Session {
    pub const ALL: [Session; 3] = [Session::Morning, Session::Afternoon, Session::Evening];

    pub fn for_start(start: NaiveTime) -> Self {
        match start.hour() {
            0..=11 => Session::Morning,
            12..=17 => Session::Afternoon,
            _ => Session::Evening,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Session::Morning => "morning",
            Session::Afternoon => "afternoon",
            Session::Evening => "evening",
        }
    }
}
