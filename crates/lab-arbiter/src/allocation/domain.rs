use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::interval::{hhmm, hhmm_option, Interval, Session, TimeSlot};

/// Unique room identifier such as `E401` or `CS-Lab1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabNumber(pub String);

impl LabNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LabNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabStatus {
    Active,
    Inactive,
}

/// Bookable room as owned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lab {
    pub lab_number: LabNumber,
    pub building: String,
    pub floor: i32,
    pub capacity: u32,
    pub equipment: String,
    pub status: LabStatus,
}

impl Lab {
    pub fn is_active(&self) -> bool {
        self.status == LabStatus::Active
    }
}

/// Fixed class occupancy. Always wins over reservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub room_number: LabNumber,
    pub date: NaiveDate,
    pub session: Session,
    #[serde(rename = "class")]
    pub class_name: String,
    pub section: String,
    pub batch: String,
    pub subject: String,
    pub faculty_name: String,
    #[serde(default, with = "hhmm_option", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, with = "hhmm_option", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,
}

impl TimetableEntry {
    /// Whether the class blocks `interval`. Without explicit times the whole session is held.
    pub fn occupies(&self, interval: &Interval) -> bool {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Interval::new(start, end).overlaps(interval),
            _ => interval.sessions().contains(&self.session),
        }
    }
}

/// Declared reason for a booking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Purpose {
    Workshop,
    Event,
    Meeting,
    Exam,
    Lecture,
    Research,
    Practice,
    Emergency,
    Other(String),
}

impl Purpose {
    pub fn label(&self) -> &str {
        match self {
            Purpose::Workshop => "workshop",
            Purpose::Event => "event",
            Purpose::Meeting => "meeting",
            Purpose::Exam => "exam",
            Purpose::Lecture => "lecture",
            Purpose::Research => "research",
            Purpose::Practice => "practice",
            Purpose::Emergency => "emergency",
            Purpose::Other(raw) => raw,
        }
    }

    /// Purposes that claim academic standing and therefore need evidence.
    pub fn is_academic(&self) -> bool {
        matches!(self, Purpose::Exam | Purpose::Lecture | Purpose::Research)
    }

    /// Purposes that attract low-effort descriptions used to jump the queue.
    pub fn is_high_stakes(&self) -> bool {
        matches!(self, Purpose::Exam | Purpose::Emergency | Purpose::Lecture)
    }
}

impl From<String> for Purpose {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "workshop" => Purpose::Workshop,
            "event" => Purpose::Event,
            "meeting" => Purpose::Meeting,
            "exam" => Purpose::Exam,
            "lecture" => Purpose::Lecture,
            "research" => Purpose::Research,
            "practice" => Purpose::Practice,
            "emergency" => Purpose::Emergency,
            _ => Purpose::Other(value),
        }
    }
}

impl From<Purpose> for String {
    fn from(value: Purpose) -> Self {
        value.label().to_string()
    }
}

/// Urgency the requester claims. Unknown values read as `normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    Medium,
    High,
}

impl Urgency {
    pub const fn label(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Normal => "normal",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        }
    }

    pub const fn is_elevated(self) -> bool {
        matches!(self, Urgency::Medium | Urgency::High)
    }
}

impl From<String> for Urgency {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Urgency::Low,
            "medium" => Urgency::Medium,
            "high" => Urgency::High,
            _ => Urgency::Normal,
        }
    }
}

impl From<Urgency> for String {
    fn from(value: Urgency) -> Self {
        value.label().to_string()
    }
}

/// Caller role. Unknown values read as `student`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequesterRole {
    #[default]
    Student,
    Postgrad,
    Phd,
    Faculty,
    Admin,
}

impl RequesterRole {
    pub const fn label(self) -> &'static str {
        match self {
            RequesterRole::Student => "student",
            RequesterRole::Postgrad => "postgrad",
            RequesterRole::Phd => "phd",
            RequesterRole::Faculty => "faculty",
            RequesterRole::Admin => "admin",
        }
    }
}

impl From<String> for RequesterRole {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgrad" => RequesterRole::Postgrad,
            "phd" => RequesterRole::Phd,
            "faculty" => RequesterRole::Faculty,
            "admin" => RequesterRole::Admin,
            _ => RequesterRole::Student,
        }
    }
}

impl From<RequesterRole> for String {
    fn from(value: RequesterRole) -> Self {
        value.label().to_string()
    }
}

/// Kind of supporting evidence attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProofType {
    FacultyApproval,
    AdminApproval,
    OfficialLetter,
    DepartmentEmail,
    EventRegistration,
    CourseSyllabus,
    Other(String),
}

impl ProofType {
    pub fn label(&self) -> &str {
        match self {
            ProofType::FacultyApproval => "faculty_approval",
            ProofType::AdminApproval => "admin_approval",
            ProofType::OfficialLetter => "official_letter",
            ProofType::DepartmentEmail => "department_email",
            ProofType::EventRegistration => "event_registration",
            ProofType::CourseSyllabus => "course_syllabus",
            ProofType::Other(raw) => raw,
        }
    }
}

impl From<String> for ProofType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "faculty_approval" => ProofType::FacultyApproval,
            "admin_approval" => ProofType::AdminApproval,
            "official_letter" => ProofType::OfficialLetter,
            "department_email" => ProofType::DepartmentEmail,
            "event_registration" => ProofType::EventRegistration,
            "course_syllabus" => ProofType::CourseSyllabus,
            _ => ProofType::Other(value),
        }
    }
}

impl From<ProofType> for String {
    fn from(value: ProofType) -> Self {
        value.label().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requester {
    pub email: String,
    pub name: String,
}

/// Inbound booking request as parsed by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub lab_number: LabNumber,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    #[serde(alias = "num_participants")]
    pub participants: u32,
    pub purpose: Purpose,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub urgency: Urgency,
    pub requester: Requester,
    #[serde(default)]
    pub has_proof: bool,
    #[serde(default)]
    pub proof_type: Option<ProofType>,
    #[serde(default)]
    pub role: RequesterRole,
}

impl ReservationRequest {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start_time, self.end_time)
    }

    pub fn slot(&self) -> TimeSlot {
        TimeSlot::new(self.date, self.interval())
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub u64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a persisted reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ReservationStatus {
    /// Statuses that occupy a slot.
    pub const ACTIVE: [ReservationStatus; 2] =
        [ReservationStatus::Approved, ReservationStatus::Pending];

    pub const fn label(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Approved => "approved",
            ReservationStatus::Rejected => "rejected",
            ReservationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(ReservationStatus::Pending),
            "approved" => Some(ReservationStatus::Approved),
            "rejected" => Some(ReservationStatus::Rejected),
            "cancelled" | "canceled" => Some(ReservationStatus::Cancelled),
            _ => None,
        }
    }

    pub const fn is_active(self) -> bool {
        matches!(self, ReservationStatus::Pending | ReservationStatus::Approved)
    }

    /// `approved -> rejected` is reserved for preemption.
    pub const fn can_transition_to(self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (ReservationStatus::Pending, ReservationStatus::Approved)
                | (ReservationStatus::Pending, ReservationStatus::Rejected)
                | (ReservationStatus::Pending, ReservationStatus::Cancelled)
                | (ReservationStatus::Approved, ReservationStatus::Cancelled)
                | (ReservationStatus::Approved, ReservationStatus::Rejected)
        )
    }
}

/// Persisted reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    #[serde(flatten)]
    pub request: ReservationRequest,
    pub priority_score: f64,
    pub status: ReservationStatus,
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

impl Reservation {
    pub fn slot(&self) -> TimeSlot {
        self.request.slot()
    }

    pub fn lab_number(&self) -> &LabNumber {
        &self.request.lab_number
    }
}

/// Reservation awaiting an id from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReservation {
    pub request: ReservationRequest,
    pub priority_score: f64,
    pub status: ReservationStatus,
    pub created_at: NaiveDateTime,
}

impl NewReservation {
    pub fn into_reservation(self, id: ReservationId) -> Reservation {
        Reservation {
            id,
            request: self.request,
            priority_score: self.priority_score,
            status: self.status,
            created_at: self.created_at,
            updated_at: None,
        }
    }
}

/// One past booking as seen by the fairness factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookingSample {
    pub utilization: f64,
    pub participants: u32,
}

/// Caller-supplied view of a requester's past behavior. Samples are oldest first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserHistorySnapshot {
    pub requester: String,
    pub bookings: u32,
    pub cancellations: u32,
    #[serde(default)]
    pub samples: Vec<BookingSample>,
}

impl UserHistorySnapshot {
    pub fn cancellation_rate(&self) -> Option<f64> {
        if self.bookings == 0 {
            return None;
        }
        Some(f64::from(self.cancellations) / f64::from(self.bookings))
    }

    /// Mean utilization of the last `window` samples.
    pub fn recent_mean_utilization(&self, window: usize) -> Option<f64> {
        let skip = self.samples.len().saturating_sub(window);
        let recent = &self.samples[skip..];
        if recent.is_empty() {
            return None;
        }
        let total: f64 = recent.iter().map(|sample| sample.utilization).sum();
        Some(total / recent.len() as f64)
    }

    pub fn share_above_participants(&self, participants: u32) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let above = self
            .samples
            .iter()
            .filter(|sample| sample.participants > participants)
            .count();
        above as f64 / self.samples.len() as f64
    }
}
