use serde::{Deserialize, Serialize};

/// Named regular expression that rewards concrete detail in a description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailPattern {
    pub name: String,
    pub pattern: String,
    pub weight: f64,
}

impl DetailPattern {
    pub fn new(name: &str, pattern: &str, weight: f64) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            weight,
        }
    }
}

/// Scoring dials and heuristic tables.
///
/// Tables are data so the heuristics can be tuned without touching the rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Utilization above this ratio is rejected outright.
    pub hard_capacity_ratio: f64,
    /// Highest ratio that may still be accepted.
    pub acceptable_capacity_ratio: f64,
    pub minimum_accept_score: f64,
    pub fraud_flag_penalty: f64,
    /// Descriptions shorter than this (trimmed) earn no detail points.
    pub minimum_detail_length: usize,
    pub detail_patterns: Vec<DetailPattern>,
    pub generic_phrases: Vec<String>,
    pub generic_phrase_allowance: usize,
    pub generic_phrase_penalty: f64,
    /// Words that justify a `high`/`medium` urgency claim.
    pub urgency_context_keywords: Vec<String>,
    pub unjustified_urgency_factor: f64,
    /// Words counted by the keyword stuffing check.
    pub stuffing_keywords: Vec<String>,
    pub stuffing_keyword_threshold: usize,
    pub stuffing_length_limit: usize,
    pub repetition_tokens: Vec<String>,
    pub repetition_limit: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            hard_capacity_ratio: 1.20,
            acceptable_capacity_ratio: 1.05,
            minimum_accept_score: 50.0,
            fraud_flag_penalty: 5.0,
            minimum_detail_length: 20,
            detail_patterns: default_detail_patterns(),
            generic_phrases: strings(&[
                "very important",
                "urgent meeting",
                "important event",
                "necessary",
                "required",
                "must have",
                "need urgently",
            ]),
            generic_phrase_allowance: 2,
            generic_phrase_penalty: 2.0,
            urgency_context_keywords: strings(&[
                "deadline",
                "urgent",
                "critical",
                "emergency",
                "tomorrow",
                "today",
            ]),
            unjustified_urgency_factor: 0.3,
            stuffing_keywords: strings(&[
                "urgent",
                "emergency",
                "critical",
                "immediately",
                "asap",
                "important",
            ]),
            stuffing_keyword_threshold: 3,
            stuffing_length_limit: 50,
            repetition_tokens: strings(&["important", "urgent"]),
            repetition_limit: 2,
        }
    }
}

pub fn default_detail_patterns() -> Vec<DetailPattern> {
    vec![
        DetailPattern::new(
            "date_mention",
            r"\b(january|february|march|april|may|june|july|august|september|october|november|december|\d{1,2}[/-]\d{1,2}[/-]\d{2,4})\b",
            1.5,
        ),
        DetailPattern::new(
            "time_mention",
            r"\b(\d{1,2}:\d{2}|am|pm|morning|afternoon|evening)\b",
            1.5,
        ),
        DetailPattern::new(
            "faculty_name",
            r"\b(dr\.|prof\.|professor|dr |faculty)\s+[a-z]+\b",
            1.5,
        ),
        DetailPattern::new(
            "course_code",
            r"\b([a-z]{2,4}\s*\d{3,4}|course\s+\d+)\b",
            1.5,
        ),
        DetailPattern::new(
            "venue_mention",
            r"\b(room|hall|auditorium|lab|building|block|floor)\s+[a-z0-9]+\b",
            1.5,
        ),
        DetailPattern::new(
            "participant_group",
            r"\b(students?|participants?|attendees?|members?)\s+(from|of|in)\b",
            1.5,
        ),
    ]
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
