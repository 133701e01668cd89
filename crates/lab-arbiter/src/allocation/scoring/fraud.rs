use serde::{Deserialize, Serialize};

use super::super::domain::ReservationRequest;
use super::config::ScoringConfig;
use super::patterns::count_phrases;

const GENERIC_DESCRIPTION_LENGTH: usize = 30;
const WASTEFUL_RATIO: f64 = 0.25;

/// Named signal that a request is trying to game the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FraudFlag {
    CapacityExceeded,
    GenericDescription,
    NoProofAcademic,
    WastefulUtilization,
    KeywordStuffing,
    RepetitiveClaims,
}

impl FraudFlag {
    pub const fn code(self) -> &'static str {
        match self {
            FraudFlag::CapacityExceeded => "CAPACITY_EXCEEDED",
            FraudFlag::GenericDescription => "GENERIC_DESCRIPTION",
            FraudFlag::NoProofAcademic => "NO_PROOF_ACADEMIC",
            FraudFlag::WastefulUtilization => "WASTEFUL_UTILIZATION",
            FraudFlag::KeywordStuffing => "KEYWORD_STUFFING",
            FraudFlag::RepetitiveClaims => "REPETITIVE_CLAIMS",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            FraudFlag::CapacityExceeded => "Exceeds maximum capacity",
            FraudFlag::GenericDescription => "Description lacks specific details",
            FraudFlag::NoProofAcademic => "Academic purpose claimed without verification",
            FraudFlag::WastefulUtilization => "Very low capacity utilization (wasteful)",
            FraudFlag::KeywordStuffing => "Too many urgency keywords without substance",
            FraudFlag::RepetitiveClaims => "Repetitive urgency claims",
        }
    }
}

/// Inspects free text and structured fields for gaming patterns.
pub struct FraudDetector {
    stuffing_keywords: Vec<String>,
    stuffing_keyword_threshold: usize,
    stuffing_length_limit: usize,
    repetition_tokens: Vec<String>,
    repetition_limit: usize,
}

impl FraudDetector {
    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            stuffing_keywords: config.stuffing_keywords.clone(),
            stuffing_keyword_threshold: config.stuffing_keyword_threshold,
            stuffing_length_limit: config.stuffing_length_limit,
            repetition_tokens: config.repetition_tokens.clone(),
            repetition_limit: config.repetition_limit,
        }
    }

    /// Flags in a stable order. `ratio` is participants over capacity.
    pub fn detect(&self, request: &ReservationRequest, ratio: f64) -> Vec<FraudFlag> {
        let mut flags = Vec::new();
        let description = request.description.as_str();
        let trimmed_length = description.trim().chars().count();

        if request.purpose.is_high_stakes() && trimmed_length < GENERIC_DESCRIPTION_LENGTH {
            flags.push(FraudFlag::GenericDescription);
        }

        if request.purpose.is_academic() && !request.has_proof {
            flags.push(FraudFlag::NoProofAcademic);
        }

        if ratio < WASTEFUL_RATIO {
            flags.push(FraudFlag::WastefulUtilization);
        }

        let keyword_hits = count_phrases(&description.to_lowercase(), &self.stuffing_keywords);
        if keyword_hits >= self.stuffing_keyword_threshold
            && trimmed_length < self.stuffing_length_limit
        {
            flags.push(FraudFlag::KeywordStuffing);
        }

        // Case-sensitive: only the literal lowercase token counts.
        let repetitive = self
            .repetition_tokens
            .iter()
            .any(|token| description.matches(token.as_str()).count() > self.repetition_limit);
        if repetitive {
            flags.push(FraudFlag::RepetitiveClaims);
        }

        flags
    }
}
