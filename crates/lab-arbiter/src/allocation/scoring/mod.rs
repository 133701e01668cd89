mod config;
mod explain;
mod fraud;
mod patterns;
mod rules;

pub use config::{default_detail_patterns, DetailPattern, ScoringConfig};
pub use explain::{Explanation, FactorExplanations};
pub use fraud::{FraudDetector, FraudFlag};
pub use patterns::{DetailMatcher, ScoringConfigError};

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{ReservationRequest, UserHistorySnapshot};
use rules::round_to;

/// Per-factor contribution to a score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub capacity_score: f64,
    pub authenticity_score: f64,
    pub timing_score: f64,
    pub fairness_score: f64,
    pub fraud_penalty: f64,
    pub utilization_ratio: f64,
}

/// Output of the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub flags: Vec<FraudFlag>,
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ScoringResult {
    pub fn has_flag(&self, flag: FraudFlag) -> bool {
        self.flags.contains(&flag)
    }

    pub fn explain(&self) -> Explanation {
        Explanation::from_result(self)
    }
}

/// Pluggable authenticity factor. Implementations return points in `[0, 25]`.
pub trait AuthenticityStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, request: &ReservationRequest) -> f64;
}

/// Baseline authenticity scoring from role, proof and the detail pattern table.
pub struct RuleBasedAuthenticity {
    matcher: DetailMatcher,
    config: ScoringConfig,
}

impl RuleBasedAuthenticity {
    pub fn new(config: &ScoringConfig) -> Result<Self, ScoringConfigError> {
        Ok(Self {
            matcher: DetailMatcher::compile(&config.detail_patterns)?,
            config: config.clone(),
        })
    }

    pub fn detail_score(&self, description: &str) -> f64 {
        rules::detail_score(description, &self.matcher, &self.config)
    }
}

impl AuthenticityStrategy for RuleBasedAuthenticity {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    fn score(&self, request: &ReservationRequest) -> f64 {
        rules::authenticity_score(request, &self.matcher, &self.config)
    }
}

/// Stateless multi-factor scorer.
pub struct ScoringEngine {
    config: ScoringConfig,
    authenticity: Arc<dyn AuthenticityStrategy>,
    fraud: FraudDetector,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Result<Self, ScoringConfigError> {
        let authenticity = Arc::new(RuleBasedAuthenticity::new(&config)?);
        let fraud = FraudDetector::from_config(&config);
        Ok(Self {
            config,
            authenticity,
            fraud,
        })
    }

    /// Swap the authenticity factor, e.g. for a model-backed implementation.
    pub fn with_authenticity(mut self, strategy: Arc<dyn AuthenticityStrategy>) -> Self {
        self.authenticity = strategy;
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn authenticity_strategy(&self) -> &str {
        self.authenticity.name()
    }

    /// Score `request` against a lab of `lab_capacity` seats as of `today`.
    pub fn score(
        &self,
        request: &ReservationRequest,
        lab_capacity: u32,
        history: Option<&UserHistorySnapshot>,
        today: NaiveDate,
    ) -> ScoringResult {
        let ratio = if lab_capacity == 0 {
            f64::INFINITY
        } else {
            f64::from(request.participants) / f64::from(lab_capacity)
        };

        if ratio > self.config.hard_capacity_ratio {
            let allowed = (f64::from(lab_capacity) * self.config.hard_capacity_ratio).floor();
            debug!(
                lab = %request.lab_number,
                participants = request.participants,
                lab_capacity,
                "request exceeds hard capacity cap"
            );
            return ScoringResult {
                score: 0.0,
                breakdown: ScoreBreakdown {
                    utilization_ratio: if ratio.is_finite() { round_to(ratio, 3) } else { 0.0 },
                    ..ScoreBreakdown::default()
                },
                flags: vec![FraudFlag::CapacityExceeded],
                accepted: false,
                message: Some(format!(
                    "Participants ({}) exceed maximum allowed ({})",
                    request.participants, allowed as u64
                )),
            };
        }

        let capacity = rules::capacity_score(ratio);
        let authenticity = self
            .authenticity
            .score(request)
            .clamp(0.0, rules::AUTHENTICITY_MAX);
        let timing = rules::timing_score(request, today, &self.config);
        let fairness = rules::fairness_score(history);

        let flags = self.fraud.detect(request, ratio);
        let penalty = flags.len() as f64 * self.config.fraud_flag_penalty;

        let total = (capacity + authenticity + timing + fairness - penalty).clamp(0.0, 100.0);
        let accepted =
            total >= self.config.minimum_accept_score && ratio <= self.config.acceptable_capacity_ratio;

        let breakdown = ScoreBreakdown {
            capacity_score: round_to(capacity, 2),
            authenticity_score: round_to(authenticity, 2),
            timing_score: round_to(timing, 2),
            fairness_score: round_to(fairness, 2),
            fraud_penalty: penalty,
            utilization_ratio: round_to(ratio, 3),
        };

        debug!(
            lab = %request.lab_number,
            requester = %request.requester.email,
            total,
            ?breakdown,
            ?flags,
            "scored reservation request"
        );

        ScoringResult {
            score: round_to(total, 2),
            breakdown,
            flags,
            accepted,
            message: None,
        }
    }
}
