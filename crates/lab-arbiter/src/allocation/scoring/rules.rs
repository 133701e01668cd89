use chrono::NaiveDate;

use super::super::domain::{
    ProofType, RequesterRole, ReservationRequest, Urgency, UserHistorySnapshot,
};
use super::config::ScoringConfig;
use super::patterns::{count_phrases, DetailMatcher};

pub(crate) const CAPACITY_MAX: f64 = 50.0;
pub(crate) const AUTHENTICITY_MAX: f64 = 25.0;
pub(crate) const TIMING_MAX: f64 = 15.0;
pub(crate) const FAIRNESS_MAX: f64 = 10.0;
pub(crate) const DETAIL_MAX: f64 = 8.0;

const OPTIMAL_MIN: f64 = 0.85;
const OPTIMAL_MAX: f64 = 1.00;
const OPTIMAL_CENTER: f64 = (OPTIMAL_MIN + OPTIMAL_MAX) / 2.0;
const CAPACITY_SIGMA: f64 = 0.3;

const UNPROVEN_ACADEMIC_PENALTY: f64 = 5.0;

/// Capacity match (0-50). Full marks inside the optimal band, Gaussian falloff elsewhere.
pub(crate) fn capacity_score(ratio: f64) -> f64 {
    if (OPTIMAL_MIN..=OPTIMAL_MAX).contains(&ratio) {
        return CAPACITY_MAX;
    }

    let distance = ratio - OPTIMAL_CENTER;
    let mut score =
        CAPACITY_MAX * (-(distance * distance) / (2.0 * CAPACITY_SIGMA * CAPACITY_SIGMA)).exp();

    if ratio < 0.30 {
        score *= 0.5;
    }
    if ratio > 1.00 && ratio <= 1.05 {
        score *= 0.85;
    }
    if ratio > 1.05 && ratio <= 1.20 {
        score *= 0.4;
    }

    score.clamp(0.0, CAPACITY_MAX)
}

pub(crate) const fn role_points(role: RequesterRole) -> f64 {
    match role {
        RequesterRole::Faculty | RequesterRole::Admin => 5.0,
        RequesterRole::Phd => 4.0,
        RequesterRole::Postgrad => 3.0,
        RequesterRole::Student => 2.0,
    }
}

pub(crate) fn proof_points(proof: Option<&ProofType>) -> f64 {
    match proof {
        Some(ProofType::FacultyApproval) | Some(ProofType::AdminApproval) => 12.0,
        Some(ProofType::OfficialLetter) => 10.0,
        Some(ProofType::DepartmentEmail) => 9.0,
        Some(ProofType::EventRegistration) => 8.0,
        Some(ProofType::CourseSyllabus) => 7.0,
        Some(ProofType::Other(_)) | None => 5.0,
    }
}

/// Detail quality (0-8): concrete facts earn points, piles of filler lose them.
pub(crate) fn detail_score(description: &str, matcher: &DetailMatcher, config: &ScoringConfig) -> f64 {
    if description.trim().chars().count() < config.minimum_detail_length {
        return 0.0;
    }

    let mut score = matcher.score(description);
    let generic = count_phrases(&description.to_lowercase(), &config.generic_phrases);
    if generic > config.generic_phrase_allowance {
        score -= config.generic_phrase_penalty;
    }

    score.clamp(0.0, DETAIL_MAX)
}

/// Authenticity (0-25) from role, evidence and description quality.
pub(crate) fn authenticity_score(
    request: &ReservationRequest,
    matcher: &DetailMatcher,
    config: &ScoringConfig,
) -> f64 {
    let mut score = role_points(request.role);

    if request.has_proof {
        score += proof_points(request.proof_type.as_ref());
    } else if request.purpose.is_academic() {
        score -= UNPROVEN_ACADEMIC_PENALTY;
    }

    score += detail_score(&request.description, matcher, config);

    score.clamp(0.0, AUTHENTICITY_MAX)
}

pub(crate) const fn proximity_points(days_until: i64) -> f64 {
    if days_until <= 2 {
        8.0
    } else if days_until <= 7 {
        6.0
    } else if days_until <= 14 {
        4.0
    } else {
        2.0
    }
}

pub(crate) const fn urgency_points(urgency: Urgency) -> f64 {
    match urgency {
        Urgency::High => 7.0,
        Urgency::Medium => 4.0,
        Urgency::Normal => 2.0,
        Urgency::Low => 0.0,
    }
}

/// Urgency component after checking the description backs the claim up.
pub(crate) fn justified_urgency(request: &ReservationRequest, config: &ScoringConfig) -> f64 {
    let base = urgency_points(request.urgency);
    if !request.urgency.is_elevated() {
        return base;
    }

    let lowered = request.description.to_lowercase();
    if count_phrases(&lowered, &config.urgency_context_keywords) == 0 {
        base * config.unjustified_urgency_factor
    } else {
        base
    }
}

/// Timing (0-15): event proximity plus justified urgency.
pub(crate) fn timing_score(request: &ReservationRequest, today: NaiveDate, config: &ScoringConfig) -> f64 {
    let days_until = request.date.signed_duration_since(today).num_days();
    let score = proximity_points(days_until) + justified_urgency(request, config);
    score.clamp(0.0, TIMING_MAX)
}

/// Fairness (0-10). Unknown requesters get the benefit of the doubt.
pub(crate) fn fairness_score(history: Option<&UserHistorySnapshot>) -> f64 {
    let Some(history) = history else {
        return FAIRNESS_MAX;
    };

    let mut score = FAIRNESS_MAX;

    if let Some(rate) = history.cancellation_rate() {
        if rate > 0.30 {
            score -= 3.0;
        } else if rate > 0.15 {
            score -= 1.5;
        }
    }

    if history.samples.len() >= 3 {
        if let Some(mean) = history.recent_mean_utilization(5) {
            if mean < 0.50 {
                score -= 2.0;
            }
        }
    }

    if history.share_above_participants(50) > 0.70 {
        score -= 2.0;
    }

    score.max(0.0)
}

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
