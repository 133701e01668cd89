use serde::{Deserialize, Serialize};

use super::fraud::FraudFlag;
use super::ScoringResult;

/// Issue text per scoring factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorExplanations {
    pub capacity: String,
    pub authenticity: String,
    pub timing: String,
    pub fairness: String,
}

/// Human-readable rendering of a [`ScoringResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanation {
    pub status: String,
    pub total_score: String,
    pub verdict: String,
    pub factors: FactorExplanations,
    pub flags: String,
    pub recommendation: String,
}

impl Explanation {
    pub fn from_result(result: &ScoringResult) -> Self {
        let breakdown = &result.breakdown;
        Self {
            status: if result.accepted { "ACCEPTED" } else { "REJECTED" }.to_string(),
            total_score: format!("{}/100", result.score),
            verdict: verdict(result.accepted, result.score),
            factors: FactorExplanations {
                capacity: capacity_text(breakdown.capacity_score, breakdown.utilization_ratio),
                authenticity: authenticity_text(breakdown.authenticity_score).to_string(),
                timing: timing_text(breakdown.timing_score).to_string(),
                fairness: fairness_text(breakdown.fairness_score).to_string(),
            },
            flags: flags_text(&result.flags),
            recommendation: recommendation(result),
        }
    }
}

fn verdict(accepted: bool, score: f64) -> String {
    let text = if accepted {
        if score >= 80.0 {
            "Excellent match! High priority for approval."
        } else if score >= 65.0 {
            "Good reservation. Approved with standard priority."
        } else {
            "Acceptable reservation. Approved with lower priority."
        }
    } else if score < 30.0 {
        "Score too low. Improve capacity match and provide verification."
    } else if score < 50.0 {
        "Below threshold. Consider alternative dates or provide proof."
    } else {
        "Rejected due to capacity or verification issues."
    };
    text.to_string()
}

fn capacity_text(score: f64, utilization: f64) -> String {
    let percent = utilization * 100.0;
    if score >= 45.0 {
        format!("Excellent capacity match ({percent:.0}% utilization). Optimal use of resources.")
    } else if score >= 35.0 {
        format!("Good capacity match ({percent:.0}% utilization).")
    } else if score >= 25.0 {
        format!("Acceptable capacity match ({percent:.0}% utilization).")
    } else {
        format!(
            "Poor capacity match ({percent:.0}% utilization). Consider smaller lab or more participants."
        )
    }
}

fn authenticity_text(score: f64) -> &'static str {
    if score >= 20.0 {
        "Strong verification with proof provided."
    } else if score >= 15.0 {
        "Good authenticity. Details provided."
    } else if score >= 10.0 {
        "Moderate authenticity. Consider providing proof."
    } else {
        "Low authenticity. Proof required for academic purposes."
    }
}

fn timing_text(score: f64) -> &'static str {
    if score >= 12.0 {
        "Urgent timing justified."
    } else if score >= 8.0 {
        "Reasonable timing."
    } else {
        "Low urgency."
    }
}

fn fairness_text(score: f64) -> &'static str {
    if score >= 8.0 {
        "Good user history."
    } else if score >= 5.0 {
        "Acceptable user behavior."
    } else {
        "Concerns with past bookings (cancellations/misuse)."
    }
}

fn flags_text(flags: &[FraudFlag]) -> String {
    if flags.is_empty() {
        return "No suspicious patterns detected.".to_string();
    }
    let described: Vec<&str> = flags.iter().map(|flag| flag.description()).collect();
    format!("Flags: {}", described.join(", "))
}

fn recommendation(result: &ScoringResult) -> String {
    if result.accepted {
        return "Booking recommended for approval.".to_string();
    }

    let breakdown = &result.breakdown;
    let mut recommendations = Vec::new();

    if breakdown.capacity_score < 25.0 {
        if breakdown.utilization_ratio < 0.5 {
            recommendations.push("Choose a smaller lab to match your group size");
        } else {
            recommendations.push("Consider adding more participants or choose a smaller venue");
        }
    }

    if breakdown.authenticity_score < 10.0 {
        recommendations.push("Provide verification (faculty approval, official letter, etc.)");
    }

    if result.has_flag(FraudFlag::NoProofAcademic) {
        recommendations.push("Academic purposes require proof of authorization");
    }

    if result.has_flag(FraudFlag::GenericDescription) {
        recommendations.push("Add specific details: faculty names, dates, course codes, agenda");
    }

    if recommendations.is_empty() {
        recommendations.push("Improve overall score by addressing capacity match and verification");
    }

    recommendations.join(" | ")
}
