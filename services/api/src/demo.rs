use crate::infra::{parse_clock_time, parse_date, InMemoryLabStore, LoggingNotifier};
use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Weekday};
use clap::Args;
use lab_arbiter::allocation::{
    format_time, AllocationPolicy, Alternatives, Decision, Explanation, Interval, LabNumber,
    ProofType, Purpose, Requester, RequesterRole, ReservationChanges, ReservationFilter,
    ReservationRequest, ReservationService, ScoringConfig, ScoringEngine, ScoringResult,
    SubmissionOutcome, TimeSlot, Urgency,
};
use lab_arbiter::error::AppError;
use std::sync::Arc;

type CampusService = ReservationService<InMemoryLabStore, LoggingNotifier>;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Lab to score against
    #[arg(long, default_value = "E401")]
    pub(crate) lab: String,
    /// Booking date (YYYY-MM-DD). Defaults to the next weekday at least three days out.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Start time (HH:MM)
    #[arg(long, value_parser = parse_clock_time, default_value = "16:00")]
    pub(crate) start: NaiveTime,
    /// End time (HH:MM)
    #[arg(long, value_parser = parse_clock_time, default_value = "18:00")]
    pub(crate) end: NaiveTime,
    #[arg(long, default_value_t = 30)]
    pub(crate) participants: u32,
    #[arg(long, default_value = "workshop")]
    pub(crate) purpose: String,
    #[arg(long, default_value = "")]
    pub(crate) description: String,
    #[arg(long, default_value = "student")]
    pub(crate) role: String,
    #[arg(long, default_value = "normal")]
    pub(crate) urgency: String,
    /// Attach supporting evidence of the given kind (e.g. faculty_approval)
    #[arg(long)]
    pub(crate) proof_type: Option<String>,
    #[arg(long, default_value = "requester@campus.edu")]
    pub(crate) email: String,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Booking date for the demo requests (YYYY-MM-DD). Defaults to the next weekday at least three days out.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// Lab the demo requests compete for
    #[arg(long, default_value = "E202")]
    pub(crate) lab: String,
    /// Skip the modification and cancellation portion of the demo.
    #[arg(long)]
    pub(crate) skip_lifecycle: bool,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let service = campus_service()?;
    let date = args.date.unwrap_or_else(default_booking_date);
    let request = ReservationRequest {
        lab_number: LabNumber::new(args.lab),
        date,
        start_time: args.start,
        end_time: args.end,
        participants: args.participants,
        purpose: Purpose::from(args.purpose),
        description: args.description,
        urgency: Urgency::from(args.urgency),
        requester: Requester {
            name: args.email.clone(),
            email: args.email,
        },
        has_proof: args.proof_type.is_some(),
        proof_type: args.proof_type.map(ProofType::from),
        role: RequesterRole::from(args.role),
    };

    let preview = service.score(&request)?;
    println!(
        "Scoring {} on {} {}-{} for {} participants",
        preview.lab,
        date,
        format_time(request.start_time),
        format_time(request.end_time),
        request.participants
    );
    render_scoring(&preview.scoring);
    render_explanation(&preview.explanation);
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        date,
        lab,
        skip_lifecycle,
    } = args;
    let date = date.unwrap_or_else(default_booking_date);
    let lab = LabNumber::new(lab);
    let service = campus_service()?;

    println!("Lab reservation arbitration demo");
    println!(
        "- {} on {} | auto-approve at {} | preemption margin {}",
        lab,
        date,
        service.policy().auto_approve_threshold(),
        service.policy().preemption_margin()
    );

    let contenders = [
        (
            "Coding club practice",
            demo_request(
                &lab,
                date,
                "coding.club@campus.edu",
                22,
                Purpose::Practice,
                RequesterRole::Student,
                None,
                "Coding competition practice session for second year students",
            ),
        ),
        (
            "Faculty workshop",
            demo_request(
                &lab,
                date,
                "hod.cse@campus.edu",
                28,
                Purpose::Workshop,
                RequesterRole::Faculty,
                Some(ProofType::FacultyApproval),
                "Hands-on Python workshop for 28 students of CSE section B led by Dr. Ramesh with department approval",
            ),
        ),
        (
            "Placeholder exam hold",
            demo_request(
                &lab,
                date,
                "walk.in@campus.edu",
                4,
                Purpose::Exam,
                RequesterRole::Student,
                None,
                "exam",
            ),
        ),
    ];

    let mut last_committed = None;
    for (label, request) in contenders {
        println!("\n{label}: {} participants", request.participants);
        let outcome = service.submit(request)?;
        render_outcome(&outcome);
        if let Some(reservation) = outcome.reservation() {
            last_committed = Some(reservation.id);
        }
    }

    let slot = TimeSlot::new(date, Interval::new(demo_time(16), demo_time(18)));
    let availability = service.check_availability(&lab, &slot)?;
    println!(
        "\nAvailability for {} 16:00-18:00: {}",
        lab,
        availability
            .reason
            .map(|reason| format!("unavailable ({reason})"))
            .unwrap_or_else(|| "available".to_string())
    );

    println!("\nReservations on record");
    for reservation in service.list(&ReservationFilter::default())? {
        println!(
            "  - #{} {} {} {}-{} | {} | score {}",
            reservation.id,
            reservation.lab_number(),
            reservation.request.date,
            format_time(reservation.request.start_time),
            format_time(reservation.request.end_time),
            reservation.status.label(),
            reservation.priority_score
        );
    }

    if skip_lifecycle {
        return Ok(());
    }

    let Some(id) = last_committed else {
        return Ok(());
    };
    println!("\nLifecycle for reservation #{id}");
    let changes = ReservationChanges {
        participants: Some(30),
        ..ReservationChanges::default()
    };
    match service.modify(id, changes) {
        Ok(modified) => println!(
            "- modified {} -> status {}",
            modified.changed_fields.join(", "),
            modified.reservation.status.label()
        ),
        Err(err) => println!("- modification refused: {err}"),
    }
    match service.cancel(id) {
        Ok(cancelled) => println!("- cancelled -> status {}", cancelled.status.label()),
        Err(err) => println!("- cancellation refused: {err}"),
    }
    Ok(())
}

fn campus_service() -> Result<CampusService, AppError> {
    let engine = ScoringEngine::new(ScoringConfig::default())?;
    Ok(ReservationService::new(
        Arc::new(InMemoryLabStore::campus()),
        Arc::new(LoggingNotifier),
        Arc::new(engine),
        AllocationPolicy::default(),
    ))
}

#[allow(clippy::too_many_arguments)]
fn demo_request(
    lab: &LabNumber,
    date: NaiveDate,
    email: &str,
    participants: u32,
    purpose: Purpose,
    role: RequesterRole,
    proof_type: Option<ProofType>,
    description: &str,
) -> ReservationRequest {
    ReservationRequest {
        lab_number: lab.clone(),
        date,
        start_time: demo_time(16),
        end_time: demo_time(18),
        participants,
        purpose,
        description: description.to_string(),
        urgency: Urgency::Normal,
        requester: Requester {
            email: email.to_string(),
            name: email.split('@').next().unwrap_or(email).to_string(),
        },
        has_proof: proof_type.is_some(),
        proof_type,
        role,
    }
}

fn demo_time(hour: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// First weekday at least three days from today.
fn default_booking_date() -> NaiveDate {
    let mut date = Local::now().date_naive() + Duration::days(3);
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date += Duration::days(1);
    }
    date
}

fn render_outcome(outcome: &SubmissionOutcome) {
    render_scoring(outcome.scoring());
    match outcome {
        SubmissionOutcome::Rejected {
            explanation,
            alternatives,
            ..
        } => {
            println!("  Rejected: {}", explanation.verdict);
            println!("  Recommendation: {}", explanation.recommendation);
            render_alternatives(alternatives);
        }
        SubmissionOutcome::Committed {
            reservation,
            decision,
            conflict,
            alternatives,
            ..
        } => {
            let detail = match decision {
                Decision::Approved {
                    preempted: Some(loser),
                } => format!("approved, preempting #{loser}"),
                Decision::Approved { preempted: None } => "approved".to_string(),
                Decision::Pending { reason } => format!("pending ({reason:?})"),
                Decision::RejectedByScore => "rejected".to_string(),
            };
            println!("  Reservation #{} {}", reservation.id, detail);
            if let Some(conflict) = conflict {
                println!("  Conflict: {}", conflict.reason_code());
            }
            if let Some(alternatives) = alternatives {
                render_alternatives(alternatives);
            }
        }
    }
}

fn render_scoring(scoring: &ScoringResult) {
    let breakdown = &scoring.breakdown;
    println!(
        "  Score {}/100 | capacity {} | authenticity {} | timing {} | fairness {} | penalty -{}",
        scoring.score,
        breakdown.capacity_score,
        breakdown.authenticity_score,
        breakdown.timing_score,
        breakdown.fairness_score,
        breakdown.fraud_penalty
    );
    if !scoring.flags.is_empty() {
        let flags: Vec<&str> = scoring.flags.iter().map(|flag| flag.code()).collect();
        println!("  Flags: {}", flags.join(", "));
    }
    if let Some(message) = &scoring.message {
        println!("  {message}");
    }
}

fn render_explanation(explanation: &Explanation) {
    println!("{} ({})", explanation.status, explanation.total_score);
    println!("  {}", explanation.verdict);
    println!("  Capacity: {}", explanation.factors.capacity);
    println!("  Authenticity: {}", explanation.factors.authenticity);
    println!("  Timing: {}", explanation.factors.timing);
    println!("  Fairness: {}", explanation.factors.fairness);
    println!("  {}", explanation.flags);
    println!("  Recommendation: {}", explanation.recommendation);
}

fn render_alternatives(alternatives: &Alternatives) {
    if alternatives.is_empty() {
        println!("  No alternatives available");
        return;
    }
    for lab in &alternatives.labs {
        println!(
            "  Alternative lab: {} ({}, floor {}, capacity {})",
            lab.lab_number, lab.building, lab.floor, lab.capacity
        );
    }
    for time in &alternatives.times {
        println!(
            "  Alternative time: {}-{}",
            format_time(time.start_time),
            format_time(time.end_time)
        );
    }
}
