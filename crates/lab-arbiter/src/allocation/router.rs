use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::json;

use super::alternatives::AlternativeQuery;
use super::domain::{LabNumber, ReservationId, ReservationRequest, ReservationStatus};
use super::interval::{hhmm, Interval, TimeSlot};
use super::repository::{LabStore, Notifier, RepositoryError, ReservationFilter};
use super::service::{
    ReservationChanges, ReservationService, ReservationServiceError, SubmissionOutcome,
};
use super::validation::ValidationError;

/// Router builder exposing booking, lookup and admin endpoints.
pub fn reservation_router<S, N>(service: Arc<ReservationService<S, N>>) -> Router
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/labs", get(labs_handler::<S, N>))
        .route("/api/v1/availability", post(availability_handler::<S, N>))
        .route("/api/v1/alternatives", post(alternatives_handler::<S, N>))
        .route("/api/v1/score", post(score_handler::<S, N>))
        .route("/api/v1/reservations", post(submit_handler::<S, N>))
        .route(
            "/api/v1/reservations/:reservation_id",
            get(reservation_handler::<S, N>)
                .put(modify_handler::<S, N>)
                .delete(cancel_handler::<S, N>),
        )
        .route(
            "/api/v1/requesters/:email/reservations",
            get(requester_handler::<S, N>),
        )
        .route("/api/v1/admin/reservations", get(admin_list_handler::<S, N>))
        .route(
            "/api/v1/admin/reservations/:reservation_id/approve",
            post(approve_handler::<S, N>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct AvailabilityRequest {
    pub lab_number: LabNumber,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatusQuery {
    pub status: Option<String>,
}

pub(crate) async fn labs_handler<S, N>(
    State(service): State<Arc<ReservationService<S, N>>>,
) -> Response
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    match service.labs() {
        Ok(labs) => (StatusCode::OK, axum::Json(labs)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn availability_handler<S, N>(
    State(service): State<Arc<ReservationService<S, N>>>,
    axum::Json(request): axum::Json<AvailabilityRequest>,
) -> Response
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    let slot = TimeSlot::new(
        request.date,
        Interval::new(request.start_time, request.end_time),
    );
    match service.check_availability(&request.lab_number, &slot) {
        Ok(availability) => (StatusCode::OK, axum::Json(availability)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn alternatives_handler<S, N>(
    State(service): State<Arc<ReservationService<S, N>>>,
    axum::Json(query): axum::Json<AlternativeQuery>,
) -> Response
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    match service.suggest(&query) {
        Ok(alternatives) => (StatusCode::OK, axum::Json(alternatives)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn score_handler<S, N>(
    State(service): State<Arc<ReservationService<S, N>>>,
    axum::Json(request): axum::Json<ReservationRequest>,
) -> Response
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    match service.score(&request) {
        Ok(preview) => (StatusCode::OK, axum::Json(preview)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<S, N>(
    State(service): State<Arc<ReservationService<S, N>>>,
    axum::Json(request): axum::Json<ReservationRequest>,
) -> Response
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    match service.submit(request) {
        Ok(SubmissionOutcome::Committed {
            reservation,
            scoring,
            decision,
            conflict,
            alternatives,
        }) => {
            let payload = json!({
                "success": true,
                "reservation_id": reservation.id,
                "status": reservation.status.label(),
                "priority_score": scoring.score,
                "breakdown": scoring.breakdown,
                "flags": scoring.flags,
                "decision": decision,
                "conflict": conflict,
                "alternatives": alternatives,
                "message": format!(
                    "Reservation {}. Score: {}/100",
                    reservation.status.label(),
                    scoring.score
                ),
            });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Ok(SubmissionOutcome::Rejected {
            scoring,
            explanation,
            alternatives,
        }) => {
            let payload = json!({
                "success": false,
                "rejected": true,
                "score": scoring.score,
                "breakdown": scoring.breakdown,
                "flags": scoring.flags,
                "reason": scoring.message.clone().unwrap_or_else(|| explanation.verdict.clone()),
                "recommendations": explanation.recommendation,
                "detailed_explanation": explanation.factors,
                "flags_detail": explanation.flags,
                "alternatives": alternatives,
                "message": format!("Unable to approve: {}. See recommendations.", explanation.verdict),
            });
            (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn reservation_handler<S, N>(
    State(service): State<Arc<ReservationService<S, N>>>,
    Path(reservation_id): Path<u64>,
) -> Response
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    match service.get(ReservationId(reservation_id)) {
        Ok(reservation) => (StatusCode::OK, axum::Json(reservation)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn modify_handler<S, N>(
    State(service): State<Arc<ReservationService<S, N>>>,
    Path(reservation_id): Path<u64>,
    axum::Json(changes): axum::Json<ReservationChanges>,
) -> Response
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    match service.modify(ReservationId(reservation_id), changes) {
        Ok(outcome) => {
            let message = if outcome.changed_fields.is_empty() {
                "No changes applied"
            } else {
                "Reservation updated"
            };
            let payload = json!({
                "success": true,
                "message": message,
                "changed_fields": outcome.changed_fields,
                "reservation": outcome.reservation,
                "scoring": outcome.scoring,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn cancel_handler<S, N>(
    State(service): State<Arc<ReservationService<S, N>>>,
    Path(reservation_id): Path<u64>,
) -> Response
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    match service.cancel(ReservationId(reservation_id)) {
        Ok(reservation) => {
            let payload = json!({
                "success": true,
                "message": "Reservation cancelled",
                "reservation": reservation,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn requester_handler<S, N>(
    State(service): State<Arc<ReservationService<S, N>>>,
    Path(email): Path<String>,
) -> Response
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    match service.requester_reservations(&email) {
        Ok(reservations) => (StatusCode::OK, axum::Json(reservations)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn admin_list_handler<S, N>(
    State(service): State<Arc<ReservationService<S, N>>>,
    Query(query): Query<StatusQuery>,
) -> Response
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    let status = match query.status.as_deref().filter(|raw| !raw.trim().is_empty()) {
        None => None,
        Some(raw) => match ReservationStatus::parse(raw) {
            Some(status) => Some(status),
            None => {
                let payload = json!({
                    "error": format!("unknown reservation status `{raw}`"),
                });
                return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
            }
        },
    };

    let filter = ReservationFilter {
        status,
        requester: None,
    };
    match service.list(&filter) {
        Ok(reservations) => (StatusCode::OK, axum::Json(reservations)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn approve_handler<S, N>(
    State(service): State<Arc<ReservationService<S, N>>>,
    Path(reservation_id): Path<u64>,
) -> Response
where
    S: LabStore + 'static,
    N: Notifier + 'static,
{
    match service.approve(ReservationId(reservation_id)) {
        Ok(reservation) => {
            let payload = json!({
                "success": true,
                "message": "Reservation approved",
                "reservation": reservation,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) fn error_status(error: &ReservationServiceError) -> StatusCode {
    match error {
        ReservationServiceError::Validation(
            ValidationError::UnknownLab(_) | ValidationError::UnknownReservation(_),
        ) => StatusCode::NOT_FOUND,
        ReservationServiceError::Validation(ValidationError::Repository(inner))
        | ReservationServiceError::Repository(inner) => match inner {
            RepositoryError::NotFound => StatusCode::NOT_FOUND,
            RepositoryError::Conflict => StatusCode::CONFLICT,
            RepositoryError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        },
        ReservationServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ReservationServiceError::InvalidTransition { .. }
        | ReservationServiceError::SlotOccupied { .. } => StatusCode::CONFLICT,
        ReservationServiceError::ModificationWindowClosed { .. }
        | ReservationServiceError::ModificationRejected { .. } => StatusCode::BAD_REQUEST,
    }
}

fn error_response(error: ReservationServiceError) -> Response {
    let status = error_status(&error);
    let payload = match &error {
        ReservationServiceError::ModificationRejected { scoring, .. } => json!({
            "error": error.to_string(),
            "score": scoring.score,
            "flags": scoring.flags,
            "explanation": scoring.explain(),
        }),
        ReservationServiceError::SlotOccupied { conflict, .. } => json!({
            "error": error.to_string(),
            "conflict": conflict,
        }),
        _ => json!({
            "error": error.to_string(),
        }),
    };
    (status, axum::Json(payload)).into_response()
}
