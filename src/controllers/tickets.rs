use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::booking::{BookingError, BookingRequest};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets", get(get_tickets_by_event))
        .route("/tickets/book", post(book_ticket))
        .route("/tickets/my-tickets", get(get_my_tickets))
        .route("/tickets/reset", post(reset))
}

/* ---------- SEATS ---------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventSeatsQuery {
    event_id: i64,
}

// GET /api/tickets?eventId=1
async fn get_tickets_by_event(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventSeatsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if params.event_id <= 0 {
        return Err((StatusCode::BAD_REQUEST, "eventId must be > 0".to_string()));
    }

    let seats = state.seats.list_by_event(params.event_id).await.map_err(|e| {
        tracing::error!("get_tickets_by_event store error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load seats".to_string())
    })?;

    Ok((StatusCode::OK, Json(seats)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyTicketsQuery {
    user_id: String,
}

// GET /api/tickets/my-tickets?userId=42
async fn get_my_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MyTicketsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if params.user_id.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "userId must not be empty".to_string()));
    }

    let seats = state.seats.list_by_owner(&params.user_id).await.map_err(|e| {
        tracing::error!("get_my_tickets store error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load tickets".to_string())
    })?;

    Ok((StatusCode::OK, Json(seats)))
}

/* ---------- BOOKING ---------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookQuery {
    seat_number: String,
    event_id: i64,
    user: String,
    user_id: String,
}

impl From<BookQuery> for BookingRequest {
    fn from(q: BookQuery) -> Self {
        BookingRequest::new(q.event_id, q.seat_number, q.user, q.user_id)
    }
}

// POST /api/tickets/book?seatNumber=A1&eventId=1&user=Alice&userId=42
//
// Every protocol outcome, including "not found", is a 200 with the outcome
// line as body; only defects map to error statuses.
async fn book_ticket(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BookQuery>,
) -> Result<String, (StatusCode, String)> {
    let request = BookingRequest::from(params);

    match state.coordinator.book(&request).await {
        Ok(outcome) => Ok(outcome.to_string()),
        Err(BookingError::InvalidRequest(e)) => {
            Err((StatusCode::BAD_REQUEST, format!("Error: {}", e)))
        }
        Err(e) => {
            tracing::error!(
                event_id = request.event_id,
                seat = %request.seat_number,
                "book_ticket failed: {:?}",
                e
            );
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Error: booking failed".to_string()))
        }
    }
}

/* ---------- RESET ---------- */

// POST /api/tickets/reset - wipes every seat, test/demo only
async fn reset(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !state.config.features.enable_reset {
        return Err((StatusCode::NOT_FOUND, "Not Found".to_string()));
    }

    tracing::warn!("RESET: clearing all seats");
    let removed = state.seats.reset().await.map_err(|e| {
        tracing::error!("RESET failed: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to clear seats".to_string())
    })?;
    tracing::warn!("RESET: removed {} seats", removed);

    Ok((StatusCode::OK, "Database Cleared"))
}
