use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use crate::models::{seat::default_seat_layout, Event, NewEvent};
use crate::store::StoreError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(get_all_events))
}

pub fn admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/create-event", post(create_event))
        .route("/admin/generate-seats", post(generate_seats))
}

/* ---------- helpers ---------- */

async fn event_exists(pool: &sqlx::PgPool, event_id: i64) -> sqlx::Result<bool> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1)")
        .bind(event_id)
        .fetch_one(pool)
        .await
}

fn admin_disabled() -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, "Not Found".to_string())
}

/* ---------- EVENTS ---------- */

// GET /api/events
async fn get_all_events(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let events = sqlx::query_as::<_, Event>(
        "SELECT id, name, description, venue, created_at FROM events ORDER BY id",
    )
    .fetch_all(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("get_all_events sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load events".to_string())
    })?;

    Ok((StatusCode::OK, Json(events)))
}

// POST /api/admin/create-event
async fn create_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NewEvent>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !state.config.features.enable_admin {
        return Err(admin_disabled());
    }
    req.validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let event = sqlx::query_as::<_, Event>(
        "INSERT INTO events (name, description, venue)
         VALUES ($1, $2, $3)
         RETURNING id, name, description, venue, created_at",
    )
    .bind(&req.name)
    .bind(req.description.as_deref())
    .bind(req.venue.as_deref())
    .fetch_one(&state.db.pool)
    .await
    .map_err(|e| {
        tracing::error!("create_event sql error: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create event".to_string())
    })?;

    tracing::info!("Created event {} ({})", event.id, event.name);
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateSeatsQuery {
    event_id: i64,
}

// POST /api/admin/generate-seats?eventId=1
async fn generate_seats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GenerateSeatsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if !state.config.features.enable_admin {
        return Err(admin_disabled());
    }

    let exists = event_exists(&state.db.pool, params.event_id)
        .await
        .map_err(|e| {
            tracing::error!("generate_seats sql error: {:?}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
        })?;
    if !exists {
        return Err((
            StatusCode::NOT_FOUND,
            format!("Event {} not found", params.event_id),
        ));
    }

    let layout = default_seat_layout();
    let created = match state.seats.create_batch(params.event_id, &layout).await {
        Ok(seats) => seats,
        Err(StoreError::DuplicateSeats { event_id }) => {
            return Err((
                StatusCode::CONFLICT,
                format!("Event {} already has seats", event_id),
            ));
        }
        Err(e) => {
            tracing::error!("generate_seats store error: {:?}", e);
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate seats".to_string()));
        }
    };

    Ok((
        StatusCode::OK,
        Json(json!({
            "message": format!("Generated {} seats for event {}", created.len(), params.event_id),
            "seats": created.len(),
        })),
    ))
}
