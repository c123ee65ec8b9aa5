//! Live seat-map updates over WebSocket.
//!
//! `GET /api/ws/events/{event_id}/seats` upgrades to a socket that receives
//! one text frame per seat sold for that event, containing the seat number.
//! Delivery is best effort: a client that falls behind skips what it missed.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::notify::seats_topic;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/ws/events/{event_id}/seats", get(seat_updates))
}

async fn seat_updates(
    ws: WebSocketUpgrade,
    Path(event_id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| forward_seat_updates(socket, state, event_id))
}

async fn forward_seat_updates(socket: WebSocket, state: Arc<AppState>, event_id: i64) {
    let topic = seats_topic(event_id);
    let mut updates = state.broadcaster.subscribe();
    let (mut sender, mut receiver) = socket.split();

    debug!(event_id, "Seat update subscriber connected");

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(note) if note.topic == topic => {
                    if sender.send(Message::Text(note.seat_number.into())).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(event_id, skipped, "Seat update subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!(event_id, "Seat update subscriber disconnected");
}
