pub mod events;
pub mod notifications;
pub mod tickets;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(events::routes())
        .merge(events::admin_routes())
        .merge(tickets::routes())
        .merge(notifications::routes())
}
