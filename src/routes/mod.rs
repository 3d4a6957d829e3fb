pub mod auth;
pub mod backups;
pub mod comments;
pub mod contact;
pub mod health;
pub mod projects;
pub mod settings;
pub mod tickets;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Every route, without state.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(backups::router())
        .merge(settings::router())
        .merge(projects::router())
        .merge(comments::router())
        .merge(tickets::router())
        .merge(contact::router())
}

/// The service `serve` runs: routes, request tracing and state.
pub fn app(state: AppState) -> Router {
    router().layer(TraceLayer::new_for_http()).with_state(state)
}

