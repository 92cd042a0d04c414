use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{self, MAX_EVENT_BODY_BYTES};
use crate::state::AppState;

pub fn build_router(app_state: AppState) -> Router {
    let event_routes = Router::new()
        .route("/api/events", post(handlers::events::ingest_event_handler))
        .route(
            "/api/events/batch",
            post(handlers::events::ingest_batch_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_event_signature,
        ))
        .layer(DefaultBodyLimit::max(MAX_EVENT_BODY_BYTES));

    let internal_routes = Router::new()
        .route(
            "/api/internal/failures",
            get(handlers::failures::list_failures_handler),
        )
        .route(
            "/api/internal/failures/{failure_id}",
            get(handlers::failures::get_failure_handler),
        )
        .route(
            "/api/internal/failures/{failure_id}/replay",
            post(handlers::failures::replay_failure_handler),
        )
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_internal_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(event_routes)
        .merge(internal_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
