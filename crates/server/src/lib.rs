pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;

use axum::{
    http::{header, HeaderValue},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub db: db::Database,
    pub config: config::Config,
}

/// Builds the full HTTP application for `state`.
pub fn app(state: AppState) -> Router {
    // Routes that must answer without a token
    let public_routes = Router::new()
        .nest("/auth", routes::auth::public_router())
        .nest("/quiz-submissions", routes::quiz_submissions::public_router());

    // Build protected routes (require authentication)
    let protected_routes = Router::new()
        .nest("/auth", routes::auth::router())
        .nest("/admins", routes::admins::router())
        .nest("/phase-templates", routes::phase_templates::router())
        .nest("/projects", routes::projects::router())
        .nest("/tasks", routes::tasks::router())
        .nest("/quiz-submissions", routes::quiz_submissions::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Same-path routes from both sets merge into one method router
    let api_router = public_routes
        .merge(protected_routes)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_router)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

async fn health_check() -> &'static str {
    "OK"
}
