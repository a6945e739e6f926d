// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, attempts},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Attempt routes require a valid bearer token.
/// * Admin routes additionally require the 'admin' role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let assessment_routes = Router::new()
        .route("/{id}/eligibility", get(attempts::get_eligibility))
        .route("/{id}/attempts", post(attempts::start_attempt))
        .route(
            "/{id}/attempts/{session_id}/resume",
            post(attempts::resume_attempt),
        )
        .route(
            "/{id}/attempts/{session_id}/finish",
            post(attempts::finish_attempt),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route(
            "/assessments",
            get(admin::list_assessments).post(admin::create_assessment),
        )
        .route(
            "/assessments/{id}",
            put(admin::update_assessment).delete(admin::delete_assessment),
        )
        .route("/assessments/{id}/overrides", put(admin::upsert_override))
        .route(
            "/assessments/{id}/overrides/{user_id}",
            delete(admin::delete_override),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/assessments", assessment_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
