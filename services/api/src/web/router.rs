//! services/api/src/web/router.rs
//!
//! Assembles the HTTP router: public routes, authenticated routes, admin-only routes,
//! and the cross-cutting layers.

use crate::web::{
    auth::{login_handler, logout_handler, me_handler, register_handler},
    health::health_handler,
    insights::{my_recommendations_handler, recommendations_handler},
    middleware::{rate_limit, require_admin, require_auth},
    records::{
        create_record_handler, delete_record_handler, get_record_handler, list_records_handler,
        update_record_handler,
    },
    reports::{agent_report_handler, dashboard_handler, export_handler, trends_handler},
    rest::ApiDoc,
    state::AppState,
    stats::{overview_handler, rankings_handler, weekly_handler},
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const BODY_LIMIT: usize = 1024 * 1024;

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);
    match origin.parse::<HeaderValue>() {
        Ok(value) => layer.allow_origin(value),
        Err(_) => {
            warn!("Ignoring invalid CORS_ORIGIN '{}'", origin);
            layer
        }
    }
}

/// Builds the complete application, Swagger UI included.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/auth/register", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Routes for any authenticated caller
    let member_routes = Router::new()
        .route("/auth/me", get(me_handler))
        .route("/records", post(create_record_handler).get(list_records_handler))
        .route(
            "/records/{id}",
            get(get_record_handler)
                .put(update_record_handler)
                .delete(delete_record_handler),
        )
        .route("/stats/weekly", get(weekly_handler))
        .route("/insights/my-recommendations", post(my_recommendations_handler));

    // Administrator-only routes
    let admin_routes = Router::new()
        .route("/stats/overview", get(overview_handler))
        .route("/rankings", get(rankings_handler))
        .route("/reports/dashboard", get(dashboard_handler))
        .route("/reports/agents/{agent_id}", get(agent_report_handler))
        .route("/reports/trends", get(trends_handler))
        .route("/reports/export", get(export_handler))
        .route("/insights/recommendations", post(recommendations_handler))
        .route_layer(axum_middleware::from_fn(require_admin));

    let protected_routes = Router::new()
        .merge(member_routes)
        .merge(admin_routes)
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(axum_middleware::from_fn_with_state(app_state.clone(), rate_limit))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer(&app_state.config.cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
