//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use crate::web::{auth, health, insights, records, reports, stats};
use agent_metrics_core::domain::{RecordChanges, RecordInput};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        records::create_record_handler,
        records::list_records_handler,
        records::get_record_handler,
        records::update_record_handler,
        records::delete_record_handler,
        stats::overview_handler,
        stats::weekly_handler,
        stats::rankings_handler,
        reports::dashboard_handler,
        reports::agent_report_handler,
        reports::trends_handler,
        reports::export_handler,
        insights::recommendations_handler,
        insights::my_recommendations_handler,
        health::health_handler,
    ),
    components(
        schemas(
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::AuthUser,
            auth::AuthResponse,
            RecordInput,
            RecordChanges,
            records::Pagination,
            insights::RecommendationsRequest,
            health::HealthResponse,
        )
    ),
    tags(
        (name = "Agent Performance API", description = "Daily activity records, aggregates, rankings and reports for a real-estate sales team.")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/register",
            "/records",
            "/records/{id}",
            "/stats/weekly",
            "/rankings",
            "/reports/agents/{agent_id}",
            "/reports/export",
            "/insights/recommendations",
            "/insights/my-recommendations",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
