//! services/api/src/web/insights.rs
//!
//! LLM-backed coaching recommendations over a period's aggregates, for the whole team
//! (administrators) or for one agent's own records.

use crate::error::{port_failure, window_failure, HandlerError};
use crate::reports::{filter_for, load_agent_metrics};
use crate::web::auth::AuthUser;
use crate::web::query::visible_agent;
use crate::web::state::AppState;
use agent_metrics_core::aggregate::{AgentMetrics, TeamMetrics};
use agent_metrics_core::window::DateRange;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

pub const NOT_ENOUGH_DATA: &str = "Not enough data to generate recommendations";

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RecommendationsRequest {
    /// Limit the analysis to one agent.
    pub agent_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub recommendations: Vec<String>,
    pub team: TeamMetrics,
    pub agents: Vec<AgentMetrics>,
}

/// Splits model output into its non-blank lines.
pub fn recommendation_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Aggregates the period and asks the model for coaching on it.
async fn recommend(
    state: &AppState,
    req: &RecommendationsRequest,
    agent_id: Option<Uuid>,
) -> Result<RecommendationsResponse, HandlerError> {
    let insights = state.insights.clone().ok_or((
        StatusCode::SERVICE_UNAVAILABLE,
        "Recommendations are not configured".to_string(),
    ))?;

    let range = DateRange::new(req.start_date, req.end_date).map_err(window_failure)?;
    let agents = load_agent_metrics(
        state.db.as_ref(),
        state.classifier.as_ref(),
        filter_for(range, agent_id),
    )
    .await
    .map_err(|e| port_failure("Failed to aggregate performance", e))?;
    let team = TeamMetrics::from_agents(&agents);

    if team.metrics.count == 0 {
        return Ok(RecommendationsResponse {
            recommendations: vec![NOT_ENOUGH_DATA.to_string()],
            team,
            agents,
        });
    }

    info!("Requesting recommendations for {} agents", agents.len());
    let text = insights
        .recommendations(&team.metrics, &agents)
        .await
        .map_err(|e| port_failure("Failed to generate recommendations", e))?;

    Ok(RecommendationsResponse {
        recommendations: recommendation_lines(&text),
        team,
        agents,
    })
}

/// POST /insights/recommendations - Coaching recommendations for a period
#[utoipa::path(
    post,
    path = "/insights/recommendations",
    request_body = RecommendationsRequest,
    responses(
        (status = 200, description = "Recommendations, one entry per line"),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "Administrators only"),
        (status = 503, description = "No LLM configured")
    )
)]
pub async fn recommendations_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecommendationsRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let response = recommend(&state, &req, req.agent_id).await?;
    Ok(Json(response))
}

/// POST /insights/my-recommendations - Personal coaching on the caller's own records
///
/// Agents are pinned to themselves. Administrators may name an agent, and otherwise get
/// their own (usually empty) history.
#[utoipa::path(
    post,
    path = "/insights/my-recommendations",
    request_body = RecommendationsRequest,
    responses(
        (status = 200, description = "Recommendations, one entry per line"),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "Another agent's data"),
        (status = 503, description = "No LLM configured")
    )
)]
pub async fn my_recommendations_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<RecommendationsRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let agent_id = visible_agent(&user, req.agent_id)?.unwrap_or(user.id);
    let response = recommend(&state, &req, Some(agent_id)).await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines_are_dropped() {
        let lines = recommendation_lines("Summary\n\n  \n- Coach Ana  \r\n- Praise Bruno");
        assert_eq!(lines, vec!["Summary", "- Coach Ana", "- Praise Bruno"]);
    }
}
