//! services/api/src/web/stats.rs
//!
//! Statistics endpoints: period overview, week-over-week comparison, and generic
//! leaderboards.

use crate::error::{bad_request, port_failure, HandlerError};
use crate::reports::{filter_for, load_agent_metrics};
use crate::web::auth::AuthUser;
use crate::web::query::{today, visible_agent, AgentQuery, PeriodQuery, WeekQuery};
use crate::web::state::AppState;
use agent_metrics_core::aggregate::{week_over_week, AgentMetrics, TeamMetrics, WeekComparison};
use agent_metrics_core::domain::RecordFilter;
use agent_metrics_core::rank::{rank, Dimension, Direction, RankedAgent};
use agent_metrics_core::window::{previous_week_window, week_of_year, week_window, week_year, DateRange};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub period: DateRange,
    pub team: TeamMetrics,
    pub agents: Vec<AgentMetrics>,
}

/// GET /stats/overview - Team totals and per-agent breakdown for a period
#[utoipa::path(
    get,
    path = "/stats/overview",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Team and per-agent aggregates"),
        (status = 400, description = "Invalid period"),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn overview_handler(
    State(state): State<Arc<AppState>>,
    Query(period): Query<PeriodQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let range = period.range(today())?;
    let agents = load_agent_metrics(state.db.as_ref(), state.classifier.as_ref(), filter_for(range, None))
        .await
        .map_err(|e| port_failure("Failed to compute overview", e))?;

    Ok(Json(OverviewResponse {
        period: range,
        team: TeamMetrics::from_agents(&agents),
        agents,
    }))
}

#[derive(Debug, Serialize)]
pub struct WeeklyResponse {
    pub agent_id: Option<Uuid>,
    pub year: i32,
    pub week_number: u32,
    #[serde(flatten)]
    pub comparison: WeekComparison,
}

/// GET /stats/weekly - This week against the previous one
#[utoipa::path(
    get,
    path = "/stats/weekly",
    params(WeekQuery, AgentQuery),
    responses(
        (status = 200, description = "Week-over-week comparison"),
        (status = 400, description = "Invalid week"),
        (status = 403, description = "Agents may only view their own data")
    )
)]
pub async fn weekly_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(week): Query<WeekQuery>,
    Query(agent): Query<AgentQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let agent_id = visible_agent(&user, agent.agent_id)?;
    let reference = week.reference(today())?;

    let filter = RecordFilter {
        agent_id,
        date_from: Some(previous_week_window(reference).start_date()),
        date_to: Some(week_window(reference).end_date()),
    };
    let records = state
        .db
        .query_records(filter)
        .await
        .map_err(|e| port_failure("Failed to load weekly records", e))?;

    Ok(Json(WeeklyResponse {
        agent_id,
        year: week_year(reference),
        week_number: week_of_year(reference),
        comparison: week_over_week(&records, reference),
    }))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RankingQuery {
    /// Metric to rank on (default `score`).
    pub dimension: Option<String>,
    /// `asc` or `desc` (default `desc`).
    pub direction: Option<String>,
    /// Keep only the first N agents.
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RankingResponse {
    pub period: DateRange,
    pub dimension: Dimension,
    pub direction: Direction,
    pub rankings: Vec<RankedAgent>,
}

/// GET /rankings - Leaderboard on any metric
#[utoipa::path(
    get,
    path = "/rankings",
    params(PeriodQuery, RankingQuery),
    responses(
        (status = 200, description = "Ranked agents"),
        (status = 400, description = "Unknown dimension or invalid period"),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn rankings_handler(
    State(state): State<Arc<AppState>>,
    Query(period): Query<PeriodQuery>,
    Query(query): Query<RankingQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let range = period.range(today())?;
    let dimension = match &query.dimension {
        Some(raw) => raw.parse::<Dimension>().map_err(bad_request)?,
        None => Dimension::Score,
    };
    let direction = match &query.direction {
        Some(raw) => raw.parse::<Direction>().map_err(bad_request)?,
        None => Direction::default(),
    };

    let agents = load_agent_metrics(
        state.db.as_ref(),
        state.classifier.as_ref(),
        filter_for(range, None),
    )
    .await
    .map_err(|e| port_failure("Failed to compute rankings", e))?;

    Ok(Json(RankingResponse {
        period: range,
        dimension,
        direction,
        rankings: rank(&agents, dimension, direction, query.limit),
    }))
}
