//! services/api/src/web/reports.rs
//!
//! Administrator report endpoints: dashboard, single agent, trends, and export.

use crate::error::{bad_request, port_failure, window_failure, HandlerError};
use crate::reports::{self, html, ExportFormat, ExportTemplate};
use crate::web::query::{today, PeriodQuery};
use crate::web::state::AppState;
use agent_metrics_core::window::supported_date;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

pub const DEFAULT_TREND_WEEKS: u32 = 4;
pub const MAX_TREND_WEEKS: u32 = 52;

fn trend_weeks(requested: Option<u32>) -> Result<u32, HandlerError> {
    match requested.unwrap_or(DEFAULT_TREND_WEEKS) {
        weeks @ 1..=MAX_TREND_WEEKS => Ok(weeks),
        _ => Err(bad_request(format!(
            "weeks must be between 1 and {}",
            MAX_TREND_WEEKS
        ))),
    }
}

/// GET /reports/dashboard - Team metrics and top-5 leaderboards
#[utoipa::path(
    get,
    path = "/reports/dashboard",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Dashboard report"),
        (status = 400, description = "Invalid period"),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Query(period): Query<PeriodQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let range = period.range(today())?;
    let report = reports::dashboard(state.db.as_ref(), state.classifier.as_ref(), range)
        .await
        .map_err(|e| port_failure("Failed to build dashboard", e))?;
    Ok(Json(report))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AgentReportQuery {
    /// Include the week-over-week analysis (default true).
    pub include_weekly: Option<bool>,
}

/// GET /reports/agents/{agent_id} - One agent's performance in context
#[utoipa::path(
    get,
    path = "/reports/agents/{agent_id}",
    params(
        ("agent_id" = Uuid, Path, description = "Agent id"),
        PeriodQuery,
        AgentReportQuery
    ),
    responses(
        (status = 200, description = "Agent report"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "No records for the agent in the period")
    )
)]
pub async fn agent_report_handler(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<Uuid>,
    Query(period): Query<PeriodQuery>,
    Query(query): Query<AgentReportQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let today = today();
    let range = period.range(today)?;
    let report = reports::agent_report(
        state.db.as_ref(),
        state.classifier.as_ref(),
        agent_id,
        range,
        query.include_weekly.unwrap_or(true),
        today,
    )
    .await
    .map_err(|e| port_failure("Failed to build agent report", e))?;
    Ok(Json(report))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrendsQuery {
    /// Number of weeks, 1 to 52 (default 4).
    pub weeks: Option<u32>,
    /// Any date in the last week of the series (default today).
    pub end_date: Option<NaiveDate>,
}

/// GET /reports/trends - Weekly series with first-versus-last trends
#[utoipa::path(
    get,
    path = "/reports/trends",
    params(TrendsQuery),
    responses(
        (status = 200, description = "Trends report"),
        (status = 400, description = "Invalid number of weeks or end date"),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn trends_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendsQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let weeks = trend_weeks(query.weeks)?;
    let end_date =
        supported_date(query.end_date.unwrap_or_else(today)).map_err(window_failure)?;
    let report = reports::trends(state.db.as_ref(), state.classifier.as_ref(), end_date, weeks)
        .await
        .map_err(|e| port_failure("Failed to build trends", e))?;
    Ok(Json(report))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportQuery {
    /// `json` (default) or `html`.
    pub format: Option<String>,
    /// `dashboard` (default), `agent`, `trends`, or `summary`.
    pub template: Option<String>,
    /// Required for the `agent` template.
    pub agent_id: Option<Uuid>,
    /// Series length for the `trends` template (default 4).
    pub weeks: Option<u32>,
}

/// GET /reports/export - Export payload as JSON, or a rendered HTML document
#[utoipa::path(
    get,
    path = "/reports/export",
    params(PeriodQuery, ExportQuery),
    responses(
        (status = 200, description = "Export payload (JSON) or report document (HTML)"),
        (status = 400, description = "Unknown format or template"),
        (status = 403, description = "Administrators only"),
        (status = 404, description = "No records for the requested agent")
    )
)]
pub async fn export_handler(
    State(state): State<Arc<AppState>>,
    Query(period): Query<PeriodQuery>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, HandlerError> {
    let format = match &query.format {
        Some(raw) => raw.parse::<ExportFormat>().map_err(bad_request)?,
        None => ExportFormat::Json,
    };
    let template = match &query.template {
        Some(raw) => raw.parse::<ExportTemplate>().map_err(bad_request)?,
        None => ExportTemplate::Dashboard,
    };
    let today = today();
    let range = period.range(today)?;
    let (db, classifier) = (state.db.as_ref(), state.classifier.as_ref());

    if format == ExportFormat::Json {
        let payload = reports::export(db, classifier, range, template)
            .await
            .map_err(|e| port_failure("Failed to build export", e))?;
        return Ok(Json(payload).into_response());
    }

    let document = match template {
        ExportTemplate::Dashboard => {
            let report = reports::dashboard(db, classifier, range)
                .await
                .map_err(|e| port_failure("Failed to build dashboard", e))?;
            html::render_dashboard(&report)
        }
        ExportTemplate::Agent => {
            let agent_id = query
                .agent_id
                .ok_or_else(|| bad_request("agent_id is required for the agent template"))?;
            let report = reports::agent_report(db, classifier, agent_id, range, true, today)
                .await
                .map_err(|e| port_failure("Failed to build agent report", e))?;
            html::render_agent(&report)
        }
        ExportTemplate::Trends => {
            let weeks = trend_weeks(query.weeks)?;
            let report = reports::trends(db, classifier, range.to.unwrap_or(today), weeks)
                .await
                .map_err(|e| port_failure("Failed to build trends", e))?;
            html::render_trends(&report)
        }
        ExportTemplate::Summary => {
            let payload = reports::export(db, classifier, range, template)
                .await
                .map_err(|e| port_failure("Failed to build export", e))?;
            html::render_summary(&payload)
        }
    };

    let disposition = format!(
        "inline; filename=\"report-{}-{}.html\"",
        template,
        today.format("%Y%m%d")
    );
    Ok((
        [(header::CONTENT_DISPOSITION, disposition)],
        Html(document),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_weeks_are_bounded() {
        assert_eq!(trend_weeks(None).unwrap(), 4);
        assert_eq!(trend_weeks(Some(52)).unwrap(), 52);
        assert!(trend_weeks(Some(0)).is_err());
        assert!(trend_weeks(Some(53)).is_err());
    }
}
