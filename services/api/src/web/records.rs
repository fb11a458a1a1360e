//! services/api/src/web/records.rs
//!
//! CRUD handlers for daily performance records. Agents own their records; admins can
//! read and change everyone's but never submit their own.

use crate::error::{bad_request, forbidden, port_failure, window_failure, HandlerError};
use crate::web::auth::AuthUser;
use crate::web::query::visible_agent;
use crate::web::state::AppState;
use agent_metrics_core::aggregate::{AggregatedMetrics, MetricSums};
use agent_metrics_core::domain::{Page, PerformanceRecord, RecordChanges, RecordFilter, RecordInput};
use agent_metrics_core::window::{supported_date, DateRange};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Largest count a record field can hold.
pub const MAX_COUNT: u32 = i32::MAX as u32;

// Range checks on submitted records, before they reach storage.
fn check_counts(counts: &[Option<u32>]) -> Result<(), HandlerError> {
    if counts.iter().flatten().any(|&c| c > MAX_COUNT) {
        return Err(bad_request(format!("Counts must be between 0 and {}", MAX_COUNT)));
    }
    Ok(())
}

fn check_date(date: Option<NaiveDate>) -> Result<(), HandlerError> {
    if let Some(date) = date {
        supported_date(date).map_err(window_failure)?;
    }
    Ok(())
}

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListRecordsQuery {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Page size, 1 to 100 (default 10).
    pub limit: Option<u32>,
    pub agent_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct RecordListResponse {
    pub records: Vec<PerformanceRecord>,
    pub pagination: Pagination,
    /// Aggregates over every record matching the filter, not just this page.
    pub stats: AggregatedMetrics,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Loads a record and checks the caller may touch it.
async fn owned_record(
    state: &AppState,
    user: &AuthUser,
    record_id: Uuid,
) -> Result<PerformanceRecord, HandlerError> {
    let record = state
        .db
        .get_record(record_id)
        .await
        .map_err(|e| port_failure("Failed to load record", e))?;
    if !user.can_access(record.agent_id) {
        return Err(forbidden("You can only access your own records"));
    }
    Ok(record)
}

/// POST /records - Submit a daily record
#[utoipa::path(
    post,
    path = "/records",
    request_body = RecordInput,
    responses(
        (status = 201, description = "Record created"),
        (status = 400, description = "Invalid record"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Only agents submit records")
    )
)]
pub async fn create_record_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<RecordInput>,
) -> Result<impl IntoResponse, HandlerError> {
    if user.is_admin() {
        return Err(forbidden("Only agents can submit performance records"));
    }
    check_counts(&input.counts())?;
    check_date(Some(input.date))?;

    let record = state
        .db
        .create_record(user.id, input)
        .await
        .map_err(|e| port_failure("Failed to create record", e))?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /records - Page through records with aggregate stats
#[utoipa::path(
    get,
    path = "/records",
    params(ListRecordsQuery),
    responses(
        (status = 200, description = "A page of records plus stats for the whole filter"),
        (status = 400, description = "Invalid date range"),
        (status = 403, description = "Agents may only list their own records")
    )
)]
pub async fn list_records_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListRecordsQuery>,
) -> Result<impl IntoResponse, HandlerError> {
    let range = DateRange::new(query.start_date, query.end_date).map_err(window_failure)?;
    let filter = RecordFilter {
        agent_id: visible_agent(&user, query.agent_id)?,
        date_from: range.from,
        date_to: range.to,
    };
    let page = Page::normalized(query.page, query.limit);

    let listed = state
        .db
        .list_records(filter, page)
        .await
        .map_err(|e| port_failure("Failed to list records", e))?;
    let per_agent = state
        .db
        .sum_by_agent(filter)
        .await
        .map_err(|e| port_failure("Failed to compute record stats", e))?;

    let mut totals = MetricSums::default();
    for entry in &per_agent {
        totals.merge(&entry.sums);
    }

    Ok(Json(RecordListResponse {
        records: listed.records,
        pagination: Pagination {
            page: page.page,
            limit: page.limit,
            total: listed.total,
            total_pages: page.total_pages(listed.total),
        },
        stats: AggregatedMetrics::from_sums(totals),
    }))
}

/// GET /records/{id}
#[utoipa::path(
    get,
    path = "/records/{id}",
    params(("id" = Uuid, Path, description = "Record id")),
    responses(
        (status = 200, description = "The record"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such record")
    )
)]
pub async fn get_record_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    let record = owned_record(&state, &user, record_id).await?;
    Ok(Json(record))
}

/// PUT /records/{id} - Partially update a record
#[utoipa::path(
    put,
    path = "/records/{id}",
    params(("id" = Uuid, Path, description = "Record id")),
    request_body = RecordChanges,
    responses(
        (status = 200, description = "The updated record"),
        (status = 400, description = "Invalid values"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such record")
    )
)]
pub async fn update_record_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<Uuid>,
    Json(changes): Json<RecordChanges>,
) -> Result<impl IntoResponse, HandlerError> {
    check_counts(&changes.counts())?;
    check_date(changes.date)?;
    owned_record(&state, &user, record_id).await?;

    let record = state
        .db
        .update_record(record_id, changes)
        .await
        .map_err(|e| port_failure("Failed to update record", e))?;
    Ok(Json(record))
}

/// DELETE /records/{id}
#[utoipa::path(
    delete,
    path = "/records/{id}",
    params(("id" = Uuid, Path, description = "Record id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such record")
    )
)]
pub async fn delete_record_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(record_id): Path<Uuid>,
) -> Result<impl IntoResponse, HandlerError> {
    owned_record(&state, &user, record_id).await?;
    state
        .db
        .delete_record(record_id)
        .await
        .map_err(|e| port_failure("Failed to delete record", e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_counts_are_rejected() {
        assert!(check_counts(&[Some(12), None, Some(MAX_COUNT)]).is_ok());
        let (status, _) = check_counts(&[Some(MAX_COUNT + 1)]).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn record_dates_must_be_in_the_calendar_range() {
        assert!(check_date(None).is_ok());
        assert!(check_date(NaiveDate::from_ymd_opt(2024, 1, 15)).is_ok());
        let (status, _) = check_date(NaiveDate::from_ymd_opt(20_000, 1, 3)).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
