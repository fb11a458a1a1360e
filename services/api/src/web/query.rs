//! services/api/src/web/query.rs
//!
//! Query-string shapes shared by the statistics and report endpoints, and the
//! translation from raw parameters to core period selectors.

use crate::error::{bad_request, forbidden, window_failure, HandlerError};
use crate::web::auth::AuthUser;
use agent_metrics_core::window::{
    supported_date, week_window_by_number, week_year, DateRange, PeriodSelector,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

/// The current calendar date, in UTC.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// A reporting period: explicit dates, or a numbered week.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    /// Inclusive start date (YYYY-MM-DD).
    pub start_date: Option<NaiveDate>,
    /// Inclusive end date (YYYY-MM-DD).
    pub end_date: Option<NaiveDate>,
    /// Week number within `year`, 1-based.
    pub week: Option<u32>,
    /// Year the week belongs to; defaults to the current week-year.
    pub year: Option<i32>,
}

impl PeriodQuery {
    pub fn selector(&self, today: NaiveDate) -> Result<PeriodSelector, HandlerError> {
        let has_dates = self.start_date.is_some() || self.end_date.is_some();
        match (self.week, self.year) {
            (Some(_), _) if has_dates => Err(bad_request(
                "Use either week/year or start_date/end_date, not both",
            )),
            (Some(week), year) => Ok(PeriodSelector::Week {
                year: year.unwrap_or_else(|| week_year(today)),
                week,
            }),
            (None, Some(_)) => Err(bad_request("year requires week")),
            (None, None) if has_dates => Ok(PeriodSelector::Explicit {
                from: self.start_date,
                to: self.end_date,
            }),
            (None, None) => Ok(PeriodSelector::All),
        }
    }

    /// Resolves the period against `today`; invalid periods are 400s.
    pub fn range(&self, today: NaiveDate) -> Result<DateRange, HandlerError> {
        self.selector(today)?.resolve(today).map_err(window_failure)
    }
}

/// Restricts a query to one agent.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AgentQuery {
    /// Only include this agent's records (admins only).
    pub agent_id: Option<Uuid>,
}

/// Applies the visibility rule: agents only ever see their own data, admins see
/// whatever they ask for.
pub fn visible_agent(user: &AuthUser, requested: Option<Uuid>) -> Result<Option<Uuid>, HandlerError> {
    if user.is_admin() {
        return Ok(requested);
    }
    match requested {
        Some(other) if other != user.id => Err(forbidden("Agents can only view their own data")),
        _ => Ok(Some(user.id)),
    }
}

/// The reference date for a week-over-week view: `date`, else the numbered week,
/// else today.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WeekQuery {
    /// Any date inside the week of interest.
    pub date: Option<NaiveDate>,
    pub week: Option<u32>,
    pub year: Option<i32>,
}

impl WeekQuery {
    pub fn reference(&self, today: NaiveDate) -> Result<NaiveDate, HandlerError> {
        match (self.date, self.week, self.year) {
            (Some(_), Some(_), _) => Err(bad_request("Use either date or week/year, not both")),
            (Some(date), None, _) => supported_date(date).map_err(window_failure),
            (None, Some(week), year) => {
                let year = year.unwrap_or_else(|| week_year(today));
                Ok(week_window_by_number(year, week)
                    .map_err(window_failure)?
                    .start_date())
            }
            (None, None, Some(_)) => Err(bad_request("year requires week")),
            (None, None, None) => Ok(today),
        }
    }
}
