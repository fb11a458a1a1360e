//! services/api/src/reports/mod.rs
//!
//! Report payloads. Each builder fetches plain data through the storage port, hands it
//! to the core engine, and packages the result for the HTTP layer or the HTML renderer.

pub mod html;

use agent_metrics_core::aggregate::{
    agent_metrics, series_trends, week_over_week, weekly_series, AgentMetrics, SeriesTrends,
    TeamMetrics, WeekBucket, WeekComparison,
};
use agent_metrics_core::classify::Classifier;
use agent_metrics_core::domain::{PerformanceRecord, RecordFilter};
use agent_metrics_core::ports::{DatabaseService, PortError, PortResult};
use agent_metrics_core::rank::{leaderboards, rank, rank_position, Dimension, Direction, Leaderboards, RankedAgent};
use agent_metrics_core::window::{previous_week_window, week_window, DateRange};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Leaderboards on the dashboard show this many agents.
pub const DASHBOARD_TOP: usize = 5;
/// Trend reports highlight this many agents from the latest week.
pub const TRENDS_TOP: usize = 3;
/// Agent reports list this many of the newest records.
pub const RECENT_RECORDS: usize = 10;

pub fn filter_for(range: DateRange, agent_id: Option<Uuid>) -> RecordFilter {
    RecordFilter {
        agent_id,
        date_from: range.from,
        date_to: range.to,
    }
}

/// Per-agent aggregates for a filter, identities resolved through the store.
pub async fn load_agent_metrics(
    db: &dyn DatabaseService,
    classifier: &dyn Classifier,
    filter: RecordFilter,
) -> PortResult<Vec<AgentMetrics>> {
    let sums = db.sum_by_agent(filter).await?;
    let ids: Vec<Uuid> = sums.iter().map(|s| s.agent_id).collect();
    let agents = db.get_agents_by_ids(&ids).await?;
    Ok(agent_metrics(&sums, &agents, classifier))
}

//=========================================================================================
// Dashboard
//=========================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub generated_at: DateTime<Utc>,
    pub period: DateRange,
    pub team: TeamMetrics,
    pub agents: Vec<AgentMetrics>,
    pub leaderboards: Leaderboards,
}

pub async fn dashboard(
    db: &dyn DatabaseService,
    classifier: &dyn Classifier,
    period: DateRange,
) -> PortResult<DashboardReport> {
    let agents = load_agent_metrics(db, classifier, filter_for(period, None)).await?;
    Ok(DashboardReport {
        generated_at: Utc::now(),
        period,
        team: TeamMetrics::from_agents(&agents),
        leaderboards: leaderboards(&agents, Some(DASHBOARD_TOP)),
        agents,
    })
}

//=========================================================================================
// Single Agent
//=========================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub generated_at: DateTime<Utc>,
    pub period: DateRange,
    pub agent: AgentMetrics,
    /// Position on the score leaderboard among every agent active in the period.
    pub position: Option<usize>,
    pub total_agents: usize,
    pub weekly: Option<WeekComparison>,
    pub recent_records: Vec<PerformanceRecord>,
}

pub async fn agent_report(
    db: &dyn DatabaseService,
    classifier: &dyn Classifier,
    agent_id: Uuid,
    period: DateRange,
    include_weekly: bool,
    today: NaiveDate,
) -> PortResult<AgentReport> {
    let everyone = load_agent_metrics(db, classifier, filter_for(period, None)).await?;
    let agent = everyone
        .iter()
        .find(|e| e.agent.id == agent_id)
        .cloned()
        .ok_or_else(|| {
            PortError::NotFound(format!("No records for agent {} in this period", agent_id))
        })?;

    let mut recent_records = db.query_records(filter_for(period, Some(agent_id))).await?;
    recent_records.truncate(RECENT_RECORDS);

    let weekly = if include_weekly {
        let reference = period.to.unwrap_or(today);
        let span = RecordFilter {
            agent_id: Some(agent_id),
            date_from: Some(previous_week_window(reference).start_date()),
            date_to: Some(week_window(reference).end_date()),
        };
        let records = db.query_records(span).await?;
        Some(week_over_week(&records, reference))
    } else {
        None
    };

    Ok(AgentReport {
        generated_at: Utc::now(),
        period,
        position: rank_position(&everyone, agent_id, Dimension::Score),
        total_agents: everyone.len(),
        agent,
        weekly,
        recent_records,
    })
}

//=========================================================================================
// Trends
//=========================================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TrendsReport {
    pub generated_at: DateTime<Utc>,
    pub end_date: NaiveDate,
    pub weeks: Vec<WeekBucket>,
    pub trends: SeriesTrends,
    /// Best scores in the most recent week.
    pub top_performers: Vec<RankedAgent>,
}

pub async fn trends(
    db: &dyn DatabaseService,
    classifier: &dyn Classifier,
    end_date: NaiveDate,
    weeks: u32,
) -> PortResult<TrendsReport> {
    let latest = week_window(end_date);
    let earliest = latest.start_date() - Duration::days(i64::from(weeks.saturating_sub(1)) * 7);
    let records = db
        .query_records(RecordFilter {
            agent_id: None,
            date_from: Some(earliest),
            date_to: Some(latest.end_date()),
        })
        .await?;

    let buckets = weekly_series(&records, end_date, weeks);
    let latest_agents = load_agent_metrics(db, classifier, filter_for(latest.as_range(), None)).await?;

    Ok(TrendsReport {
        generated_at: Utc::now(),
        end_date,
        trends: series_trends(&buckets),
        weeks: buckets,
        top_performers: rank(&latest_agents, Dimension::Score, Direction::Desc, Some(TRENDS_TOP)),
    })
}

//=========================================================================================
// Export
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Html,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "html" => Ok(ExportFormat::Html),
            other => Err(format!("unsupported export format '{}' (use json or html)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportTemplate {
    Dashboard,
    Agent,
    Trends,
    Summary,
}

impl ExportTemplate {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportTemplate::Dashboard => "dashboard",
            ExportTemplate::Agent => "agent",
            ExportTemplate::Trends => "trends",
            ExportTemplate::Summary => "summary",
        }
    }
}

impl fmt::Display for ExportTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportTemplate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dashboard" => Ok(ExportTemplate::Dashboard),
            "agent" | "agent-performance" => Ok(ExportTemplate::Agent),
            "trends" => Ok(ExportTemplate::Trends),
            "summary" => Ok(ExportTemplate::Summary),
            other => Err(format!("unknown report template '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportMetadata {
    pub generated_at: DateTime<Utc>,
    pub template: ExportTemplate,
    pub period: DateRange,
    pub total_records: usize,
    pub total_agents: usize,
}

/// Everything a downstream renderer needs for one period.
#[derive(Debug, Clone, Serialize)]
pub struct ExportPayload {
    pub metadata: ExportMetadata,
    pub summary: TeamMetrics,
    pub rankings: Leaderboards,
    /// Ordered by score, best first.
    pub agents: Vec<AgentMetrics>,
    pub records: Vec<PerformanceRecord>,
}

pub async fn export(
    db: &dyn DatabaseService,
    classifier: &dyn Classifier,
    period: DateRange,
    template: ExportTemplate,
) -> PortResult<ExportPayload> {
    let filter = filter_for(period, None);
    let agents = load_agent_metrics(db, classifier, filter).await?;
    let records = db.query_records(filter).await?;

    let by_score: Vec<AgentMetrics> = rank(&agents, Dimension::Score, Direction::Desc, None)
        .into_iter()
        .map(|r| r.entry)
        .collect();

    Ok(ExportPayload {
        metadata: ExportMetadata {
            generated_at: Utc::now(),
            template,
            period,
            total_records: records.len(),
            total_agents: agents.len(),
        },
        summary: TeamMetrics::from_agents(&agents),
        rankings: leaderboards(&agents, None),
        agents: by_score,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryDb;
    use agent_metrics_core::classify::AllowListClassifier;
    use agent_metrics_core::domain::{NewAgent, RecordInput, Role};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn input(date: NaiveDate, inquiries: u32, showings: u32, deals: u32, listings: u32) -> RecordInput {
        RecordInput {
            date,
            inquiries_received: inquiries,
            showings_completed: Some(showings),
            deals_closed: Some(deals),
            listings_acquired: listings,
            follow_up_done: false,
            crm_usage_level: None,
            crm_properties_listed: None,
            crm_links: None,
            crm_difficulty_reported: None,
            crm_difficulty_detail: None,
            notes: None,
        }
    }

    async fn seeded() -> (InMemoryDb, Uuid, Uuid) {
        let db = InMemoryDb::new();
        let mut ids = Vec::new();
        for (email, name) in [("ana@example.com", "Ana"), ("bruno@example.com", "Bruno")] {
            let agent = db
                .create_agent(NewAgent {
                    email: email.to_string(),
                    name: name.to_string(),
                    role: Role::Agent,
                    password_hash: "x".to_string(),
                })
                .await
                .unwrap();
            ids.push(agent.id);
        }
        let (ana, bruno) = (ids[0], ids[1]);
        // Week of 2024-01-08 and week of 2024-01-15.
        db.create_record(ana, input(d(2024, 1, 9), 10, 4, 1, 0)).await.unwrap();
        db.create_record(ana, input(d(2024, 1, 16), 20, 10, 2, 0)).await.unwrap();
        db.create_record(bruno, input(d(2024, 1, 17), 5, 1, 0, 3)).await.unwrap();
        (db, ana, bruno)
    }

    #[tokio::test]
    async fn dashboard_ranks_every_active_agent() {
        let (db, ana, _) = seeded().await;
        let report = dashboard(&db, &AllowListClassifier::default(), DateRange::unbounded())
            .await
            .unwrap();

        assert_eq!(report.team.agent_count, 2);
        assert_eq!(report.team.metrics.totals.inquiries, 35);
        assert_eq!(report.leaderboards.score[0].entry.agent.id, ana);
        assert_eq!(report.leaderboards.listings[0].entry.agent.name, "Bruno");
    }

    #[tokio::test]
    async fn agent_report_includes_position_and_weekly_change() {
        let (db, ana, bruno) = seeded().await;
        let classifier = AllowListClassifier::default();
        let report = agent_report(&db, &classifier, ana, DateRange::unbounded(), true, d(2024, 1, 18))
            .await
            .unwrap();

        assert_eq!(report.position, Some(1));
        assert_eq!(report.total_agents, 2);
        assert_eq!(report.recent_records.len(), 2);
        assert_eq!(report.recent_records[0].date, d(2024, 1, 16));
        let weekly = report.weekly.unwrap();
        assert_eq!(weekly.current.totals.inquiries, 20);
        assert_eq!(weekly.previous.totals.inquiries, 10);
        assert_eq!(weekly.changes.inquiries.percentage, 100);

        let without = agent_report(&db, &classifier, bruno, DateRange::unbounded(), false, d(2024, 1, 18))
            .await
            .unwrap();
        assert!(without.weekly.is_none());
        assert_eq!(without.position, Some(2));
    }

    #[tokio::test]
    async fn agent_without_records_in_period_is_not_found() {
        let (db, _, bruno) = seeded().await;
        let period = DateRange::new(Some(d(2024, 1, 8)), Some(d(2024, 1, 13))).unwrap();
        let result = agent_report(&db, &AllowListClassifier::default(), bruno, period, true, d(2024, 1, 18)).await;
        assert!(matches!(result, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn trends_cover_consecutive_weeks_and_top_performers() {
        let (db, ana, _) = seeded().await;
        let report = trends(&db, &AllowListClassifier::default(), d(2024, 1, 18), 2)
            .await
            .unwrap();

        assert_eq!(report.weeks.len(), 2);
        assert_eq!(report.weeks[0].week_number, 2);
        assert_eq!(report.weeks[1].week_number, 3);
        assert_eq!(report.weeks[1].metrics.totals.inquiries, 25);
        assert_eq!(report.trends.inquiries.percentage, 150);
        assert_eq!(report.top_performers.len(), 2);
        assert_eq!(report.top_performers[0].entry.agent.id, ana);
    }

    #[tokio::test]
    async fn export_orders_agents_by_score() {
        let (db, ana, _) = seeded().await;
        let payload = export(&db, &AllowListClassifier::default(), DateRange::unbounded(), ExportTemplate::Summary)
            .await
            .unwrap();

        assert_eq!(payload.metadata.total_records, 3);
        assert_eq!(payload.metadata.total_agents, 2);
        assert_eq!(payload.agents[0].agent.id, ana);
        assert_eq!(payload.summary.metrics.totals.listings, 3);
    }

    #[test]
    fn template_names_parse() {
        assert_eq!("agent-performance".parse::<ExportTemplate>(), Ok(ExportTemplate::Agent));
        assert_eq!("Summary".parse::<ExportTemplate>(), Ok(ExportTemplate::Summary));
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
