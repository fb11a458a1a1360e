pub mod aggregate;
pub mod change;
pub mod classify;
pub mod domain;
pub mod ports;
pub mod rank;
pub mod score;
pub mod window;

pub use aggregate::{
    aggregate, aggregate_grouped, agent_metrics, group_by_agent, week_over_week, weekly_series,
    AgentMetrics, AgentSums, AggregatedMetrics, Aggregation, GroupBy, MetricSums, TeamMetrics,
    WeekComparison,
};
pub use change::{percent_change, Change, Trend};
pub use classify::{AllowListClassifier, Classifier};
pub use domain::{
    Agent, AgentClass, AgentCredentials, AgentSummary, NewAgent, Page, PerformanceRecord,
    RecordChanges, RecordFilter, RecordInput, RecordPage, Role,
};
pub use ports::{DatabaseService, InsightService, PortError, PortResult};
pub use rank::{leaderboards, rank, rank_position, Dimension, Direction, Leaderboards, RankedAgent};
pub use score::{agent_score, score, score_with_listings};
pub use window::{
    format_date, previous_week_window, week_of_year, week_window, week_window_by_number,
    DateRange, PeriodSelector, WeekWindow, WindowError,
};
