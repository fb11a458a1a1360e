//! crates/agent_metrics_core/src/aggregate.rs
//!
//! The aggregation engine. Turns a filtered set of performance records (or sums the
//! storage layer already grouped) into totals, averages, conversion rates and
//! week-over-week comparisons, for the whole team or per agent.
//!
//! Every function here is pure. An empty input yields zeros, never an error.

use crate::change::{percent_change, series_trend, Change};
use crate::classify::Classifier;
use crate::domain::{Agent, AgentClass, AgentSummary, PerformanceRecord};
use crate::score::{score, score_with_listings};
use crate::window::{format_date, previous_week_window, week_of_year, week_window, week_year, WeekWindow};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

//=========================================================================================
// Sums
//=========================================================================================

/// Raw additive totals. Missing numeric fields count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSums {
    pub records: u64,
    pub inquiries: u64,
    pub showings: u64,
    pub deals: u64,
    pub listings: u64,
    pub crm_properties: u64,
    pub follow_ups: u64,
    pub crm_difficulties: u64,
}

impl MetricSums {
    pub fn add_record(&mut self, record: &PerformanceRecord) {
        self.records += 1;
        self.inquiries += u64::from(record.inquiries_received);
        self.showings += u64::from(record.showings_completed.unwrap_or(0));
        self.deals += u64::from(record.deals_closed.unwrap_or(0));
        self.listings += u64::from(record.listings_acquired);
        self.crm_properties += u64::from(record.crm_properties_listed.unwrap_or(0));
        if record.follow_up_done {
            self.follow_ups += 1;
        }
        if record.crm_difficulty_reported == Some(true) {
            self.crm_difficulties += 1;
        }
    }

    pub fn merge(&mut self, other: &MetricSums) {
        self.records += other.records;
        self.inquiries += other.inquiries;
        self.showings += other.showings;
        self.deals += other.deals;
        self.listings += other.listings;
        self.crm_properties += other.crm_properties;
        self.follow_ups += other.follow_ups;
        self.crm_difficulties += other.crm_difficulties;
    }

    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a PerformanceRecord>,
    {
        let mut sums = Self::default();
        for record in records {
            sums.add_record(record);
        }
        sums
    }
}

/// Per-agent sums, as produced in-process or by the storage layer's group-and-sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSums {
    pub agent_id: Uuid,
    pub sums: MetricSums,
}

/// Groups records by agent, in order of each agent's first appearance.
pub fn group_by_agent(records: &[PerformanceRecord]) -> Vec<AgentSums> {
    let mut order: Vec<AgentSums> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for record in records {
        let slot = *index.entry(record.agent_id).or_insert_with(|| {
            order.push(AgentSums {
                agent_id: record.agent_id,
                sums: MetricSums::default(),
            });
            order.len() - 1
        });
        order[slot].sums.add_record(record);
    }

    order
}

//=========================================================================================
// Derived Metrics
//=========================================================================================

/// Rounds to at most two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `numerator / denominator * 100`, rounded to two decimals; zero when the denominator is.
pub fn rate(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        round2(numerator as f64 / denominator as f64 * 100.0)
    }
}

fn mean(total: u64, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        round2(total as f64 / count as f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Averages {
    pub inquiries: f64,
    pub showings: f64,
    pub deals: f64,
    pub listings: f64,
    pub crm_properties: f64,
}

impl Averages {
    fn over(sums: &MetricSums, count: u64) -> Self {
        Self {
            inquiries: mean(sums.inquiries, count),
            showings: mean(sums.showings, count),
            deals: mean(sums.deals, count),
            listings: mean(sums.listings, count),
            crm_properties: mean(sums.crm_properties, count),
        }
    }
}

/// Funnel conversion rates, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionRates {
    pub inquiries_to_showings: f64,
    pub showings_to_deals: f64,
    pub inquiries_to_deals: f64,
    pub inquiries_to_listings: f64,
}

impl ConversionRates {
    pub fn from_sums(sums: &MetricSums) -> Self {
        Self {
            inquiries_to_showings: rate(sums.showings, sums.inquiries),
            showings_to_deals: rate(sums.deals, sums.showings),
            inquiries_to_deals: rate(sums.deals, sums.inquiries),
            inquiries_to_listings: rate(sums.listings, sums.inquiries),
        }
    }
}

/// Sums, per-record averages and rates for one set of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    pub count: u64,
    pub totals: MetricSums,
    pub averages: Averages,
    pub conversion_rates: ConversionRates,
    /// Share of records with a follow-up, in percent.
    pub follow_up_rate: f64,
    /// Share of records reporting CRM difficulty, in percent.
    pub crm_difficulty_rate: f64,
}

impl AggregatedMetrics {
    pub fn from_sums(totals: MetricSums) -> Self {
        let count = totals.records;
        Self {
            count,
            totals,
            averages: Averages::over(&totals, count),
            conversion_rates: ConversionRates::from_sums(&totals),
            follow_up_rate: rate(totals.follow_ups, count),
            crm_difficulty_rate: rate(totals.crm_difficulties, count),
        }
    }
}

/// Aggregates a record set as a single group.
pub fn aggregate(records: &[PerformanceRecord]) -> AggregatedMetrics {
    AggregatedMetrics::from_sums(MetricSums::from_records(records))
}

//=========================================================================================
// Per-Agent Aggregation
//=========================================================================================

/// One agent's aggregate, annotated with identity, class and both scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentMetrics {
    pub agent: AgentSummary,
    pub class: AgentClass,
    pub metrics: AggregatedMetrics,
    pub score: u64,
    pub score_with_listings: u64,
}

impl AgentMetrics {
    pub fn new(agent: AgentSummary, class: AgentClass, sums: MetricSums) -> Self {
        Self {
            score: score(class, &sums),
            score_with_listings: score_with_listings(&sums),
            metrics: AggregatedMetrics::from_sums(sums),
            agent,
            class,
        }
    }
}

/// Annotates per-agent sums with identities from `agents`. Output order follows `sums`.
///
/// Agents missing from the directory get a placeholder identity and standard scoring.
pub fn agent_metrics(
    sums: &[AgentSums],
    agents: &[Agent],
    classifier: &dyn Classifier,
) -> Vec<AgentMetrics> {
    let directory: HashMap<Uuid, &Agent> = agents.iter().map(|a| (a.id, a)).collect();

    sums.iter()
        .map(|entry| {
            let summary = directory
                .get(&entry.agent_id)
                .map(|agent| AgentSummary::from(*agent))
                .unwrap_or_else(|| AgentSummary::unknown(entry.agent_id));
            let class = classifier.classify(&summary.email);
            AgentMetrics::new(summary, class, entry.sums)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Team,
    Agent,
}

/// Team totals, plus a per-agent breakdown when grouped by agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregation {
    pub team: AggregatedMetrics,
    pub agents: Vec<AgentMetrics>,
}

pub fn aggregate_grouped(
    records: &[PerformanceRecord],
    group_by: GroupBy,
    agents: &[Agent],
    classifier: &dyn Classifier,
) -> Aggregation {
    let team = aggregate(records);
    let agents = match group_by {
        GroupBy::Team => Vec::new(),
        GroupBy::Agent => agent_metrics(&group_by_agent(records), agents, classifier),
    };
    Aggregation { team, agents }
}

/// Team-level view built from per-agent results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TeamMetrics {
    pub agent_count: u64,
    pub metrics: AggregatedMetrics,
    /// Totals divided by the number of agents.
    pub per_agent: Averages,
}

impl TeamMetrics {
    pub fn from_agents(agents: &[AgentMetrics]) -> Self {
        let mut totals = MetricSums::default();
        for entry in agents {
            totals.merge(&entry.metrics.totals);
        }
        let agent_count = agents.len() as u64;
        Self {
            agent_count,
            metrics: AggregatedMetrics::from_sums(totals),
            per_agent: Averages::over(&totals, agent_count),
        }
    }
}

//=========================================================================================
// Period Comparisons
//=========================================================================================

/// Pairwise changes for every summed metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricChanges {
    pub records: Change,
    pub inquiries: Change,
    pub showings: Change,
    pub deals: Change,
    pub listings: Change,
    pub crm_properties: Change,
}

pub fn compare(current: &MetricSums, previous: &MetricSums) -> MetricChanges {
    let pair = |c: u64, p: u64| percent_change(c as f64, p as f64);
    MetricChanges {
        records: pair(current.records, previous.records),
        inquiries: pair(current.inquiries, previous.inquiries),
        showings: pair(current.showings, previous.showings),
        deals: pair(current.deals, previous.deals),
        listings: pair(current.listings, previous.listings),
        crm_properties: pair(current.crm_properties, previous.crm_properties),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeekComparison {
    pub current_window: WeekWindow,
    pub previous_window: WeekWindow,
    pub current: AggregatedMetrics,
    pub previous: AggregatedMetrics,
    pub changes: MetricChanges,
}

/// Compares the week containing `reference` with the week before it.
///
/// Records outside both windows are ignored, so callers may pass a superset.
pub fn week_over_week(records: &[PerformanceRecord], reference: NaiveDate) -> WeekComparison {
    let current_window = week_window(reference);
    let previous_window = previous_week_window(reference);

    let current = MetricSums::from_records(
        records.iter().filter(|r| current_window.contains_date(r.date)),
    );
    let previous = MetricSums::from_records(
        records.iter().filter(|r| previous_window.contains_date(r.date)),
    );

    WeekComparison {
        current_window,
        previous_window,
        changes: compare(&current, &previous),
        current: AggregatedMetrics::from_sums(current),
        previous: AggregatedMetrics::from_sums(previous),
    }
}

/// One week of a trend series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekBucket {
    pub year: i32,
    pub week_number: u32,
    pub window: WeekWindow,
    pub start_formatted: String,
    pub end_formatted: String,
    pub metrics: AggregatedMetrics,
}

/// `weeks` consecutive week windows ending with the one containing `end_reference`,
/// oldest first.
pub fn weekly_series(
    records: &[PerformanceRecord],
    end_reference: NaiveDate,
    weeks: u32,
) -> Vec<WeekBucket> {
    let latest = week_window(end_reference).start_date();
    (0..weeks)
        .rev()
        .map(|back| {
            let window = week_window(latest - Duration::days(i64::from(back) * 7));
            let sums =
                MetricSums::from_records(records.iter().filter(|r| window.contains_date(r.date)));
            WeekBucket {
                year: week_year(window.start_date()),
                week_number: week_of_year(window.start_date()),
                start_formatted: format_date(window.start_date()),
                end_formatted: format_date(window.end_date()),
                window,
                metrics: AggregatedMetrics::from_sums(sums),
            }
        })
        .collect()
}

/// First-versus-last trend per metric across a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesTrends {
    pub inquiries: Change,
    pub showings: Change,
    pub deals: Change,
    pub listings: Change,
    pub crm_properties: Change,
}

pub fn series_trends(buckets: &[WeekBucket]) -> SeriesTrends {
    let column = |pick: fn(&MetricSums) -> u64| -> Change {
        let values: Vec<f64> = buckets
            .iter()
            .map(|b| pick(&b.metrics.totals) as f64)
            .collect();
        series_trend(&values)
    };
    SeriesTrends {
        inquiries: column(|s| s.inquiries),
        showings: column(|s| s.showings),
        deals: column(|s| s.deals),
        listings: column(|s| s.listings),
        crm_properties: column(|s| s.crm_properties),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Trend;
    use crate::classify::AllowListClassifier;
    use crate::domain::Role;
    use chrono::Utc;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn record(agent_id: Uuid, date: NaiveDate, inquiries: u32, showings: Option<u32>, deals: Option<u32>, listings: u32) -> PerformanceRecord {
        let now = Utc::now();
        PerformanceRecord {
            id: Uuid::new_v4(),
            agent_id,
            date,
            inquiries_received: inquiries,
            showings_completed: showings,
            deals_closed: deals,
            listings_acquired: listings,
            follow_up_done: false,
            crm_usage_level: None,
            crm_properties_listed: None,
            crm_links: None,
            crm_difficulty_reported: None,
            crm_difficulty_detail: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn agent(email: &str, name: &str) -> Agent {
        Agent {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            role: Role::Agent,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_input_is_all_zero() {
        let metrics = aggregate(&[]);
        assert_eq!(metrics.count, 0);
        assert_eq!(metrics.totals, MetricSums::default());
        assert_eq!(metrics.averages, Averages::default());
        assert_eq!(metrics.conversion_rates, ConversionRates::default());
        assert_eq!(metrics.follow_up_rate, 0.0);
    }

    #[test]
    fn rates_never_divide_by_zero() {
        let sums = MetricSums {
            inquiries: 0,
            showings: 5,
            ..Default::default()
        };
        let rates = ConversionRates::from_sums(&sums);
        assert_eq!(rates.inquiries_to_showings, 0.0);
        assert_eq!(rates.showings_to_deals, 0.0);
    }

    #[test]
    fn rates_keep_precision_for_small_counts() {
        let sums = MetricSums {
            inquiries: 3,
            showings: 1,
            deals: 1,
            ..Default::default()
        };
        let rates = ConversionRates::from_sums(&sums);
        assert_eq!(rates.inquiries_to_showings, 33.33);
        assert_eq!(rates.showings_to_deals, 100.0);
    }

    #[test]
    fn sums_and_averages_treat_missing_as_zero() {
        let id = Uuid::new_v4();
        let mut with_follow_up = record(id, d(2024, 1, 15), 12, Some(8), Some(3), 5);
        with_follow_up.follow_up_done = true;
        with_follow_up.crm_properties_listed = Some(15);
        let mut difficult = record(id, d(2024, 1, 16), 15, None, None, 8);
        difficult.crm_difficulty_reported = Some(true);

        let metrics = aggregate(&[with_follow_up, difficult]);
        assert_eq!(metrics.count, 2);
        assert_eq!(metrics.totals.inquiries, 27);
        assert_eq!(metrics.totals.showings, 8);
        assert_eq!(metrics.totals.deals, 3);
        assert_eq!(metrics.totals.listings, 13);
        assert_eq!(metrics.totals.crm_properties, 15);
        assert_eq!(metrics.averages.showings, 4.0);
        assert_eq!(metrics.averages.inquiries, 13.5);
        assert_eq!(metrics.follow_up_rate, 50.0);
        assert_eq!(metrics.crm_difficulty_rate, 50.0);
        assert_eq!(metrics.conversion_rates.showings_to_deals, 37.5);
    }

    #[test]
    fn grouping_preserves_first_appearance_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let records = vec![
            record(b, d(2024, 1, 15), 1, None, None, 0),
            record(a, d(2024, 1, 15), 2, None, None, 0),
            record(b, d(2024, 1, 16), 3, None, None, 0),
        ];
        let grouped = group_by_agent(&records);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].agent_id, b);
        assert_eq!(grouped[0].sums.inquiries, 4);
        assert_eq!(grouped[0].sums.records, 2);
        assert_eq!(grouped[1].agent_id, a);
    }

    #[test]
    fn agent_breakdown_is_annotated_and_scored() {
        let standard = agent("agent1@example.com", "Alex");
        let listing_only = agent("agent3@example.com", "Enrique");
        let classifier = AllowListClassifier::from_csv("agent3@example.com");
        let stray = Uuid::new_v4();

        let records = vec![
            record(standard.id, d(2024, 1, 15), 10, Some(5), Some(2), 1),
            record(listing_only.id, d(2024, 1, 15), 15, Some(4), Some(1), 8),
            record(stray, d(2024, 1, 15), 1, Some(1), Some(1), 0),
        ];
        let result = aggregate_grouped(
            &records,
            GroupBy::Agent,
            &[standard.clone(), listing_only.clone()],
            &classifier,
        );

        assert_eq!(result.team.totals.inquiries, 26);
        assert_eq!(result.agents.len(), 3);

        assert_eq!(result.agents[0].agent.name, "Alex");
        assert_eq!(result.agents[0].class, AgentClass::Standard);
        assert_eq!(result.agents[0].score, 26);
        assert_eq!(result.agents[0].score_with_listings, 28);

        assert_eq!(result.agents[1].class, AgentClass::NoShowings);
        assert_eq!(result.agents[1].score, 31);

        assert_eq!(result.agents[2].agent, AgentSummary::unknown(stray));
        assert_eq!(result.agents[2].class, AgentClass::Standard);
        assert_eq!(result.agents[2].score, 6);
    }

    #[test]
    fn team_grouping_skips_breakdown() {
        let classifier = AllowListClassifier::default();
        let records = vec![record(Uuid::new_v4(), d(2024, 1, 15), 4, None, None, 0)];
        let result = aggregate_grouped(&records, GroupBy::Team, &[], &classifier);
        assert!(result.agents.is_empty());
        assert_eq!(result.team.count, 1);
    }

    #[test]
    fn team_metrics_average_per_agent() {
        let classifier = AllowListClassifier::default();
        let sums = vec![
            AgentSums {
                agent_id: Uuid::new_v4(),
                sums: MetricSums { records: 2, inquiries: 10, deals: 1, ..Default::default() },
            },
            AgentSums {
                agent_id: Uuid::new_v4(),
                sums: MetricSums { records: 1, inquiries: 5, deals: 2, ..Default::default() },
            },
        ];
        let team = TeamMetrics::from_agents(&agent_metrics(&sums, &[], &classifier));
        assert_eq!(team.agent_count, 2);
        assert_eq!(team.metrics.count, 3);
        assert_eq!(team.per_agent.inquiries, 7.5);
        assert_eq!(team.per_agent.deals, 1.5);
    }

    #[test]
    fn week_over_week_compares_adjacent_windows() {
        let id = Uuid::new_v4();
        let records = vec![
            // previous week: Mon 2024-01-08 .. Sat 2024-01-13
            record(id, d(2024, 1, 9), 10, Some(4), Some(1), 2),
            // Sunday 2024-01-14 is outside both business weeks
            record(id, d(2024, 1, 14), 100, Some(100), Some(100), 100),
            // current week: Mon 2024-01-15 .. Sat 2024-01-20
            record(id, d(2024, 1, 16), 15, Some(2), Some(1), 0),
            record(id, d(2024, 1, 20), 5, Some(0), Some(1), 1),
        ];
        let cmp = week_over_week(&records, d(2024, 1, 17));

        assert_eq!(cmp.current_window.start_date(), d(2024, 1, 15));
        assert_eq!(cmp.previous_window.start_date(), d(2024, 1, 8));
        assert_eq!(cmp.current.totals.inquiries, 20);
        assert_eq!(cmp.previous.totals.inquiries, 10);

        assert_eq!(cmp.changes.inquiries.trend, Trend::Up);
        assert_eq!(cmp.changes.inquiries.percentage, 100);
        assert_eq!(cmp.changes.showings.trend, Trend::Down);
        assert_eq!(cmp.changes.showings.percentage, 50);
        assert_eq!(cmp.changes.deals.percentage, 100);
        assert_eq!(cmp.changes.listings.trend, Trend::Down);
        assert_eq!(cmp.changes.crm_properties.trend, Trend::Neutral);
    }

    #[test]
    fn weekly_series_is_oldest_first() {
        let id = Uuid::new_v4();
        let records = vec![
            record(id, d(2024, 1, 2), 4, None, None, 0),
            record(id, d(2024, 1, 16), 6, None, None, 0),
        ];
        let series = weekly_series(&records, d(2024, 1, 17), 3);

        assert_eq!(series.len(), 3);
        assert_eq!(series[0].window.start_date(), d(2024, 1, 1));
        assert_eq!(series[0].week_number, 1);
        assert_eq!(series[0].start_formatted, "1 de enero de 2024");
        assert_eq!(series[1].metrics.count, 0);
        assert_eq!(series[2].week_number, 3);
        assert_eq!(series[2].metrics.totals.inquiries, 6);

        let trends = series_trends(&series);
        assert_eq!(trends.inquiries.percentage, 50);
        assert_eq!(trends.inquiries.trend, Trend::Up);
        assert_eq!(trends.deals.trend, Trend::Neutral);
    }
}
