use agent_metrics_core::{
    aggregate_grouped, rank, week_over_week, Agent, AllowListClassifier, Dimension, Direction,
    GroupBy, PerformanceRecord, Role, Trend,
};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
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

fn record(
    agent_id: Uuid,
    date: NaiveDate,
    inquiries: u32,
    showings: Option<u32>,
    deals: Option<u32>,
    listings: u32,
) -> PerformanceRecord {
    let now = Utc::now();
    PerformanceRecord {
        id: Uuid::new_v4(),
        agent_id,
        date,
        inquiries_received: inquiries,
        showings_completed: showings,
        deals_closed: deals,
        listings_acquired: listings,
        follow_up_done: true,
        crm_usage_level: Some("frequent".to_string()),
        crm_properties_listed: None,
        crm_links: None,
        crm_difficulty_reported: None,
        crm_difficulty_detail: None,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

struct Scenario {
    a: Agent,
    b: Agent,
    classifier: AllowListClassifier,
    records: Vec<PerformanceRecord>,
}

fn scenario(b_listings: u32) -> Scenario {
    let a = agent("alex@example.com", "Alex");
    let b = agent("enrique@example.com", "Enrique");
    let classifier = AllowListClassifier::from_csv("enrique@example.com");
    // Both in the week of Monday 2024-01-15; nothing in the week before.
    let records = vec![
        record(a.id, d(2024, 1, 15), 12, Some(6), Some(1), 0),
        record(a.id, d(2024, 1, 17), 8, Some(4), Some(1), 0),
        record(b.id, d(2024, 1, 16), 25, None, None, b_listings),
    ];
    Scenario { a, b, classifier, records }
}

#[test]
fn scores_follow_each_agents_class() {
    let s = scenario(6);
    let result = aggregate_grouped(
        &s.records,
        GroupBy::Agent,
        &[s.a.clone(), s.b.clone()],
        &s.classifier,
    );

    let a = &result.agents[0];
    assert_eq!(a.agent.id, s.a.id);
    assert_eq!(a.metrics.totals.inquiries, 20);
    assert_eq!(a.metrics.totals.showings, 10);
    assert_eq!(a.metrics.totals.deals, 2);
    assert_eq!(a.score, 46);
    assert_eq!(a.score_with_listings, 46);

    let b = &result.agents[1];
    assert_eq!(b.metrics.totals.inquiries, 25);
    assert_eq!(b.metrics.totals.listings, 6);
    assert_eq!(b.score, 37);
    assert_eq!(b.score_with_listings, 37);

    let ranked = rank(&result.agents, Dimension::Score, Direction::Desc, None);
    assert_eq!(ranked[0].entry.agent.id, s.a.id);
    assert_eq!(ranked[1].entry.agent.id, s.b.id);
}

#[test]
fn heavier_listing_weight_puts_no_showings_agent_first() {
    let s = scenario(15);
    let result = aggregate_grouped(
        &s.records,
        GroupBy::Agent,
        &[s.a.clone(), s.b.clone()],
        &s.classifier,
    );

    let ranked = rank(&result.agents, Dimension::ScoreWithListings, Direction::Desc, None);
    assert_eq!(ranked[0].entry.agent.id, s.b.id);
    assert_eq!(ranked[0].value, 55.0);
    assert_eq!(ranked[1].value, 46.0);
}

#[test]
fn growth_from_an_empty_week_is_full_upward_trend() {
    let s = scenario(6);
    let cmp = week_over_week(&s.records, d(2024, 1, 18));

    assert_eq!(cmp.previous.count, 0);
    assert_eq!(cmp.current.count, 3);
    for change in [
        cmp.changes.records,
        cmp.changes.inquiries,
        cmp.changes.showings,
        cmp.changes.deals,
        cmp.changes.listings,
    ] {
        assert_eq!(change.trend, Trend::Up);
        assert_eq!(change.percentage, 100);
    }
    // No CRM properties were reported in either week.
    assert_eq!(cmp.changes.crm_properties.trend, Trend::Neutral);
}
