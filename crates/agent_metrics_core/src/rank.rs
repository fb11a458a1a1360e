//! crates/agent_metrics_core/src/rank.rs
//!
//! Leaderboards over per-agent aggregates.
//!
//! Sorting is stable: agents with equal values keep the order they were given in.
//! Every leaderboard is the same operation parameterised by a [`Dimension`].

use crate::aggregate::AgentMetrics;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A numeric field of [`AgentMetrics`] that can be ranked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Records,
    Inquiries,
    Showings,
    Deals,
    Listings,
    CrmProperties,
    InquiriesToShowings,
    ShowingsToDeals,
    InquiriesToDeals,
    Score,
    ScoreWithListings,
}

impl Dimension {
    pub const ALL: [Dimension; 11] = [
        Dimension::Records,
        Dimension::Inquiries,
        Dimension::Showings,
        Dimension::Deals,
        Dimension::Listings,
        Dimension::CrmProperties,
        Dimension::InquiriesToShowings,
        Dimension::ShowingsToDeals,
        Dimension::InquiriesToDeals,
        Dimension::Score,
        Dimension::ScoreWithListings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Records => "records",
            Dimension::Inquiries => "inquiries",
            Dimension::Showings => "showings",
            Dimension::Deals => "deals",
            Dimension::Listings => "listings",
            Dimension::CrmProperties => "crm_properties",
            Dimension::InquiriesToShowings => "inquiries_to_showings",
            Dimension::ShowingsToDeals => "showings_to_deals",
            Dimension::InquiriesToDeals => "inquiries_to_deals",
            Dimension::Score => "score",
            Dimension::ScoreWithListings => "score_with_listings",
        }
    }

    /// Reads this dimension off an agent's aggregate.
    pub fn value_of(&self, entry: &AgentMetrics) -> f64 {
        let m = &entry.metrics;
        match self {
            Dimension::Records => m.count as f64,
            Dimension::Inquiries => m.totals.inquiries as f64,
            Dimension::Showings => m.totals.showings as f64,
            Dimension::Deals => m.totals.deals as f64,
            Dimension::Listings => m.totals.listings as f64,
            Dimension::CrmProperties => m.totals.crm_properties as f64,
            Dimension::InquiriesToShowings => m.conversion_rates.inquiries_to_showings,
            Dimension::ShowingsToDeals => m.conversion_rates.showings_to_deals,
            Dimension::InquiriesToDeals => m.conversion_rates.inquiries_to_deals,
            Dimension::Score => entry.score as f64,
            Dimension::ScoreWithListings => entry.score_with_listings as f64,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Dimension::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == wanted)
            .ok_or_else(|| format!("unknown ranking dimension '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(format!("unknown sort direction '{}'", other)),
        }
    }
}

/// One leaderboard row. `position` is 1-based and unique, ties included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedAgent {
    pub position: usize,
    pub value: f64,
    #[serde(flatten)]
    pub entry: AgentMetrics,
}

fn ordering(a: f64, b: f64, direction: Direction) -> Ordering {
    let ord = a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    match direction {
        Direction::Asc => ord,
        Direction::Desc => ord.reverse(),
    }
}

/// Ranks `entries` on `dimension`, truncated to `limit` when given.
pub fn rank(
    entries: &[AgentMetrics],
    dimension: Dimension,
    direction: Direction,
    limit: Option<usize>,
) -> Vec<RankedAgent> {
    let mut keyed: Vec<(f64, &AgentMetrics)> =
        entries.iter().map(|e| (dimension.value_of(e), e)).collect();
    // `sort_by` is stable; equal keys keep their input order.
    keyed.sort_by(|a, b| ordering(a.0, b.0, direction));

    keyed
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .enumerate()
        .map(|(i, (value, entry))| RankedAgent {
            position: i + 1,
            value,
            entry: entry.clone(),
        })
        .collect()
}

/// 1-based position of `agent_id` on the descending leaderboard for `dimension`.
pub fn rank_position(entries: &[AgentMetrics], agent_id: Uuid, dimension: Dimension) -> Option<usize> {
    rank(entries, dimension, Direction::Desc, None)
        .into_iter()
        .find(|r| r.entry.agent.id == agent_id)
        .map(|r| r.position)
}

/// The standard set of descending leaderboards shown on dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboards {
    pub listings: Vec<RankedAgent>,
    pub showings: Vec<RankedAgent>,
    pub deals: Vec<RankedAgent>,
    pub inquiries_to_showings: Vec<RankedAgent>,
    pub showings_to_deals: Vec<RankedAgent>,
    pub score: Vec<RankedAgent>,
}

pub fn leaderboards(entries: &[AgentMetrics], limit: Option<usize>) -> Leaderboards {
    let board = |dimension| rank(entries, dimension, Direction::Desc, limit);
    Leaderboards {
        listings: board(Dimension::Listings),
        showings: board(Dimension::Showings),
        deals: board(Dimension::Deals),
        inquiries_to_showings: board(Dimension::InquiriesToShowings),
        showings_to_deals: board(Dimension::ShowingsToDeals),
        score: board(Dimension::Score),
    }
}
