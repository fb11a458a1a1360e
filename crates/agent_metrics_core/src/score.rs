//! crates/agent_metrics_core/src/score.rs
//!
//! Composite agent scores. Two named variants exist and callers pick one per report:
//! [`score`] branches on the agent's class, [`score_with_listings`] applies one formula
//! to everybody for a unified leaderboard.

use crate::aggregate::MetricSums;
use crate::classify::Classifier;
use crate::domain::AgentClass;

const DEAL_WEIGHT: u64 = 3;
const SHOWING_WEIGHT: u64 = 2;
const INQUIRY_WEIGHT: u64 = 1;
const LISTING_WEIGHT: u64 = 2;

/// Class-aware score.
///
/// No-showings agents: `inquiries + listings * 2`; showings and deals are ignored even
/// when present. Standard agents: `deals * 3 + showings * 2 + inquiries`.
pub fn score(class: AgentClass, sums: &MetricSums) -> u64 {
    match class {
        AgentClass::NoShowings => {
            sums.inquiries * INQUIRY_WEIGHT + sums.listings * LISTING_WEIGHT
        }
        AgentClass::Standard => {
            sums.deals * DEAL_WEIGHT + sums.showings * SHOWING_WEIGHT + sums.inquiries * INQUIRY_WEIGHT
        }
    }
}

/// Class-aware score for an identifier, resolved through `classifier`.
pub fn agent_score(classifier: &dyn Classifier, identifier: &str, sums: &MetricSums) -> u64 {
    score(classifier.classify(identifier), sums)
}

/// The standard formula plus `listings * 2`, for every agent regardless of class.
pub fn score_with_listings(sums: &MetricSums) -> u64 {
    score(AgentClass::Standard, sums) + sums.listings * LISTING_WEIGHT
}
