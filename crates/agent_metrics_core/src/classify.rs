//! crates/agent_metrics_core/src/classify.rs
//!
//! Agent classification policy. The core only asks one question of it: does this
//! identifier belong to a no-showings agent?

use crate::domain::AgentClass;
use std::collections::HashSet;

pub trait Classifier: Send + Sync {
    fn is_no_showings(&self, identifier: &str) -> bool;

    fn classify(&self, identifier: &str) -> AgentClass {
        if self.is_no_showings(identifier) {
            AgentClass::NoShowings
        } else {
            AgentClass::Standard
        }
    }
}

/// A configured allow-list of no-showings identifiers (case-insensitive).
///
/// Anything not on the list is a standard agent, including identifiers nobody
/// recognises.
#[derive(Debug, Clone, Default)]
pub struct AllowListClassifier {
    identifiers: HashSet<String>,
}

impl AllowListClassifier {
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            identifiers: identifiers
                .into_iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Parses a comma-separated list, e.g. from an environment variable.
    pub fn from_csv(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

impl Classifier for AllowListClassifier {
    fn is_no_showings(&self, identifier: &str) -> bool {
        self.identifiers.contains(&identifier.trim().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_and_ignores_blanks() {
        let classifier = AllowListClassifier::from_csv(" Agent3@Example.com, ,agent4@example.com,");
        assert_eq!(classifier.len(), 2);
        assert!(classifier.is_no_showings("agent3@example.com"));
        assert!(classifier.is_no_showings("AGENT4@example.com "));
    }

    #[test]
    fn unknown_identifiers_are_standard() {
        let classifier = AllowListClassifier::from_csv("agent3@example.com");
        assert_eq!(classifier.classify("someone@example.com"), AgentClass::Standard);
        assert_eq!(classifier.classify(""), AgentClass::Standard);
        assert_eq!(classifier.classify("agent3@example.com"), AgentClass::NoShowings);
    }
}
