//! crates/agent_metrics_core/src/domain.rs
//!
//! Defines the core data structures for agents and their performance records.
//! These structs are independent of any database; they derive `serde` traits so the
//! HTTP and report layers can hand them out as-is.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Agents
//=========================================================================================

/// The two roles a user account can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(Role::Agent),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// A user of the system. Agents produce performance records; admins review them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct AgentCredentials {
    pub agent: Agent,
    pub password_hash: String,
}

/// Data needed to create a new account.
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
}

/// The public face of an agent as it appears next to aggregated numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl AgentSummary {
    /// Placeholder used when records reference an agent the directory doesn't know.
    pub fn unknown(id: Uuid) -> Self {
        Self {
            id,
            name: "Unknown agent".to_string(),
            email: String::new(),
        }
    }
}

impl From<&Agent> for AgentSummary {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            name: agent.name.clone(),
            email: agent.email.clone(),
        }
    }
}

/// How an agent's workflow is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentClass {
    /// Full funnel: inquiries, showings, deals.
    Standard,
    /// No showings funnel: evaluated on inquiries and listings only.
    NoShowings,
}

//=========================================================================================
// Performance Records
//=========================================================================================

/// One agent's activity for one calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub date: NaiveDate,
    pub inquiries_received: u32,
    /// `None` is meaningful for no-showings agents.
    pub showings_completed: Option<u32>,
    pub deals_closed: Option<u32>,
    pub listings_acquired: u32,
    pub follow_up_done: bool,
    pub crm_usage_level: Option<String>,
    pub crm_properties_listed: Option<u32>,
    pub crm_links: Option<String>,
    pub crm_difficulty_reported: Option<bool>,
    pub crm_difficulty_detail: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The writable fields of a record, as submitted by its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecordInput {
    pub date: NaiveDate,
    pub inquiries_received: u32,
    /// Omitted by agents without a showings funnel.
    pub showings_completed: Option<u32>,
    pub deals_closed: Option<u32>,
    #[serde(default)]
    pub listings_acquired: u32,
    #[serde(default)]
    pub follow_up_done: bool,
    pub crm_usage_level: Option<String>,
    pub crm_properties_listed: Option<u32>,
    pub crm_links: Option<String>,
    pub crm_difficulty_reported: Option<bool>,
    pub crm_difficulty_detail: Option<String>,
    pub notes: Option<String>,
}

impl RecordInput {
    /// The numeric fields, for range checks at the edge.
    pub fn counts(&self) -> [Option<u32>; 5] {
        [
            Some(self.inquiries_received),
            self.showings_completed,
            self.deals_closed,
            Some(self.listings_acquired),
            self.crm_properties_listed,
        ]
    }

    /// Trims optional text fields and turns blank ones into `None`.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.crm_usage_level,
            &mut self.crm_links,
            &mut self.crm_difficulty_detail,
            &mut self.notes,
        ] {
            *field = field.as_deref().and_then(non_empty);
        }
        self
    }
}

/// A partial update. `None` leaves the stored value untouched.
///
/// `showings_completed` and `deals_closed` distinguish an absent key (`None`) from an
/// explicit JSON `null` (`Some(None)`), which clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecordChanges {
    pub date: Option<NaiveDate>,
    pub inquiries_received: Option<u32>,
    #[serde(default, deserialize_with = "nullable")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<u32>))]
    pub showings_completed: Option<Option<u32>>,
    #[serde(default, deserialize_with = "nullable")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<u32>))]
    pub deals_closed: Option<Option<u32>>,
    pub listings_acquired: Option<u32>,
    pub follow_up_done: Option<bool>,
    /// An empty string clears the stored text.
    pub crm_usage_level: Option<String>,
    pub crm_properties_listed: Option<u32>,
    pub crm_links: Option<String>,
    pub crm_difficulty_reported: Option<bool>,
    pub crm_difficulty_detail: Option<String>,
    pub notes: Option<String>,
}

// Present keys land in `Some`, so `null` becomes `Some(None)`; missing keys fall back to
// the field default of `None`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl RecordChanges {
    /// The numeric values being written.
    pub fn counts(&self) -> [Option<u32>; 5] {
        [
            self.inquiries_received,
            self.showings_completed.flatten(),
            self.deals_closed.flatten(),
            self.listings_acquired,
            self.crm_properties_listed,
        ]
    }

    /// Applies the present fields onto an existing record.
    pub fn apply_to(&self, record: &mut PerformanceRecord) {
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(v) = self.inquiries_received {
            record.inquiries_received = v;
        }
        if let Some(v) = self.showings_completed {
            record.showings_completed = v;
        }
        if let Some(v) = self.deals_closed {
            record.deals_closed = v;
        }
        if let Some(v) = self.listings_acquired {
            record.listings_acquired = v;
        }
        if let Some(v) = self.follow_up_done {
            record.follow_up_done = v;
        }
        if let Some(v) = &self.crm_usage_level {
            record.crm_usage_level = non_empty(v);
        }
        if let Some(v) = self.crm_properties_listed {
            record.crm_properties_listed = Some(v);
        }
        if let Some(v) = &self.crm_links {
            record.crm_links = non_empty(v);
        }
        if let Some(v) = self.crm_difficulty_reported {
            record.crm_difficulty_reported = Some(v);
        }
        if let Some(v) = &self.crm_difficulty_detail {
            record.crm_difficulty_detail = non_empty(v);
        }
        if let Some(v) = &self.notes {
            record.notes = non_empty(v);
        }
    }
}

// Empty strings clear optional text fields.
fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

//=========================================================================================
// Query Shapes
//=========================================================================================

/// Storage-side filter. Both date bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub agent_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl RecordFilter {
    pub fn matches(&self, record: &PerformanceRecord) -> bool {
        self.agent_id.map_or(true, |id| record.agent_id == id)
            && self.date_from.map_or(true, |from| record.date >= from)
            && self.date_to.map_or(true, |to| record.date <= to)
    }
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Clamps raw query values into a usable page.
    pub fn normalized(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit))
    }
}

/// One page of records plus the unpaged total.
#[derive(Debug, Clone, Serialize)]
pub struct RecordPage {
    pub records: Vec<PerformanceRecord>,
    pub total: u64,
}
