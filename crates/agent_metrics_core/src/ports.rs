//! crates/agent_metrics_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core expects from the outside world.
//! The core never calls these itself; the service layer fetches plain data through
//! them and hands it to the pure engine.

use crate::aggregate::{AgentMetrics, AgentSums, AggregatedMetrics};
use crate::domain::{
    Agent, AgentCredentials, NewAgent, Page, PerformanceRecord, RecordChanges, RecordFilter,
    RecordInput, RecordPage,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Agents ---
    async fn create_agent(&self, agent: NewAgent) -> PortResult<Agent>;

    async fn get_agent_by_id(&self, agent_id: Uuid) -> PortResult<Agent>;

    async fn get_agents_by_ids(&self, agent_ids: &[Uuid]) -> PortResult<Vec<Agent>>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AgentCredentials>;

    // --- Auth Sessions ---
    async fn create_auth_session(
        &self,
        token: &str,
        agent_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live session to its agent id. Expired sessions are `Unauthorized`.
    async fn validate_auth_session(&self, token: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, token: &str) -> PortResult<()>;

    // --- Performance Records ---
    async fn create_record(&self, agent_id: Uuid, input: RecordInput) -> PortResult<PerformanceRecord>;

    async fn get_record(&self, record_id: Uuid) -> PortResult<PerformanceRecord>;

    async fn update_record(
        &self,
        record_id: Uuid,
        changes: RecordChanges,
    ) -> PortResult<PerformanceRecord>;

    async fn delete_record(&self, record_id: Uuid) -> PortResult<()>;

    /// One page of matching records, newest date first.
    async fn list_records(&self, filter: RecordFilter, page: Page) -> PortResult<RecordPage>;

    /// Every matching record, newest date first.
    async fn query_records(&self, filter: RecordFilter) -> PortResult<Vec<PerformanceRecord>>;

    /// Per-agent sums over matching records, ordered by each agent's first record.
    async fn sum_by_agent(&self, filter: RecordFilter) -> PortResult<Vec<AgentSums>>;

    // --- Health ---
    async fn ping(&self) -> PortResult<()>;
}

#[async_trait]
pub trait InsightService: Send + Sync {
    /// Produces coaching recommendations for a team and its agents.
    async fn recommendations(
        &self,
        team: &AggregatedMetrics,
        agents: &[AgentMetrics],
    ) -> PortResult<String>;
}
