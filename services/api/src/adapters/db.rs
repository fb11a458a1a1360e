//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Queries are checked at runtime (`query_as` + `bind`) so the crate builds without a
//! live database.

use agent_metrics_core::aggregate::{AgentSums, MetricSums};
use agent_metrics_core::domain::{
    Agent, AgentCredentials, NewAgent, Page, PerformanceRecord, RecordChanges, RecordFilter,
    RecordInput, RecordPage, Role,
};
use agent_metrics_core::ports::{DatabaseService, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => unexpected(e),
    }
}

// Counts are stored as INTEGER; anything larger cannot be persisted.
fn to_int(value: u32) -> PortResult<i32> {
    i32::try_from(value).map_err(|_| PortError::Unexpected(format!("value {} out of range", value)))
}

fn to_opt_int(value: Option<u32>) -> PortResult<Option<i32>> {
    value.map(to_int).transpose()
}

fn to_count(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn to_sum(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const AGENT_COLUMNS: &str = "id, email, name, role, created_at";

#[derive(FromRow)]
struct AgentRecord {
    id: Uuid,
    email: String,
    name: String,
    role: String,
    created_at: DateTime<Utc>,
}
impl AgentRecord {
    fn to_domain(self) -> PortResult<Agent> {
        let role = self.role.parse::<Role>().map_err(PortError::Unexpected)?;
        Ok(Agent {
            id: self.id,
            email: self.email,
            name: self.name,
            role,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    #[sqlx(flatten)]
    agent: AgentRecord,
    password_hash: String,
}

#[derive(FromRow)]
struct AuthSessionRecord {
    agent_id: Uuid,
    expires_at: DateTime<Utc>,
}

const RECORD_COLUMNS: &str = "id, agent_id, date, inquiries_received, showings_completed, \
     deals_closed, listings_acquired, follow_up_done, crm_usage_level, crm_properties_listed, \
     crm_links, crm_difficulty_reported, crm_difficulty_detail, notes, created_at, updated_at";

// Shared WHERE clause for every `RecordFilter` query; binds $1..$3.
const FILTER_CLAUSE: &str = "($1::uuid IS NULL OR agent_id = $1) \
     AND ($2::date IS NULL OR date >= $2) \
     AND ($3::date IS NULL OR date <= $3)";

#[derive(FromRow)]
struct PerformanceRow {
    id: Uuid,
    agent_id: Uuid,
    date: NaiveDate,
    inquiries_received: i32,
    showings_completed: Option<i32>,
    deals_closed: Option<i32>,
    listings_acquired: i32,
    follow_up_done: bool,
    crm_usage_level: Option<String>,
    crm_properties_listed: Option<i32>,
    crm_links: Option<String>,
    crm_difficulty_reported: Option<bool>,
    crm_difficulty_detail: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl PerformanceRow {
    fn to_domain(self) -> PerformanceRecord {
        PerformanceRecord {
            id: self.id,
            agent_id: self.agent_id,
            date: self.date,
            inquiries_received: to_count(self.inquiries_received),
            showings_completed: self.showings_completed.map(to_count),
            deals_closed: self.deals_closed.map(to_count),
            listings_acquired: to_count(self.listings_acquired),
            follow_up_done: self.follow_up_done,
            crm_usage_level: self.crm_usage_level,
            crm_properties_listed: self.crm_properties_listed.map(to_count),
            crm_links: self.crm_links,
            crm_difficulty_reported: self.crm_difficulty_reported,
            crm_difficulty_detail: self.crm_difficulty_detail,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct AgentSumsRow {
    agent_id: Uuid,
    records: i64,
    inquiries: i64,
    showings: i64,
    deals: i64,
    listings: i64,
    crm_properties: i64,
    follow_ups: i64,
    crm_difficulties: i64,
}
impl AgentSumsRow {
    fn to_domain(self) -> AgentSums {
        AgentSums {
            agent_id: self.agent_id,
            sums: MetricSums {
                records: to_sum(self.records),
                inquiries: to_sum(self.inquiries),
                showings: to_sum(self.showings),
                deals: to_sum(self.deals),
                listings: to_sum(self.listings),
                crm_properties: to_sum(self.crm_properties),
                follow_ups: to_sum(self.follow_ups),
                crm_difficulties: to_sum(self.crm_difficulties),
            },
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_agent(&self, agent: NewAgent) -> PortResult<Agent> {
        let sql = format!(
            "INSERT INTO agents (id, email, name, role, password_hash) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            AGENT_COLUMNS
        );
        let record = sqlx::query_as::<_, AgentRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(agent.email.trim().to_lowercase())
            .bind(&agent.name)
            .bind(agent.role.as_str())
            .bind(&agent.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db) = &e {
                    if db.is_unique_violation() {
                        return PortError::Conflict(format!(
                            "An account for {} already exists",
                            agent.email
                        ));
                    }
                }
                unexpected(e)
            })?;
        record.to_domain()
    }

    async fn get_agent_by_id(&self, agent_id: Uuid) -> PortResult<Agent> {
        let sql = format!("SELECT {} FROM agents WHERE id = $1", AGENT_COLUMNS);
        let record = sqlx::query_as::<_, AgentRecord>(&sql)
            .bind(agent_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or(e, format!("Agent {} not found", agent_id)))?;
        record.to_domain()
    }

    async fn get_agents_by_ids(&self, agent_ids: &[Uuid]) -> PortResult<Vec<Agent>> {
        if agent_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {} FROM agents WHERE id = ANY($1)", AGENT_COLUMNS);
        let records = sqlx::query_as::<_, AgentRecord>(&sql)
            .bind(agent_ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AgentCredentials> {
        let sql = format!(
            "SELECT {}, password_hash FROM agents WHERE email = $1",
            AGENT_COLUMNS
        );
        let record = sqlx::query_as::<_, CredentialsRecord>(&sql)
            .bind(email.trim().to_lowercase())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or(e, format!("No account for {}", email)))?;
        Ok(AgentCredentials {
            agent: record.agent.to_domain()?,
            password_hash: record.password_hash,
        })
    }

    async fn create_auth_session(
        &self,
        token: &str,
        agent_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, agent_id, expires_at) VALUES ($1, $2, $3)")
            .bind(token)
            .bind(agent_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, token: &str) -> PortResult<Uuid> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT agent_id, expires_at FROM auth_sessions WHERE id = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;

        if record.expires_at <= Utc::now() {
            self.delete_auth_session(token).await?;
            return Err(PortError::Unauthorized);
        }
        Ok(record.agent_id)
    }

    async fn delete_auth_session(&self, token: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn create_record(&self, agent_id: Uuid, input: RecordInput) -> PortResult<PerformanceRecord> {
        let input = input.normalized();
        let sql = format!(
            "INSERT INTO performance_records (id, agent_id, date, inquiries_received, \
             showings_completed, deals_closed, listings_acquired, follow_up_done, crm_usage_level, \
             crm_properties_listed, crm_links, crm_difficulty_reported, crm_difficulty_detail, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING {}",
            RECORD_COLUMNS
        );
        let row = sqlx::query_as::<_, PerformanceRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(agent_id)
            .bind(input.date)
            .bind(to_int(input.inquiries_received)?)
            .bind(to_opt_int(input.showings_completed)?)
            .bind(to_opt_int(input.deals_closed)?)
            .bind(to_int(input.listings_acquired)?)
            .bind(input.follow_up_done)
            .bind(input.crm_usage_level)
            .bind(to_opt_int(input.crm_properties_listed)?)
            .bind(input.crm_links)
            .bind(input.crm_difficulty_reported)
            .bind(input.crm_difficulty_detail)
            .bind(input.notes)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(row.to_domain())
    }

    async fn get_record(&self, record_id: Uuid) -> PortResult<PerformanceRecord> {
        let sql = format!("SELECT {} FROM performance_records WHERE id = $1", RECORD_COLUMNS);
        let row = sqlx::query_as::<_, PerformanceRow>(&sql)
            .bind(record_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or(e, format!("Record {} not found", record_id)))?;
        Ok(row.to_domain())
    }

    async fn update_record(
        &self,
        record_id: Uuid,
        changes: RecordChanges,
    ) -> PortResult<PerformanceRecord> {
        let mut record = self.get_record(record_id).await?;
        changes.apply_to(&mut record);

        let sql = format!(
            "UPDATE performance_records SET date = $2, inquiries_received = $3, \
             showings_completed = $4, deals_closed = $5, listings_acquired = $6, \
             follow_up_done = $7, crm_usage_level = $8, crm_properties_listed = $9, crm_links = $10, \
             crm_difficulty_reported = $11, crm_difficulty_detail = $12, notes = $13, \
             updated_at = NOW() WHERE id = $1 RETURNING {}",
            RECORD_COLUMNS
        );
        let row = sqlx::query_as::<_, PerformanceRow>(&sql)
            .bind(record_id)
            .bind(record.date)
            .bind(to_int(record.inquiries_received)?)
            .bind(to_opt_int(record.showings_completed)?)
            .bind(to_opt_int(record.deals_closed)?)
            .bind(to_int(record.listings_acquired)?)
            .bind(record.follow_up_done)
            .bind(record.crm_usage_level)
            .bind(to_opt_int(record.crm_properties_listed)?)
            .bind(record.crm_links)
            .bind(record.crm_difficulty_reported)
            .bind(record.crm_difficulty_detail)
            .bind(record.notes)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or(e, format!("Record {} not found", record_id)))?;
        Ok(row.to_domain())
    }

    async fn delete_record(&self, record_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM performance_records WHERE id = $1")
            .bind(record_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Record {} not found", record_id)));
        }
        Ok(())
    }

    async fn list_records(&self, filter: RecordFilter, page: Page) -> PortResult<RecordPage> {
        let count_sql = format!("SELECT COUNT(*) FROM performance_records WHERE {}", FILTER_CLAUSE);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.agent_id)
            .bind(filter.date_from)
            .bind(filter.date_to)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;

        let sql = format!(
            "SELECT {} FROM performance_records WHERE {} \
             ORDER BY date DESC, created_at DESC LIMIT $4 OFFSET $5",
            RECORD_COLUMNS, FILTER_CLAUSE
        );
        let rows = sqlx::query_as::<_, PerformanceRow>(&sql)
            .bind(filter.agent_id)
            .bind(filter.date_from)
            .bind(filter.date_to)
            .bind(i64::from(page.limit))
            .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;

        Ok(RecordPage {
            records: rows.into_iter().map(|r| r.to_domain()).collect(),
            total: to_sum(total),
        })
    }

    async fn query_records(&self, filter: RecordFilter) -> PortResult<Vec<PerformanceRecord>> {
        let sql = format!(
            "SELECT {} FROM performance_records WHERE {} ORDER BY date DESC, created_at DESC",
            RECORD_COLUMNS, FILTER_CLAUSE
        );
        let rows = sqlx::query_as::<_, PerformanceRow>(&sql)
            .bind(filter.agent_id)
            .bind(filter.date_from)
            .bind(filter.date_to)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(rows.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn sum_by_agent(&self, filter: RecordFilter) -> PortResult<Vec<AgentSums>> {
        let sql = format!(
            "SELECT agent_id, \
                COUNT(*)::BIGINT AS records, \
                COALESCE(SUM(inquiries_received), 0)::BIGINT AS inquiries, \
                COALESCE(SUM(showings_completed), 0)::BIGINT AS showings, \
                COALESCE(SUM(deals_closed), 0)::BIGINT AS deals, \
                COALESCE(SUM(listings_acquired), 0)::BIGINT AS listings, \
                COALESCE(SUM(crm_properties_listed), 0)::BIGINT AS crm_properties, \
                COUNT(*) FILTER (WHERE follow_up_done)::BIGINT AS follow_ups, \
                COUNT(*) FILTER (WHERE crm_difficulty_reported IS TRUE)::BIGINT AS crm_difficulties \
             FROM performance_records WHERE {} \
             GROUP BY agent_id ORDER BY MIN(created_at) ASC",
            FILTER_CLAUSE
        );
        let rows = sqlx::query_as::<_, AgentSumsRow>(&sql)
            .bind(filter.agent_id)
            .bind(filter.date_from)
            .bind(filter.date_to)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(rows.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn ping(&self) -> PortResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_outside_the_column_range_are_rejected() {
        assert_eq!(to_int(12).ok(), Some(12));
        assert!(to_int(u32::MAX).is_err());
        assert_eq!(to_opt_int(None).ok(), Some(None));
    }

    #[test]
    fn negative_database_values_read_as_zero() {
        assert_eq!(to_count(-3), 0);
        assert_eq!(to_sum(-1), 0);
        assert_eq!(to_sum(42), 42);
    }
}
