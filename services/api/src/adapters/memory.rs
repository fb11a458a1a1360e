//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port. Used by the service
//! tests and for running the API without PostgreSQL.

use agent_metrics_core::aggregate::{group_by_agent, AgentSums};
use agent_metrics_core::domain::{
    Agent, AgentCredentials, NewAgent, Page, PerformanceRecord, RecordChanges, RecordFilter,
    RecordInput, RecordPage,
};
use agent_metrics_core::ports::{DatabaseService, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Store {
    agents: Vec<AgentCredentials>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    // Insertion order doubles as creation order.
    records: Vec<PerformanceRecord>,
}

impl Store {
    fn matching(&self, filter: &RecordFilter) -> Vec<PerformanceRecord> {
        let mut found: Vec<PerformanceRecord> = self
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        found
    }
}

#[derive(Default)]
pub struct InMemoryDb {
    store: RwLock<Store>,
}

impl InMemoryDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_agent(&self, agent: NewAgent) -> PortResult<Agent> {
        let email = agent.email.trim().to_lowercase();
        let mut store = self.store.write().await;
        if store.agents.iter().any(|c| c.agent.email == email) {
            return Err(PortError::Conflict(format!(
                "An account for {} already exists",
                agent.email
            )));
        }
        let created = Agent {
            id: Uuid::new_v4(),
            email,
            name: agent.name,
            role: agent.role,
            created_at: Utc::now(),
        };
        store.agents.push(AgentCredentials {
            agent: created.clone(),
            password_hash: agent.password_hash,
        });
        Ok(created)
    }

    async fn get_agent_by_id(&self, agent_id: Uuid) -> PortResult<Agent> {
        self.store
            .read()
            .await
            .agents
            .iter()
            .find(|c| c.agent.id == agent_id)
            .map(|c| c.agent.clone())
            .ok_or_else(|| PortError::NotFound(format!("Agent {} not found", agent_id)))
    }

    async fn get_agents_by_ids(&self, agent_ids: &[Uuid]) -> PortResult<Vec<Agent>> {
        let store = self.store.read().await;
        Ok(store
            .agents
            .iter()
            .filter(|c| agent_ids.contains(&c.agent.id))
            .map(|c| c.agent.clone())
            .collect())
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<AgentCredentials> {
        let wanted = email.trim().to_lowercase();
        self.store
            .read()
            .await
            .agents
            .iter()
            .find(|c| c.agent.email == wanted)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("No account for {}", email)))
    }

    async fn create_auth_session(
        &self,
        token: &str,
        agent_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.store
            .write()
            .await
            .sessions
            .insert(token.to_string(), (agent_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, token: &str) -> PortResult<Uuid> {
        let mut store = self.store.write().await;
        let (agent_id, expires_at) = *store.sessions.get(token).ok_or(PortError::Unauthorized)?;
        if expires_at <= Utc::now() {
            store.sessions.remove(token);
            return Err(PortError::Unauthorized);
        }
        Ok(agent_id)
    }

    async fn delete_auth_session(&self, token: &str) -> PortResult<()> {
        self.store.write().await.sessions.remove(token);
        Ok(())
    }

    async fn create_record(&self, agent_id: Uuid, input: RecordInput) -> PortResult<PerformanceRecord> {
        let input = input.normalized();
        let now = Utc::now();
        let record = PerformanceRecord {
            id: Uuid::new_v4(),
            agent_id,
            date: input.date,
            inquiries_received: input.inquiries_received,
            showings_completed: input.showings_completed,
            deals_closed: input.deals_closed,
            listings_acquired: input.listings_acquired,
            follow_up_done: input.follow_up_done,
            crm_usage_level: input.crm_usage_level,
            crm_properties_listed: input.crm_properties_listed,
            crm_links: input.crm_links,
            crm_difficulty_reported: input.crm_difficulty_reported,
            crm_difficulty_detail: input.crm_difficulty_detail,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };
        self.store.write().await.records.push(record.clone());
        Ok(record)
    }

    async fn get_record(&self, record_id: Uuid) -> PortResult<PerformanceRecord> {
        self.store
            .read()
            .await
            .records
            .iter()
            .find(|r| r.id == record_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Record {} not found", record_id)))
    }

    async fn update_record(
        &self,
        record_id: Uuid,
        changes: RecordChanges,
    ) -> PortResult<PerformanceRecord> {
        let mut store = self.store.write().await;
        let record = store
            .records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| PortError::NotFound(format!("Record {} not found", record_id)))?;
        changes.apply_to(record);
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete_record(&self, record_id: Uuid) -> PortResult<()> {
        let mut store = self.store.write().await;
        let before = store.records.len();
        store.records.retain(|r| r.id != record_id);
        if store.records.len() == before {
            return Err(PortError::NotFound(format!("Record {} not found", record_id)));
        }
        Ok(())
    }

    async fn list_records(&self, filter: RecordFilter, page: Page) -> PortResult<RecordPage> {
        let matching = self.store.read().await.matching(&filter);
        let total = matching.len() as u64;
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let records = matching
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .collect();
        Ok(RecordPage { records, total })
    }

    async fn query_records(&self, filter: RecordFilter) -> PortResult<Vec<PerformanceRecord>> {
        Ok(self.store.read().await.matching(&filter))
    }

    async fn sum_by_agent(&self, filter: RecordFilter) -> PortResult<Vec<AgentSums>> {
        let store = self.store.read().await;
        let in_creation_order: Vec<PerformanceRecord> = store
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Ok(group_by_agent(&in_creation_order))
    }

    async fn ping(&self) -> PortResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_metrics_core::domain::Role;
    use chrono::{Duration, NaiveDate};

    fn input(date: NaiveDate, inquiries: u32) -> RecordInput {
        RecordInput {
            date,
            inquiries_received: inquiries,
            showings_completed: Some(1),
            deals_closed: None,
            listings_acquired: 0,
            follow_up_done: true,
            crm_usage_level: None,
            crm_properties_listed: None,
            crm_links: None,
            crm_difficulty_reported: None,
            crm_difficulty_detail: None,
            notes: Some("  ".to_string()),
        }
    }

    fn new_agent(email: &str) -> NewAgent {
        NewAgent {
            email: email.to_string(),
            name: "Ana".to_string(),
            role: Role::Agent,
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn duplicate_emails_conflict_case_insensitively() {
        let db = InMemoryDb::new();
        db.create_agent(new_agent("ana@example.com")).await.unwrap();
        let err = db.create_agent(new_agent("ANA@example.com")).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));

        let creds = db.get_credentials_by_email("Ana@Example.com").await.unwrap();
        assert_eq!(creds.password_hash, "hash");
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected() {
        let db = InMemoryDb::new();
        let id = Uuid::new_v4();
        db.create_auth_session("live", id, Utc::now() + Duration::hours(1)).await.unwrap();
        db.create_auth_session("stale", id, Utc::now() - Duration::hours(1)).await.unwrap();

        assert_eq!(db.validate_auth_session("live").await.unwrap(), id);
        assert!(matches!(db.validate_auth_session("stale").await, Err(PortError::Unauthorized)));
        assert!(matches!(db.validate_auth_session("nope").await, Err(PortError::Unauthorized)));
    }

    #[tokio::test]
    async fn listing_pages_newest_first_with_total() {
        let db = InMemoryDb::new();
        let agent = Uuid::new_v4();
        for day in 1..=5 {
            let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
            db.create_record(agent, input(date, day)).await.unwrap();
        }

        let page = db
            .list_records(RecordFilter::default(), Page::normalized(Some(2), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].date, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
        assert_eq!(page.records[0].notes, None);

        let filter = RecordFilter {
            date_from: NaiveDate::from_ymd_opt(2024, 1, 2),
            date_to: NaiveDate::from_ymd_opt(2024, 1, 3),
            ..Default::default()
        };
        let sums = db.sum_by_agent(filter).await.unwrap();
        assert_eq!(sums.len(), 1);
        assert_eq!(sums[0].sums.inquiries, 5);
        assert_eq!(sums[0].sums.follow_ups, 2);
    }

    #[tokio::test]
    async fn updates_and_deletes_report_missing_records() {
        let db = InMemoryDb::new();
        let record = db
            .create_record(Uuid::new_v4(), input(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 3))
            .await
            .unwrap();

        let changes = RecordChanges {
            deals_closed: Some(Some(2)),
            ..Default::default()
        };
        let updated = db.update_record(record.id, changes.clone()).await.unwrap();
        assert_eq!(updated.deals_closed, Some(2));
        assert_eq!(updated.inquiries_received, 3);

        db.delete_record(record.id).await.unwrap();
        assert!(matches!(db.delete_record(record.id).await, Err(PortError::NotFound(_))));
        assert!(matches!(db.update_record(record.id, changes).await, Err(PortError::NotFound(_))));
    }
}
