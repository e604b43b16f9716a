//! In-process [`Store`] used by service and HTTP tests. Mirrors the MySQL
//! store's ordering, uniqueness and cascade rules.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{RecordFilter, SequencePlan, Store};
use crate::error::{AppError, AppResult};
use crate::model::agent::{Agent, AgentWithOffice, NewAgent};
use crate::model::attendance::{
    AttendanceAction, AttendanceRecord, AttendanceRecordDetail, RecordChanges,
};
use crate::model::office::{NewOffice, Office, OfficeSummary};
use crate::model::role::Role;
use crate::model::user::{NewUser, User, UserCredentials};
use crate::service::scan::{CardCode, normalize_card};
use crate::service::schedule::DayWindow;
use crate::service::scope::OfficeScope;

struct RefreshToken {
    expires_at: DateTime<Utc>,
    revoked: bool,
}

#[derive(Default)]
struct State {
    next_id: u64,
    offices: BTreeMap<u64, Office>,
    users: BTreeMap<u64, UserCredentials>,
    agents: BTreeMap<u64, Agent>,
    records: BTreeMap<u64, AttendanceRecord>,
    tokens: HashMap<String, RefreshToken>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn with_office(&self, agent: &Agent) -> AppResult<AgentWithOffice> {
        let office = self
            .offices
            .get(&agent.office_id)
            .cloned()
            .ok_or_else(|| AppError::Internal(format!("agent {} has no office", agent.id)))?;
        Ok(AgentWithOffice {
            agent: agent.clone(),
            office,
        })
    }

    fn check_agent(&self, agent: &NewAgent, except: Option<u64>) -> AppResult<()> {
        if !self.offices.contains_key(&agent.office_id) {
            return Err(AppError::Conflict("foreign key constraint fails".into()));
        }
        if let Some(code) = &agent.rfid_code {
            // mirrors the unique key on the generated rfid_normalized column
            let key = normalize_card(code);
            let taken = self
                .agents
                .values()
                .filter(|a| Some(a.id) != except)
                .filter_map(|a| a.rfid_code.as_deref())
                .any(|existing| normalize_card(existing) == key);
            if taken {
                return Err(AppError::Conflict(format!("Duplicate entry '{code}'")));
            }
        }
        Ok(())
    }

    fn latest_in(&self, agent_id: u64, window: DayWindow) -> Option<&AttendanceRecord> {
        self.records
            .values()
            .filter(|r| r.agent_id == agent_id && window.contains(r.timestamp))
            .max_by_key(|r| (r.timestamp, r.id))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Every stored record, oldest id first.
    pub fn all_records(&self) -> Vec<AttendanceRecord> {
        self.state().records.values().cloned().collect()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_offices(&self, scope: &OfficeScope) -> AppResult<Vec<OfficeSummary>> {
        let state = self.state();
        let mut offices: Vec<OfficeSummary> = state
            .offices
            .values()
            .filter(|o| scope.permits(o.id))
            .map(|o| OfficeSummary {
                office: o.clone(),
                agent_count: state.agents.values().filter(|a| a.office_id == o.id).count() as i64,
            })
            .collect();
        offices.sort_by(|a, b| a.office.name.cmp(&b.office.name));
        Ok(offices)
    }

    async fn get_office(&self, id: u64) -> AppResult<Option<Office>> {
        Ok(self.state().offices.get(&id).cloned())
    }

    async fn create_office(&self, office: NewOffice) -> AppResult<Office> {
        let mut state = self.state();
        let id = state.next_id();
        let office = Office {
            id,
            name: office.name,
            location: office.location,
            check_in_methods: office.check_in_methods,
            expected_check_in: office.expected_check_in,
            expected_check_out: office.expected_check_out,
        };
        state.offices.insert(id, office.clone());
        Ok(office)
    }

    async fn update_office(&self, id: u64, office: NewOffice) -> AppResult<Option<Office>> {
        let mut state = self.state();
        Ok(state.offices.get_mut(&id).map(|existing| {
            existing.name = office.name;
            existing.location = office.location;
            existing.check_in_methods = office.check_in_methods;
            existing.expected_check_in = office.expected_check_in;
            existing.expected_check_out = office.expected_check_out;
            existing.clone()
        }))
    }

    async fn delete_office(&self, id: u64) -> AppResult<bool> {
        let mut state = self.state();
        if state.offices.remove(&id).is_none() {
            return Ok(false);
        }
        let agent_ids: Vec<u64> = state
            .agents
            .values()
            .filter(|a| a.office_id == id)
            .map(|a| a.id)
            .collect();
        state.records.retain(|_, r| !agent_ids.contains(&r.agent_id));
        state.agents.retain(|_, a| a.office_id != id);
        for creds in state.users.values_mut() {
            creds.user.office_ids.retain(|o| *o != id);
        }
        Ok(true)
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(self.state().users.len() as i64)
    }

    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        Ok(self
            .state()
            .users
            .values()
            .find(|c| c.user.email == email)
            .cloned())
    }

    async fn get_user(&self, id: u64) -> AppResult<Option<User>> {
        Ok(self.state().users.get(&id).map(|c| c.user.clone()))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.state().users.values().map(|c| c.user.clone()).collect())
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut state = self.state();
        if state.users.values().any(|c| c.user.email == user.email) {
            return Err(AppError::Conflict(format!("Duplicate entry '{}'", user.email)));
        }
        let id = state.next_id();
        let mut office_ids = user.office_ids;
        office_ids.sort_unstable();
        office_ids.dedup();
        let created = User {
            id,
            email: user.email,
            name: user.name,
            role: user.role,
            office_ids,
        };
        state.users.insert(
            id,
            UserCredentials {
                user: created.clone(),
                password_hash: user.password_hash,
            },
        );
        Ok(created)
    }

    async fn update_user_role(
        &self,
        id: u64,
        role: Role,
        office_ids: Option<Vec<u64>>,
    ) -> AppResult<Option<User>> {
        let mut state = self.state();
        Ok(state.users.get_mut(&id).map(|creds| {
            creds.user.role = role;
            if let Some(mut ids) = office_ids {
                ids.sort_unstable();
                ids.dedup();
                creds.user.office_ids = ids;
            }
            creds.user.clone()
        }))
    }

    async fn delete_user(&self, id: u64) -> AppResult<bool> {
        Ok(self.state().users.remove(&id).is_some())
    }

    async fn list_agents(&self, scope: &OfficeScope) -> AppResult<Vec<AgentWithOffice>> {
        let state = self.state();
        let mut agents = state
            .agents
            .values()
            .filter(|a| scope.permits(a.office_id))
            .map(|a| state.with_office(a))
            .collect::<AppResult<Vec<_>>>()?;
        agents.sort_by(|a, b| a.agent.name.cmp(&b.agent.name));
        Ok(agents)
    }

    async fn get_agent(&self, id: u64) -> AppResult<Option<AgentWithOffice>> {
        let state = self.state();
        state.agents.get(&id).map(|a| state.with_office(a)).transpose()
    }

    async fn find_agent_by_card(&self, card: &CardCode) -> AppResult<Option<AgentWithOffice>> {
        let state = self.state();
        let best = state
            .agents
            .values()
            .find(|a| a.rfid_code.as_deref().is_some_and(|code| card.matches(code)));
        best.map(|a| state.with_office(a)).transpose()
    }

    async fn create_agent(&self, agent: NewAgent) -> AppResult<Agent> {
        let mut state = self.state();
        state.check_agent(&agent, None)?;
        let id = state.next_id();
        let created = Agent {
            id,
            name: agent.name,
            email: agent.email,
            rfid_code: agent.rfid_code,
            status: agent.status,
            office_id: agent.office_id,
        };
        state.agents.insert(id, created.clone());
        Ok(created)
    }

    async fn update_agent(&self, id: u64, agent: NewAgent) -> AppResult<Option<Agent>> {
        let mut state = self.state();
        if !state.agents.contains_key(&id) {
            return Ok(None);
        }
        state.check_agent(&agent, Some(id))?;
        let updated = Agent {
            id,
            name: agent.name,
            email: agent.email,
            rfid_code: agent.rfid_code,
            status: agent.status,
            office_id: agent.office_id,
        };
        state.agents.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_agent(&self, id: u64) -> AppResult<bool> {
        let mut state = self.state();
        if state.agents.remove(&id).is_none() {
            return Ok(false);
        }
        state.records.retain(|_, r| r.agent_id != id);
        Ok(true)
    }

    async fn record_in_sequence(
        &self,
        agent_id: u64,
        window: DayWindow,
        plan: &SequencePlan<'_>,
    ) -> AppResult<AttendanceRecord> {
        let mut state = self.state();
        if !state.agents.contains_key(&agent_id) {
            return Err(AppError::not_found("Agent not found"));
        }
        let new = plan(state.latest_in(agent_id, window))?;
        let id = state.next_id();
        let record = new.into_record(id);
        state.records.insert(id, record.clone());
        Ok(record)
    }

    async fn get_record(&self, id: u64) -> AppResult<Option<(AttendanceRecord, u64)>> {
        let state = self.state();
        Ok(state.records.get(&id).and_then(|r| {
            let office_id = state.agents.get(&r.agent_id)?.office_id;
            Some((r.clone(), office_id))
        }))
    }

    async fn update_record(
        &self,
        id: u64,
        changes: RecordChanges,
    ) -> AppResult<Option<AttendanceRecord>> {
        let mut state = self.state();
        Ok(state.records.get_mut(&id).map(|r| {
            r.timestamp = changes.timestamp;
            r.status = changes.status;
            r.working_hours = changes.working_hours;
            r.clone()
        }))
    }

    async fn delete_record(&self, id: u64) -> AppResult<bool> {
        Ok(self.state().records.remove(&id).is_some())
    }

    async fn list_records(&self, filter: &RecordFilter) -> AppResult<Vec<AttendanceRecordDetail>> {
        let state = self.state();
        let mut details = Vec::new();
        for record in state.records.values() {
            let Some(agent) = state.agents.get(&record.agent_id) else {
                continue;
            };
            let Some(office) = state.offices.get(&agent.office_id) else {
                continue;
            };
            let keep = filter.window.contains(record.timestamp)
                && filter.scope.permits(office.id)
                && filter.status.is_none_or(|s| s == record.status)
                && filter.agent_id.is_none_or(|id| id == record.agent_id);
            if keep {
                details.push(AttendanceRecordDetail {
                    record: record.clone(),
                    agent_name: agent.name.clone(),
                    office_id: office.id,
                    office_name: office.name.clone(),
                });
            }
        }
        details.sort_by(|a, b| {
            (b.record.timestamp, b.record.id).cmp(&(a.record.timestamp, a.record.id))
        });
        Ok(details)
    }

    async fn latest_actions(
        &self,
        agent_ids: &[u64],
        window: DayWindow,
    ) -> AppResult<HashMap<u64, AttendanceAction>> {
        let state = self.state();
        Ok(agent_ids
            .iter()
            .filter_map(|id| state.latest_in(*id, window).map(|r| (*id, r.action)))
            .collect())
    }

    async fn store_refresh_token(
        &self,
        _user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.state().tokens.insert(
            jti.to_string(),
            RefreshToken {
                expires_at,
                revoked: false,
            },
        );
        Ok(())
    }

    async fn consume_refresh_token(&self, jti: &str) -> AppResult<bool> {
        let mut state = self.state();
        match state.tokens.get_mut(jti) {
            Some(token) if !token.revoked && token.expires_at > Utc::now() => {
                token.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_refresh_token(&self, jti: &str) -> AppResult<()> {
        if let Some(token) = self.state().tokens.get_mut(jti) {
            token.revoked = true;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::agent::AgentStatus;
    use crate::model::office::CheckInMethod;
    use crate::service::schedule::Calendar;
    use chrono_tz::Tz;

    pub fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    /// Ids created by [`kosti_fixture`].
    pub struct Fixture {
        pub kosti: u64,
        pub khartoum: u64,
        pub amira: u64,
        pub omar: u64,
        pub sara: u64,
    }

    pub fn office(name: &str, check_in: &str, check_out: &str) -> NewOffice {
        NewOffice {
            name: name.to_string(),
            location: name.to_string(),
            check_in_methods: vec![CheckInMethod::Manual, CheckInMethod::Rfid],
            expected_check_in: check_in.to_string(),
            expected_check_out: check_out.to_string(),
        }
    }

    pub fn agent(name: &str, card: Option<&str>, office_id: u64) -> NewAgent {
        NewAgent {
            name: name.to_string(),
            email: None,
            rfid_code: card.map(str::to_string),
            status: AgentStatus::Active,
            office_id,
        }
    }

    /// Kosti (09:00-17:00) with Amira (card "0042") and Omar (card "77"),
    /// Khartoum (08:00-16:00) with Sara (card "ABCD1"). Calendar is UTC.
    pub async fn kosti_fixture() -> (MemoryStore, Calendar, Fixture) {
        let store = MemoryStore::new();
        let kosti = store.create_office(office("Kosti", "09:00", "17:00")).await.unwrap().id;
        let khartoum = store
            .create_office(office("Khartoum", "08:00", "16:00"))
            .await
            .unwrap()
            .id;
        let amira = store
            .create_agent(agent("Amira Hassan", Some("0042"), kosti))
            .await
            .unwrap()
            .id;
        let omar = store.create_agent(agent("Omar Ali", Some("77"), kosti)).await.unwrap().id;
        let sara = store
            .create_agent(agent("Sara Idris", Some("ABCD1"), khartoum))
            .await
            .unwrap()
            .id;

        let fixture = Fixture {
            kosti,
            khartoum,
            amira,
            omar,
            sara,
        };
        (store, Calendar::new(Tz::UTC), fixture)
    }

    #[actix_web::test]
    async fn office_delete_cascades() {
        let (store, _, fx) = kosti_fixture().await;

        assert!(store.delete_office(fx.kosti).await.unwrap());
        assert!(store.get_agent(fx.amira).await.unwrap().is_none());
        assert!(store.get_agent(fx.sara).await.unwrap().is_some());
        assert!(!store.delete_office(fx.kosti).await.unwrap());
    }

    #[actix_web::test]
    async fn duplicate_cards_conflict() {
        let (store, _, fx) = kosti_fixture().await;
        let err = store
            .create_agent(agent("Copy", Some("0042"), fx.khartoum))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn zero_padded_cards_share_one_holder() {
        let (store, _, fx) = kosti_fixture().await;
        for code in ["42", "000042", "0042 "] {
            let err = store
                .create_agent(agent("Copy", Some(code), fx.kosti))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)), "{code}");
        }

        for code in ["42", "00042", "0042"] {
            let found = store.find_agent_by_card(&CardCode::new(code).unwrap()).await.unwrap();
            assert_eq!(found.map(|a| a.agent.id), Some(fx.amira), "{code}");
        }
    }
}
