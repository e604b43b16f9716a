//! Data access. Handlers and services only ever see [`Store`]; the MySQL
//! implementation backs the server and the in-memory one backs tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppResult;
use crate::model::agent::{Agent, AgentWithOffice, NewAgent};
use crate::model::attendance::{
    AttendanceAction, AttendanceRecord, AttendanceRecordDetail, AttendanceStatus,
    NewAttendanceRecord, RecordChanges,
};
use crate::model::office::{NewOffice, Office, OfficeSummary};
use crate::model::role::Role;
use crate::model::user::{NewUser, User, UserCredentials};
use crate::service::scan::CardCode;
use crate::service::schedule::DayWindow;
use crate::service::scope::OfficeScope;

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub use mysql::MySqlStore;

/// Decides the record to insert given the agent's latest record of the day.
/// Returning an error aborts the write.
pub type SequencePlan<'a> =
    dyn Fn(Option<&AttendanceRecord>) -> AppResult<NewAttendanceRecord> + Send + Sync + 'a;

#[derive(Debug, Clone)]
pub struct RecordFilter {
    pub window: DayWindow,
    pub scope: OfficeScope,
    pub status: Option<AttendanceStatus>,
    pub agent_id: Option<u64>,
}

#[async_trait]
pub trait Store: Send + Sync {
    // offices
    async fn list_offices(&self, scope: &OfficeScope) -> AppResult<Vec<OfficeSummary>>;
    async fn get_office(&self, id: u64) -> AppResult<Option<Office>>;
    async fn create_office(&self, office: NewOffice) -> AppResult<Office>;
    async fn update_office(&self, id: u64, office: NewOffice) -> AppResult<Option<Office>>;
    /// Removes the office, its agents and their records, and user assignments.
    async fn delete_office(&self, id: u64) -> AppResult<bool>;

    // users
    async fn count_users(&self) -> AppResult<i64>;
    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>>;
    async fn get_user(&self, id: u64) -> AppResult<Option<User>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    /// `office_ids` replaces the assignment when present.
    async fn update_user_role(
        &self,
        id: u64,
        role: Role,
        office_ids: Option<Vec<u64>>,
    ) -> AppResult<Option<User>>;
    async fn delete_user(&self, id: u64) -> AppResult<bool>;

    // agents
    async fn list_agents(&self, scope: &OfficeScope) -> AppResult<Vec<AgentWithOffice>>;
    async fn get_agent(&self, id: u64) -> AppResult<Option<AgentWithOffice>>;
    async fn find_agent_by_card(&self, card: &CardCode) -> AppResult<Option<AgentWithOffice>>;
    async fn create_agent(&self, agent: NewAgent) -> AppResult<Agent>;
    async fn update_agent(&self, id: u64, agent: NewAgent) -> AppResult<Option<Agent>>;
    async fn delete_agent(&self, id: u64) -> AppResult<bool>;

    // attendance
    /// Reads the agent's latest record inside `window`, lets `plan` decide the
    /// new record and inserts it, all while holding a per-agent lock so two
    /// writers cannot both act on the same latest record.
    async fn record_in_sequence(
        &self,
        agent_id: u64,
        window: DayWindow,
        plan: &SequencePlan<'_>,
    ) -> AppResult<AttendanceRecord>;
    /// The record and the office id of its agent.
    async fn get_record(&self, id: u64) -> AppResult<Option<(AttendanceRecord, u64)>>;
    async fn update_record(
        &self,
        id: u64,
        changes: RecordChanges,
    ) -> AppResult<Option<AttendanceRecord>>;
    async fn delete_record(&self, id: u64) -> AppResult<bool>;
    /// Matching records, most recent first.
    async fn list_records(&self, filter: &RecordFilter) -> AppResult<Vec<AttendanceRecordDetail>>;
    /// Action of each agent's most recent record inside `window`.
    async fn latest_actions(
        &self,
        agent_ids: &[u64],
        window: DayWindow,
    ) -> AppResult<HashMap<u64, AttendanceAction>>;

    // refresh tokens
    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;
    /// Revokes the token and reports whether it was still usable.
    async fn consume_refresh_token(&self, jti: &str) -> AppResult<bool>;
    async fn revoke_refresh_token(&self, jti: &str) -> AppResult<()>;
}

impl NewAttendanceRecord {
    pub fn into_record(self, id: u64) -> AttendanceRecord {
        AttendanceRecord {
            id,
            agent_id: self.agent_id,
            action: self.action,
            timestamp: self.timestamp,
            source: self.source,
            recorded_by: self.recorded_by,
            expected_in: self.expected_in,
            expected_out: self.expected_out,
            status: self.status,
            working_hours: self.working_hours,
            last_check_in: self.last_check_in,
        }
    }
}
