use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, MySqlPool};

use super::{RecordFilter, SequencePlan, Store};
use crate::error::{AppError, AppResult};
use crate::model::agent::{Agent, AgentWithOffice, NewAgent};
use crate::model::attendance::{
    AttendanceAction, AttendanceRecord, AttendanceRecordDetail, NewAttendanceRecord,
    RecordChanges,
};
use crate::model::office::{NewOffice, Office, OfficeSummary, join_methods, split_methods};
use crate::model::role::Role;
use crate::model::user::{NewUser, User, UserCredentials};
use crate::service::scan::CardCode;
use crate::service::schedule::DayWindow;
use crate::service::scope::OfficeScope;

#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

// -------------------- Rows --------------------

#[derive(FromRow)]
struct OfficeRow {
    id: u64,
    name: String,
    location: String,
    check_in_methods: String,
    expected_check_in: String,
    expected_check_out: String,
}

impl From<OfficeRow> for Office {
    fn from(row: OfficeRow) -> Self {
        Office {
            id: row.id,
            name: row.name,
            location: row.location,
            check_in_methods: split_methods(&row.check_in_methods),
            expected_check_in: row.expected_check_in,
            expected_check_out: row.expected_check_out,
        }
    }
}

#[derive(FromRow)]
struct OfficeSummaryRow {
    #[sqlx(flatten)]
    office: OfficeRow,
    agent_count: i64,
}

#[derive(FromRow)]
struct AgentRow {
    id: u64,
    name: String,
    email: Option<String>,
    rfid_code: Option<String>,
    status: String,
    office_id: u64,
}

impl TryFrom<AgentRow> for Agent {
    type Error = AppError;

    fn try_from(row: AgentRow) -> AppResult<Self> {
        Ok(Agent {
            id: row.id,
            name: row.name,
            email: row.email,
            rfid_code: row.rfid_code,
            status: parse_column("agents.status", &row.status)?,
            office_id: row.office_id,
        })
    }
}

#[derive(FromRow)]
struct AgentOfficeRow {
    #[sqlx(flatten)]
    agent: AgentRow,
    office_name: String,
    office_location: String,
    office_check_in_methods: String,
    office_expected_check_in: String,
    office_expected_check_out: String,
}

impl TryFrom<AgentOfficeRow> for AgentWithOffice {
    type Error = AppError;

    fn try_from(row: AgentOfficeRow) -> AppResult<Self> {
        let office = Office {
            id: row.agent.office_id,
            name: row.office_name,
            location: row.office_location,
            check_in_methods: split_methods(&row.office_check_in_methods),
            expected_check_in: row.office_expected_check_in,
            expected_check_out: row.office_expected_check_out,
        };
        Ok(AgentWithOffice {
            agent: row.agent.try_into()?,
            office,
        })
    }
}

#[derive(FromRow)]
struct RecordRow {
    id: u64,
    agent_id: u64,
    action: String,
    timestamp: DateTime<Utc>,
    source: String,
    recorded_by: Option<String>,
    expected_in: String,
    expected_out: String,
    status: String,
    working_hours: Option<f64>,
    last_check_in: Option<DateTime<Utc>>,
}

impl TryFrom<RecordRow> for AttendanceRecord {
    type Error = AppError;

    fn try_from(row: RecordRow) -> AppResult<Self> {
        Ok(AttendanceRecord {
            id: row.id,
            agent_id: row.agent_id,
            action: parse_column("attendance_records.action", &row.action)?,
            timestamp: row.timestamp,
            source: parse_column("attendance_records.source", &row.source)?,
            recorded_by: row.recorded_by,
            expected_in: row.expected_in,
            expected_out: row.expected_out,
            status: parse_column("attendance_records.status", &row.status)?,
            working_hours: row.working_hours,
            last_check_in: row.last_check_in,
        })
    }
}

#[derive(FromRow)]
struct RecordDetailRow {
    #[sqlx(flatten)]
    record: RecordRow,
    agent_name: String,
    office_id: u64,
    office_name: String,
}

#[derive(FromRow)]
struct UserRow {
    id: u64,
    email: String,
    password: String,
    name: String,
    role: String,
}

fn parse_column<T: FromStr>(column: &str, raw: &str) -> AppResult<T> {
    raw.parse()
        .map_err(|_| AppError::Internal(format!("unexpected {column} value: {raw}")))
}

// -------------------- SQL helpers --------------------

const OFFICE_COLUMNS: &str =
    "o.id, o.name, o.location, o.check_in_methods, o.expected_check_in, o.expected_check_out";

const AGENT_SELECT: &str = r#"
    SELECT a.id, a.name, a.email, a.rfid_code, a.status, a.office_id,
           o.name AS office_name,
           o.location AS office_location,
           o.check_in_methods AS office_check_in_methods,
           o.expected_check_in AS office_expected_check_in,
           o.expected_check_out AS office_expected_check_out
    FROM agents a
    JOIN offices o ON o.id = a.office_id
"#;

const RECORD_COLUMNS: &str = "r.id, r.agent_id, r.action, r.`timestamp`, r.source, r.recorded_by, \
     r.expected_in, r.expected_out, r.status, r.working_hours, r.last_check_in";

// Helper enum for typed SQLx binding
enum FilterValue {
    U64(u64),
    Str(String),
    Time(DateTime<Utc>),
}

/// `column IN (?, ...)` for a restricted scope, `None` when unrestricted.
fn scope_condition(
    scope: &OfficeScope,
    column: &str,
    args: &mut Vec<FilterValue>,
) -> Option<String> {
    match scope {
        OfficeScope::All => None,
        OfficeScope::Offices(ids) if ids.is_empty() => Some("1 = 0".to_string()),
        OfficeScope::Offices(ids) => {
            args.extend(ids.iter().map(|id| FilterValue::U64(*id)));
            Some(format!("{column} IN ({})", placeholders(ids.len())))
        }
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

macro_rules! bind_all {
    ($query:expr, $args:expr) => {{
        let mut q = $query;
        for arg in $args {
            q = match arg {
                FilterValue::U64(v) => q.bind(v),
                FilterValue::Str(s) => q.bind(s),
                FilterValue::Time(t) => q.bind(t),
            };
        }
        q
    }};
}

fn log_db<E: Display>(operation: &'static str) -> impl Fn(E) -> E {
    move |e| {
        tracing::error!(error = %e, operation, "Database operation failed");
        e
    }
}

impl MySqlStore {
    async fn office_ids_of(&self, user_id: u64) -> AppResult<Vec<u64>> {
        let ids = sqlx::query_scalar::<_, u64>(
            "SELECT office_id FROM user_offices WHERE user_id = ? ORDER BY office_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(log_db("load user offices"))?;
        Ok(ids)
    }

    async fn user_from_row(&self, row: UserRow) -> AppResult<UserCredentials> {
        let office_ids = self.office_ids_of(row.id).await?;
        Ok(UserCredentials {
            user: User {
                id: row.id,
                email: row.email,
                name: row.name,
                role: parse_column("users.role", &row.role)?,
                office_ids,
            },
            password_hash: row.password,
        })
    }

    async fn find_agent_row(&self, id: u64) -> AppResult<Option<Agent>> {
        sqlx::query_as::<_, AgentRow>(
            "SELECT id, name, email, rfid_code, status, office_id FROM agents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(log_db("fetch agent"))?
        .map(Agent::try_from)
        .transpose()
    }

    async fn find_record(&self, id: u64) -> AppResult<Option<AttendanceRecord>> {
        sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records r WHERE r.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(log_db("fetch attendance record"))?
        .map(AttendanceRecord::try_from)
        .transpose()
    }
}

#[async_trait]
impl Store for MySqlStore {
    // -------------------- Offices --------------------

    async fn list_offices(&self, scope: &OfficeScope) -> AppResult<Vec<OfficeSummary>> {
        let mut args = Vec::new();
        let conditions: Vec<String> =
            scope_condition(scope, "o.id", &mut args).into_iter().collect();

        let sql = format!(
            r#"
            SELECT {OFFICE_COLUMNS},
                   (SELECT COUNT(*) FROM agents a WHERE a.office_id = o.id) AS agent_count
            FROM offices o
            {}
            ORDER BY o.name
            "#,
            where_clause(&conditions)
        );

        let rows = bind_all!(sqlx::query_as::<_, OfficeSummaryRow>(&sql), args)
            .fetch_all(&self.pool)
            .await
            .map_err(log_db("list offices"))?;

        Ok(rows
            .into_iter()
            .map(|row| OfficeSummary {
                office: row.office.into(),
                agent_count: row.agent_count,
            })
            .collect())
    }

    async fn get_office(&self, id: u64) -> AppResult<Option<Office>> {
        let row = sqlx::query_as::<_, OfficeRow>(&format!(
            "SELECT {OFFICE_COLUMNS} FROM offices o WHERE o.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(log_db("fetch office"))?;
        Ok(row.map(Office::from))
    }

    async fn create_office(&self, office: NewOffice) -> AppResult<Office> {
        let result = sqlx::query(
            r#"
            INSERT INTO offices
                (name, location, check_in_methods, expected_check_in, expected_check_out)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&office.name)
        .bind(&office.location)
        .bind(join_methods(&office.check_in_methods))
        .bind(&office.expected_check_in)
        .bind(&office.expected_check_out)
        .execute(&self.pool)
        .await
        .map_err(log_db("create office"))?;

        Ok(Office {
            id: result.last_insert_id(),
            name: office.name,
            location: office.location,
            check_in_methods: office.check_in_methods,
            expected_check_in: office.expected_check_in,
            expected_check_out: office.expected_check_out,
        })
    }

    async fn update_office(&self, id: u64, office: NewOffice) -> AppResult<Option<Office>> {
        if self.get_office(id).await?.is_none() {
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE offices
            SET name = ?, location = ?, check_in_methods = ?,
                expected_check_in = ?, expected_check_out = ?
            WHERE id = ?
            "#,
        )
        .bind(&office.name)
        .bind(&office.location)
        .bind(join_methods(&office.check_in_methods))
        .bind(&office.expected_check_in)
        .bind(&office.expected_check_out)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(log_db("update office"))?;

        self.get_office(id).await
    }

    async fn delete_office(&self, id: u64) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_offices WHERE office_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            DELETE r FROM attendance_records r
            JOIN agents a ON a.id = r.agent_id
            WHERE a.office_id = ?
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM agents WHERE office_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM offices WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(log_db("delete office"))?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    // -------------------- Users --------------------

    async fn count_users(&self) -> AppResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(log_db("count users"))?;
        Ok(total)
    }

    async fn find_credentials(&self, email: &str) -> AppResult<Option<UserCredentials>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password, name, role FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(log_db("fetch user by email"))?;

        match row {
            Some(row) => Ok(Some(self.user_from_row(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_user(&self, id: u64) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password, name, role FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(log_db("fetch user"))?;

        match row {
            Some(row) => Ok(Some(self.user_from_row(row).await?.user)),
            None => Ok(None),
        }
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, email, password, name, role FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(log_db("list users"))?;

        let assignments = sqlx::query_as::<_, (u64, u64)>(
            "SELECT user_id, office_id FROM user_offices ORDER BY office_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(log_db("list user offices"))?;

        let mut offices: HashMap<u64, Vec<u64>> = HashMap::new();
        for (user_id, office_id) in assignments {
            offices.entry(user_id).or_default().push(office_id);
        }

        rows.into_iter()
            .map(|row| -> AppResult<User> {
                Ok(User {
                    id: row.id,
                    role: parse_column("users.role", &row.role)?,
                    office_ids: offices.remove(&row.id).unwrap_or_default(),
                    email: row.email,
                    name: row.name,
                })
            })
            .collect()
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query("INSERT INTO users (email, password, name, role) VALUES (?, ?, ?, ?)")
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(user.role.as_ref())
            .execute(&mut *tx)
            .await?
            .last_insert_id();

        for office_id in &user.office_ids {
            sqlx::query("INSERT INTO user_offices (user_id, office_id) VALUES (?, ?)")
                .bind(id)
                .bind(office_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(User {
            id,
            email: user.email,
            name: user.name,
            role: user.role,
            office_ids: user.office_ids,
        })
    }

    async fn update_user_role(
        &self,
        id: u64,
        role: Role,
        office_ids: Option<Vec<u64>>,
    ) -> AppResult<Option<User>> {
        if self.get_user(id).await?.is_none() {
            return Ok(None);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_ref())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if let Some(office_ids) = office_ids {
            sqlx::query("DELETE FROM user_offices WHERE user_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            for office_id in office_ids {
                sqlx::query("INSERT INTO user_offices (user_id, office_id) VALUES (?, ?)")
                    .bind(id)
                    .bind(office_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        self.get_user(id).await
    }

    async fn delete_user(&self, id: u64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(log_db("delete user"))?;
        Ok(result.rows_affected() > 0)
    }

    // -------------------- Agents --------------------

    async fn list_agents(&self, scope: &OfficeScope) -> AppResult<Vec<AgentWithOffice>> {
        let mut args = Vec::new();
        let conditions: Vec<String> =
            scope_condition(scope, "a.office_id", &mut args).into_iter().collect();

        let sql = format!("{AGENT_SELECT} {} ORDER BY a.name ASC", where_clause(&conditions));

        bind_all!(sqlx::query_as::<_, AgentOfficeRow>(&sql), args)
            .fetch_all(&self.pool)
            .await
            .map_err(log_db("list agents"))?
            .into_iter()
            .map(AgentWithOffice::try_from)
            .collect()
    }

    async fn get_agent(&self, id: u64) -> AppResult<Option<AgentWithOffice>> {
        sqlx::query_as::<_, AgentOfficeRow>(&format!("{AGENT_SELECT} WHERE a.id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(log_db("fetch agent"))?
            .map(AgentWithOffice::try_from)
            .transpose()
    }

    async fn find_agent_by_card(&self, card: &CardCode) -> AppResult<Option<AgentWithOffice>> {
        // rfid_normalized is unique, so at most one agent holds the card
        let sql = format!(
            r#"
            {AGENT_SELECT}
            WHERE a.rfid_normalized = ?
            "#
        );

        sqlx::query_as::<_, AgentOfficeRow>(&sql)
            .bind(card.normalized())
            .fetch_optional(&self.pool)
            .await
            .map_err(log_db("find agent by card"))?
            .map(AgentWithOffice::try_from)
            .transpose()
    }

    async fn create_agent(&self, agent: NewAgent) -> AppResult<Agent> {
        let result = sqlx::query(
            r#"
            INSERT INTO agents (name, email, rfid_code, status, office_id)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&agent.name)
        .bind(&agent.email)
        .bind(&agent.rfid_code)
        .bind(agent.status.as_ref())
        .bind(agent.office_id)
        .execute(&self.pool)
        .await?;

        Ok(Agent {
            id: result.last_insert_id(),
            name: agent.name,
            email: agent.email,
            rfid_code: agent.rfid_code,
            status: agent.status,
            office_id: agent.office_id,
        })
    }

    async fn update_agent(&self, id: u64, agent: NewAgent) -> AppResult<Option<Agent>> {
        if self.find_agent_row(id).await?.is_none() {
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE agents
            SET name = ?, email = ?, rfid_code = ?, status = ?, office_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&agent.name)
        .bind(&agent.email)
        .bind(&agent.rfid_code)
        .bind(agent.status.as_ref())
        .bind(agent.office_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.find_agent_row(id).await
    }

    async fn delete_agent(&self, id: u64) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM attendance_records WHERE agent_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(log_db("delete agent"))?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    // -------------------- Attendance --------------------

    async fn record_in_sequence(
        &self,
        agent_id: u64,
        window: DayWindow,
        plan: &SequencePlan<'_>,
    ) -> AppResult<AttendanceRecord> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the agent serialises concurrent scans and manual entries.
        let locked = sqlx::query_scalar::<_, u64>("SELECT id FROM agents WHERE id = ? FOR UPDATE")
            .bind(agent_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(log_db("lock agent"))?;
        if locked.is_none() {
            return Err(AppError::not_found("Agent not found"));
        }

        let last = sqlx::query_as::<_, RecordRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM attendance_records r
            WHERE r.agent_id = ? AND r.`timestamp` >= ? AND r.`timestamp` <= ?
            ORDER BY r.`timestamp` DESC, r.id DESC
            LIMIT 1
            "#
        ))
        .bind(agent_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_optional(&mut *tx)
        .await
        .map_err(log_db("fetch latest record"))?
        .map(AttendanceRecord::try_from)
        .transpose()?;

        let new: NewAttendanceRecord = plan(last.as_ref())?;

        let id = sqlx::query(
            r#"
            INSERT INTO attendance_records
                (agent_id, action, `timestamp`, source, recorded_by, expected_in, expected_out,
                 status, working_hours, last_check_in)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.agent_id)
        .bind(new.action.as_ref())
        .bind(new.timestamp)
        .bind(new.source.as_ref())
        .bind(&new.recorded_by)
        .bind(&new.expected_in)
        .bind(&new.expected_out)
        .bind(new.status.as_ref())
        .bind(new.working_hours)
        .bind(new.last_check_in)
        .execute(&mut *tx)
        .await
        .map_err(log_db("insert attendance record"))?
        .last_insert_id();

        tx.commit().await?;
        Ok(new.into_record(id))
    }

    async fn get_record(&self, id: u64) -> AppResult<Option<(AttendanceRecord, u64)>> {
        let row = sqlx::query_as::<_, RecordDetailRow>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}, a.name AS agent_name, a.office_id, o.name AS office_name
            FROM attendance_records r
            JOIN agents a ON a.id = r.agent_id
            JOIN offices o ON o.id = a.office_id
            WHERE r.id = ?
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(log_db("fetch attendance record"))?;

        match row {
            Some(row) => Ok(Some((row.record.try_into()?, row.office_id))),
            None => Ok(None),
        }
    }

    async fn update_record(
        &self,
        id: u64,
        changes: RecordChanges,
    ) -> AppResult<Option<AttendanceRecord>> {
        if self.find_record(id).await?.is_none() {
            return Ok(None);
        }

        sqlx::query(
            r#"
            UPDATE attendance_records
            SET `timestamp` = ?, status = ?, working_hours = ?
            WHERE id = ?
            "#,
        )
        .bind(changes.timestamp)
        .bind(changes.status.as_ref())
        .bind(changes.working_hours)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(log_db("update attendance record"))?;

        self.find_record(id).await
    }

    async fn delete_record(&self, id: u64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM attendance_records WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(log_db("delete attendance record"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_records(&self, filter: &RecordFilter) -> AppResult<Vec<AttendanceRecordDetail>> {
        let mut args = vec![
            FilterValue::Time(filter.window.start),
            FilterValue::Time(filter.window.end),
        ];
        let mut conditions = vec!["r.`timestamp` >= ? AND r.`timestamp` <= ?".to_string()];

        if let Some(scope) = scope_condition(&filter.scope, "a.office_id", &mut args) {
            conditions.push(scope);
        }
        if let Some(status) = filter.status {
            conditions.push("r.status = ?".to_string());
            args.push(FilterValue::Str(status.to_string()));
        }
        if let Some(agent_id) = filter.agent_id {
            conditions.push("r.agent_id = ?".to_string());
            args.push(FilterValue::U64(agent_id));
        }

        let sql = format!(
            r#"
            SELECT {RECORD_COLUMNS}, a.name AS agent_name, a.office_id, o.name AS office_name
            FROM attendance_records r
            JOIN agents a ON a.id = r.agent_id
            JOIN offices o ON o.id = a.office_id
            {}
            ORDER BY r.`timestamp` DESC, r.id DESC
            "#,
            where_clause(&conditions)
        );
        tracing::debug!(sql = %sql, "Listing attendance records");

        bind_all!(sqlx::query_as::<_, RecordDetailRow>(&sql), args)
            .fetch_all(&self.pool)
            .await
            .map_err(log_db("list attendance records"))?
            .into_iter()
            .map(|row| -> AppResult<AttendanceRecordDetail> {
                Ok(AttendanceRecordDetail {
                    record: row.record.try_into()?,
                    agent_name: row.agent_name,
                    office_id: row.office_id,
                    office_name: row.office_name,
                })
            })
            .collect()
    }

    async fn latest_actions(
        &self,
        agent_ids: &[u64],
        window: DayWindow,
    ) -> AppResult<HashMap<u64, AttendanceAction>> {
        if agent_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!(
            r#"
            SELECT r.agent_id, r.action
            FROM attendance_records r
            WHERE r.agent_id IN ({}) AND r.`timestamp` >= ? AND r.`timestamp` <= ?
            ORDER BY r.`timestamp` DESC, r.id DESC
            "#,
            placeholders(agent_ids.len())
        );

        let mut query = sqlx::query_as::<_, (u64, String)>(&sql);
        for id in agent_ids {
            query = query.bind(id);
        }
        let rows = query
            .bind(window.start)
            .bind(window.end)
            .fetch_all(&self.pool)
            .await
            .map_err(log_db("latest attendance actions"))?;

        let mut latest = HashMap::new();
        for (agent_id, action) in rows {
            if !latest.contains_key(&agent_id) {
                latest.insert(agent_id, parse_column("attendance_records.action", &action)?);
            }
        }
        Ok(latest)
    }

    // -------------------- Refresh tokens --------------------

    async fn store_refresh_token(
        &self,
        user_id: u64,
        jti: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query("INSERT INTO refresh_tokens (user_id, jti, expires_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(jti)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(log_db("store refresh token"))?;
        Ok(())
    }

    async fn consume_refresh_token(&self, jti: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = TRUE
            WHERE jti = ? AND revoked = FALSE AND expires_at > ?
            "#,
        )
        .bind(jti)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(log_db("consume refresh token"))?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_refresh_token(&self, jti: &str) -> AppResult<()> {
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
            .bind(jti)
            .execute(&self.pool)
            .await
            .map_err(log_db("revoke refresh token"))?;
        Ok(())
    }
}
