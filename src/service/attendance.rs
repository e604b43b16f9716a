use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::agent::AgentWithOffice;
use crate::model::attendance::{
    AttendanceAction, AttendanceRecord, AttendanceSource, AttendanceStatus, NewAttendanceRecord,
    PresenceState, RecordChanges,
};
use crate::model::office::OfficeSchedule;
use crate::service::scan::{CardCode, find_card_holder};
use crate::service::schedule::{
    Calendar, StatusPolicy, compute_status, compute_working_hours,
};
use crate::service::scope::{ensure_office_access, resolve_office_scope};
use crate::store::Store;

/// Everything about a new record that does not depend on the agent's
/// previous record.
pub(crate) struct EntryContext<'a> {
    pub agent_id: u64,
    pub at: DateTime<Utc>,
    pub local: DateTime<Tz>,
    pub schedule: &'a OfficeSchedule,
    pub policy: StatusPolicy,
    pub source: AttendanceSource,
    pub recorded_by: Option<String>,
}

impl EntryContext<'_> {
    /// Builds the record for `action`. A check-out closes the interval opened
    /// by `last`.
    pub fn draft(
        &self,
        action: AttendanceAction,
        last: Option<&AttendanceRecord>,
    ) -> NewAttendanceRecord {
        let last_check_in = match action {
            AttendanceAction::CheckOut => last.map(|r| r.timestamp),
            AttendanceAction::CheckIn => None,
        };

        NewAttendanceRecord {
            agent_id: self.agent_id,
            action,
            timestamp: self.at,
            source: self.source,
            recorded_by: self.recorded_by.clone(),
            expected_in: self.schedule.expected_check_in.clone(),
            expected_out: self.schedule.expected_check_out.clone(),
            status: compute_status(&self.local, action, self.schedule, self.policy),
            working_hours: compute_working_hours(last_check_in, Some(self.at)),
            last_check_in,
        }
    }
}

/// Rejects an action that does not follow the agent's last record of the day.
pub fn validate_transition(
    requested: AttendanceAction,
    last: Option<&AttendanceRecord>,
) -> AppResult<()> {
    let last_action = last.map(|r| r.action);
    match (requested, last_action) {
        (AttendanceAction::CheckIn, Some(AttendanceAction::CheckIn)) => Err(
            AppError::SequenceConflict("Agent is already checked in".to_string()),
        ),
        (AttendanceAction::CheckOut, None | Some(AttendanceAction::CheckOut)) => Err(
            AppError::SequenceConflict("Agent must check in first".to_string()),
        ),
        _ => Ok(()),
    }
}

/// Operator-submitted check-in or check-out.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub agent_id: Option<u64>,
    pub rfid_code: Option<String>,
    pub action: AttendanceAction,
    pub timestamp: Option<DateTime<Utc>>,
    pub recorded_by: Option<String>,
    pub is_manual_entry: bool,
}

impl CheckRequest {
    fn source(&self) -> AttendanceSource {
        if !self.is_manual_entry && self.rfid_code.is_some() {
            AttendanceSource::Rfid
        } else {
            AttendanceSource::Manual
        }
    }
}

async fn find_target(store: &dyn Store, request: &CheckRequest) -> AppResult<AgentWithOffice> {
    if let Some(id) = request.agent_id {
        return store
            .get_agent(id)
            .await?
            .ok_or_else(|| AppError::not_found("Agent not found"));
    }
    match request.rfid_code.as_deref() {
        Some(code) => find_card_holder(store, &CardCode::new(code)?).await,
        None => Err(AppError::validation("agentId or rfidCode is required")),
    }
}

pub async fn check_attendance(
    store: &dyn Store,
    calendar: &Calendar,
    principal: &AuthUser,
    request: CheckRequest,
) -> AppResult<AttendanceRecord> {
    let agent = find_target(store, &request).await?;
    ensure_office_access(principal, agent.agent.office_id)?;

    let at = request.timestamp.unwrap_or_else(Utc::now);
    let schedule = agent.office.schedule();
    let recorded_by = request
        .recorded_by
        .clone()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| principal.email.clone());
    let entry = EntryContext {
        agent_id: agent.agent.id,
        at,
        local: calendar.local(at),
        schedule: &schedule,
        policy: StatusPolicy::Strict,
        source: request.source(),
        recorded_by: Some(recorded_by),
    };
    let action = request.action;

    let record = store
        .record_in_sequence(agent.agent.id, calendar.day_window(at), &|last| {
            validate_transition(action, last)?;
            Ok(entry.draft(action, last))
        })
        .await
        .inspect_err(|e| {
            if let AppError::SequenceConflict(reason) = e {
                tracing::warn!(
                    agent_id = agent.agent.id,
                    %action,
                    reason = %reason,
                    "Rejected attendance entry"
                );
            }
        })?;

    tracing::info!(
        agent = %agent.agent.name,
        action = %record.action,
        status = %record.status,
        source = %record.source,
        recorded_by = ?record.recorded_by,
        "Attendance recorded"
    );
    Ok(record)
}

/// Correction to an existing record; absent fields keep their value.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub timestamp: Option<DateTime<Utc>>,
    pub status: Option<AttendanceStatus>,
}

async fn owned_record(
    store: &dyn Store,
    principal: &AuthUser,
    id: u64,
) -> AppResult<AttendanceRecord> {
    let (record, office_id) = store
        .get_record(id)
        .await?
        .ok_or_else(|| AppError::not_found("Attendance record not found"))?;
    ensure_office_access(principal, office_id)?;
    Ok(record)
}

pub async fn update_attendance_record(
    store: &dyn Store,
    principal: &AuthUser,
    id: u64,
    update: RecordUpdate,
) -> AppResult<AttendanceRecord> {
    let record = owned_record(store, principal, id).await?;

    let timestamp = update.timestamp.unwrap_or(record.timestamp);
    let working_hours = match (record.action, record.last_check_in) {
        (AttendanceAction::CheckOut, Some(check_in)) => {
            compute_working_hours(Some(check_in), Some(timestamp))
        }
        _ => record.working_hours,
    };
    let changes = RecordChanges {
        timestamp,
        status: update.status.unwrap_or(record.status),
        working_hours,
    };

    let updated = store
        .update_record(id, changes)
        .await?
        .ok_or_else(|| AppError::not_found("Attendance record not found"))?;
    tracing::info!(record_id = id, user = %principal.email, "Attendance record updated");
    Ok(updated)
}

pub async fn delete_attendance_record(
    store: &dyn Store,
    principal: &AuthUser,
    id: u64,
) -> AppResult<()> {
    owned_record(store, principal, id).await?;
    if !store.delete_record(id).await? {
        return Err(AppError::not_found("Attendance record not found"));
    }
    tracing::info!(record_id = id, user = %principal.email, "Attendance record deleted");
    Ok(())
}

/// Presence of every agent in the caller's scope for the local day of `now`.
/// Agents with no record that day are checked out.
pub async fn latest_status(
    store: &dyn Store,
    calendar: &Calendar,
    principal: &AuthUser,
    now: DateTime<Utc>,
) -> AppResult<BTreeMap<u64, PresenceState>> {
    let scope = resolve_office_scope(principal, None, None)?;
    if scope.is_empty() {
        return Ok(BTreeMap::new());
    }

    let agent_ids: Vec<u64> = store
        .list_agents(&scope)
        .await?
        .into_iter()
        .map(|a| a.agent.id)
        .collect();
    let latest = store
        .latest_actions(&agent_ids, calendar.day_window(now))
        .await?;

    Ok(agent_ids
        .into_iter()
        .map(|id| {
            let state = match latest.get(&id) {
                Some(AttendanceAction::CheckIn) => PresenceState::CheckedIn,
                _ => PresenceState::CheckedOut,
            };
            (id, state)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth::tests::principal;
    use crate::model::role::Role;
    use crate::store::memory::tests::{kosti_fixture, utc};

    fn manual(agent_id: u64, action: AttendanceAction, at: &str) -> CheckRequest {
        CheckRequest {
            agent_id: Some(agent_id),
            rfid_code: None,
            action,
            timestamp: Some(utc(at)),
            recorded_by: None,
            is_manual_entry: true,
        }
    }

    #[test]
    fn transitions() {
        use AttendanceAction::*;
        let rec = |action| AttendanceRecord {
            id: 1,
            agent_id: 1,
            action,
            timestamp: utc("2024-03-04T09:00:00Z"),
            source: AttendanceSource::Manual,
            recorded_by: None,
            expected_in: "09:00".into(),
            expected_out: "17:00".into(),
            status: AttendanceStatus::OnTime,
            working_hours: None,
            last_check_in: None,
        };

        assert!(validate_transition(CheckIn, None).is_ok());
        assert!(validate_transition(CheckIn, Some(&rec(CheckOut))).is_ok());
        assert!(validate_transition(CheckOut, Some(&rec(CheckIn))).is_ok());
        assert!(matches!(
            validate_transition(CheckIn, Some(&rec(CheckIn))),
            Err(AppError::SequenceConflict(m)) if m == "Agent is already checked in"
        ));
        assert!(matches!(
            validate_transition(CheckOut, None),
            Err(AppError::SequenceConflict(m)) if m == "Agent must check in first"
        ));
        assert!(validate_transition(CheckOut, Some(&rec(CheckOut))).is_err());
    }

    #[actix_web::test]
    async fn manual_entries_use_strict_policy() {
        let (store, calendar, fx) = kosti_fixture().await;
        let admin = principal(Role::Admin, &[]);

        let check_in = check_attendance(
            &store,
            &calendar,
            &admin,
            manual(fx.amira, AttendanceAction::CheckIn, "2024-03-04T09:04:00Z"),
        )
        .await
        .unwrap();
        assert_eq!(check_in.status, AttendanceStatus::Late);
        assert_eq!(check_in.source, AttendanceSource::Manual);
        assert_eq!(check_in.recorded_by.as_deref(), Some("admin@kosti.com"));

        let check_out = check_attendance(
            &store,
            &calendar,
            &admin,
            manual(fx.amira, AttendanceAction::CheckOut, "2024-03-04T16:50:00Z"),
        )
        .await
        .unwrap();
        assert_eq!(check_out.status, AttendanceStatus::Early);
        assert_eq!(check_out.working_hours, Some(7.77));
        assert_eq!(check_out.last_check_in, Some(check_in.timestamp));
    }

    #[actix_web::test]
    async fn out_of_order_entries_are_rejected() {
        let (store, calendar, fx) = kosti_fixture().await;
        let manager = principal(Role::Manager, &[]);

        let err = check_attendance(
            &store,
            &calendar,
            &manager,
            manual(fx.amira, AttendanceAction::CheckOut, "2024-03-04T08:00:00Z"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::SequenceConflict(_)));

        check_attendance(
            &store,
            &calendar,
            &manager,
            manual(fx.amira, AttendanceAction::CheckIn, "2024-03-04T08:00:00Z"),
        )
        .await
        .unwrap();
        let err = check_attendance(
            &store,
            &calendar,
            &manager,
            manual(fx.amira, AttendanceAction::CheckIn, "2024-03-04T08:30:00Z"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::SequenceConflict(_)));
        assert_eq!(store.all_records().len(), 1);
    }

    #[actix_web::test]
    async fn card_entries_resolve_by_code_and_tag_rfid() {
        let (store, calendar, fx) = kosti_fixture().await;
        let hr = principal(Role::Hr, &[fx.kosti]);

        let record = check_attendance(
            &store,
            &calendar,
            &hr,
            CheckRequest {
                agent_id: None,
                rfid_code: Some("42".into()),
                action: AttendanceAction::CheckIn,
                timestamp: Some(utc("2024-03-04T08:55:00Z")),
                recorded_by: Some("Front desk".into()),
                is_manual_entry: false,
            },
        )
        .await
        .unwrap();

        assert_eq!(record.agent_id, fx.amira);
        assert_eq!(record.source, AttendanceSource::Rfid);
        assert_eq!(record.status, AttendanceStatus::OnTime);
        assert_eq!(record.recorded_by.as_deref(), Some("Front desk"));
    }

    #[actix_web::test]
    async fn hr_cannot_touch_other_offices() {
        let (store, calendar, fx) = kosti_fixture().await;
        let hr = principal(Role::Hr, &[fx.kosti]);

        let err = check_attendance(
            &store,
            &calendar,
            &hr,
            manual(fx.sara, AttendanceAction::CheckIn, "2024-03-04T08:00:00Z"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(store.all_records().is_empty());
    }

    #[actix_web::test]
    async fn target_must_be_named_and_exist() {
        let (store, calendar, _) = kosti_fixture().await;
        let admin = principal(Role::Admin, &[]);
        let mut request = manual(0, AttendanceAction::CheckIn, "2024-03-04T08:00:00Z");

        request.agent_id = None;
        assert!(matches!(
            check_attendance(&store, &calendar, &admin, request.clone()).await,
            Err(AppError::Validation(_))
        ));

        request.agent_id = Some(999);
        assert!(matches!(
            check_attendance(&store, &calendar, &admin, request).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn simultaneous_check_ins_record_once() {
        let (store, calendar, fx) = kosti_fixture().await;
        let admin = principal(Role::Admin, &[]);

        let first = manual(fx.amira, AttendanceAction::CheckIn, "2024-03-04T09:00:00Z");
        let second = manual(fx.amira, AttendanceAction::CheckIn, "2024-03-04T09:00:00Z");
        let (a, b) = futures::join!(
            check_attendance(&store, &calendar, &admin, first),
            check_attendance(&store, &calendar, &admin, second)
        );

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(
            r,
            Err(AppError::SequenceConflict(m)) if m == "Agent is already checked in"
        )));
        assert_eq!(store.all_records().len(), 1);
    }

    #[actix_web::test]
    async fn correcting_a_check_out_recomputes_hours() {
        let (store, calendar, fx) = kosti_fixture().await;
        let admin = principal(Role::Admin, &[]);
        let check_in = manual(fx.amira, AttendanceAction::CheckIn, "2024-03-04T09:00:00Z");
        check_attendance(&store, &calendar, &admin, check_in).await.unwrap();
        let check_out = manual(fx.amira, AttendanceAction::CheckOut, "2024-03-04T16:00:00Z");
        let out = check_attendance(&store, &calendar, &admin, check_out).await.unwrap();
        assert_eq!(out.working_hours, Some(7.0));

        let updated = update_attendance_record(
            &store,
            &admin,
            out.id,
            RecordUpdate {
                timestamp: Some(utc("2024-03-04T17:30:00Z")),
                status: Some(AttendanceStatus::OnTime),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.working_hours, Some(8.5));
        assert_eq!(updated.status, AttendanceStatus::OnTime);

        // status-only change keeps the timestamp
        let updated = update_attendance_record(
            &store,
            &admin,
            out.id,
            RecordUpdate { timestamp: None, status: Some(AttendanceStatus::Early) },
        )
        .await
        .unwrap();
        assert_eq!(updated.timestamp, utc("2024-03-04T17:30:00Z"));
        assert_eq!(updated.working_hours, Some(8.5));
    }

    #[actix_web::test]
    async fn record_maintenance_respects_scope() {
        let (store, calendar, fx) = kosti_fixture().await;
        let admin = principal(Role::Admin, &[]);
        let check_in = manual(fx.sara, AttendanceAction::CheckIn, "2024-03-04T08:00:00Z");
        let record = check_attendance(&store, &calendar, &admin, check_in)
            .await
            .unwrap();

        let hr = principal(Role::Hr, &[fx.kosti]);
        assert!(matches!(
            delete_attendance_record(&store, &hr, record.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            update_attendance_record(&store, &hr, record.id, RecordUpdate::default()).await,
            Err(AppError::Forbidden(_))
        ));

        delete_attendance_record(&store, &admin, record.id).await.unwrap();
        assert!(matches!(
            delete_attendance_record(&store, &admin, record.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn latest_status_reflects_last_record_of_today() {
        let (store, calendar, fx) = kosti_fixture().await;
        let admin = principal(Role::Admin, &[]);
        for (agent, action, at) in [
            (fx.amira, AttendanceAction::CheckIn, "2024-03-04T08:00:00Z"),
            (fx.omar, AttendanceAction::CheckIn, "2024-03-04T08:10:00Z"),
            (fx.omar, AttendanceAction::CheckOut, "2024-03-04T12:00:00Z"),
            (fx.sara, AttendanceAction::CheckIn, "2024-03-03T08:00:00Z"),
        ] {
            check_attendance(&store, &calendar, &admin, manual(agent, action, at)).await.unwrap();
        }

        let now = utc("2024-03-04T13:00:00Z");
        let status = latest_status(&store, &calendar, &admin, now).await.unwrap();
        assert_eq!(status.get(&fx.amira), Some(&PresenceState::CheckedIn));
        assert_eq!(status.get(&fx.omar), Some(&PresenceState::CheckedOut));
        // yesterday's check-in does not carry over
        assert_eq!(status.get(&fx.sara), Some(&PresenceState::CheckedOut));
        assert_eq!(status.len(), 3);

        let hr = principal(Role::Hr, &[fx.khartoum]);
        let scoped = latest_status(&store, &calendar, &hr, now).await.unwrap();
        assert_eq!(scoped.keys().copied().collect::<Vec<_>>(), vec![fx.sara]);
        let unassigned = principal(Role::Hr, &[]);
        assert!(latest_status(&store, &calendar, &unassigned, now).await.unwrap().is_empty());
    }
}
