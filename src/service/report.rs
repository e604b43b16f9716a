use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::attendance::{AttendanceRecordDetail, AttendanceStats, AttendanceStatus};
use crate::service::schedule::{Calendar, DayWindow};
use crate::service::scope::resolve_office_scope;
use crate::store::{RecordFilter, Store};

#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub office_id: Option<u64>,
    pub status: Option<AttendanceStatus>,
    pub agent_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttendanceReport {
    pub records: Vec<AttendanceRecordDetail>,
    pub stats: AttendanceStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Start,
    End,
}

/// Accepts `YYYY-MM-DD` (the whole local day) or an RFC 3339 instant.
fn parse_bound(calendar: &Calendar, raw: &str, bound: Bound) -> AppResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let day = calendar.date_window(date);
        return Ok(match bound {
            Bound::Start => day.start,
            Bound::End => day.end,
        });
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::validation(format!("Invalid date: {raw}")))
}

/// Report range; a missing bound falls back to today's.
pub fn report_window(
    calendar: &Calendar,
    start: Option<&str>,
    end: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<DayWindow> {
    let today = calendar.day_window(now);
    let window = DayWindow {
        start: start
            .map(|s| parse_bound(calendar, s, Bound::Start))
            .transpose()?
            .unwrap_or(today.start),
        end: end
            .map(|s| parse_bound(calendar, s, Bound::End))
            .transpose()?
            .unwrap_or(today.end),
    };
    if window.start > window.end {
        return Err(AppError::validation("startDate must not be after endDate"));
    }
    Ok(window)
}

/// `late_check_ins` counts every LATE record, whatever its action.
pub fn summarize(records: &[AttendanceRecordDetail]) -> AttendanceStats {
    records
        .iter()
        .fold(AttendanceStats::default(), |mut stats, detail| {
            stats.total_records += 1;
            match detail.record.status {
                AttendanceStatus::Late => stats.late_check_ins += 1,
                AttendanceStatus::Early => stats.early_departures += 1,
                AttendanceStatus::OnTime => stats.on_time += 1,
            }
            stats
        })
}

pub async fn list_records(
    store: &dyn Store,
    calendar: &Calendar,
    principal: &AuthUser,
    query: ReportQuery,
    now: DateTime<Utc>,
) -> AppResult<AttendanceReport> {
    let scope = resolve_office_scope(principal, query.office_id, None)?;
    let window = report_window(
        calendar,
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        now,
    )?;

    if scope.is_empty() {
        return Ok(AttendanceReport {
            records: Vec::new(),
            stats: AttendanceStats::default(),
        });
    }

    let filter = RecordFilter {
        window,
        scope,
        status: query.status,
        agent_id: query.agent_id,
    };
    let records = store.list_records(&filter).await?;
    let stats = summarize(&records);
    tracing::debug!(
        user = %principal.email,
        total = stats.total_records,
        "Attendance report built"
    );

    Ok(AttendanceReport { records, stats })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::auth::tests::principal;
    use crate::model::attendance::AttendanceAction;
    use crate::model::role::Role;
    use crate::service::attendance::{CheckRequest, check_attendance};
    use crate::store::memory::MemoryStore;
    use crate::store::memory::tests::{Fixture, kosti_fixture, utc};

    async fn seeded() -> (MemoryStore, Calendar, Fixture) {
        let (store, calendar, fx) = kosti_fixture().await;
        let admin = principal(Role::Admin, &[]);
        for (agent_id, action, at) in [
            // Kosti 09:00-17:00, Khartoum 08:00-16:00
            (fx.amira, AttendanceAction::CheckIn, "2024-03-04T09:10:00Z"),
            (fx.amira, AttendanceAction::CheckOut, "2024-03-04T16:00:00Z"),
            (fx.omar, AttendanceAction::CheckIn, "2024-03-04T08:50:00Z"),
            (fx.omar, AttendanceAction::CheckOut, "2024-03-04T18:00:00Z"),
            (fx.sara, AttendanceAction::CheckIn, "2024-03-04T07:45:00Z"),
            (fx.sara, AttendanceAction::CheckIn, "2024-03-05T07:55:00Z"),
        ] {
            let request = CheckRequest {
                agent_id: Some(agent_id),
                rfid_code: None,
                action,
                timestamp: Some(utc(at)),
                recorded_by: None,
                is_manual_entry: true,
            };
            check_attendance(&store, &calendar, &admin, request).await.unwrap();
        }
        (store, calendar, fx)
    }

    fn on_day(day: &str) -> ReportQuery {
        ReportQuery {
            start_date: Some(day.to_string()),
            end_date: Some(day.to_string()),
            ..ReportQuery::default()
        }
    }

    #[test]
    fn bounds_accept_dates_and_instants() {
        let calendar = Calendar::new(chrono_tz::Africa::Khartoum);
        let now = utc("2024-03-10T12:00:00Z");

        let window = report_window(&calendar, Some("2024-03-04"), Some("2024-03-05"), now).unwrap();
        assert_eq!(window.start, utc("2024-03-03T22:00:00Z"));
        assert_eq!(window.end, utc("2024-03-05T21:59:59.999Z"));

        let window = report_window(&calendar, Some("2024-03-04T06:00:00Z"), None, now).unwrap();
        assert_eq!(window.start, utc("2024-03-04T06:00:00Z"));
        assert_eq!(window.end, utc("2024-03-10T21:59:59.999Z"));

        assert_eq!(report_window(&calendar, None, None, now).unwrap(), calendar.day_window(now));
    }

    #[test]
    fn malformed_or_inverted_bounds_are_rejected() {
        let calendar = Calendar::new(chrono_tz::Tz::UTC);
        let now = utc("2024-03-10T12:00:00Z");
        assert!(matches!(
            report_window(&calendar, Some("04/03/2024"), None, now),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            report_window(&calendar, Some("2024-03-06"), Some("2024-03-05"), now),
            Err(AppError::Validation(_))
        ));
    }

    #[actix_web::test]
    async fn report_defaults_to_today() {
        let (store, calendar, fx) = seeded().await;
        let admin = principal(Role::Admin, &[]);

        let now = utc("2024-03-05T10:00:00Z");
        let report = list_records(&store, &calendar, &admin, ReportQuery::default(), now)
            .await
            .unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].record.agent_id, fx.sara);
        assert_eq!(report.records[0].office_name, "Khartoum");
    }

    #[actix_web::test]
    async fn stats_count_by_status() {
        let (store, calendar, _) = seeded().await;
        let manager = principal(Role::Manager, &[]);

        let now = utc("2024-03-10T00:00:00Z");
        let report = list_records(&store, &calendar, &manager, on_day("2024-03-04"), now)
            .await
            .unwrap();

        // late: amira in; early: amira out; on time: omar in/out, sara in
        assert_eq!(
            report.stats,
            AttendanceStats {
                total_records: 5,
                late_check_ins: 1,
                early_departures: 1,
                on_time: 3,
            }
        );
        let times: Vec<_> = report.records.iter().map(|r| r.record.timestamp).collect();
        let mut sorted = times.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(times, sorted);
    }

    #[actix_web::test]
    async fn filters_narrow_the_report() {
        let (store, calendar, fx) = seeded().await;
        let admin = principal(Role::Admin, &[]);
        let now = utc("2024-03-10T00:00:00Z");

        let mut query = on_day("2024-03-04");
        query.status = Some(AttendanceStatus::OnTime);
        query.office_id = Some(fx.kosti);
        let report = list_records(&store, &calendar, &admin, query, now).await.unwrap();
        assert_eq!(report.stats.total_records, 2);
        assert!(report.records.iter().all(|r| r.record.agent_id == fx.omar));

        let mut query = on_day("2024-03-04");
        query.agent_id = Some(fx.amira);
        let report = list_records(&store, &calendar, &admin, query, now).await.unwrap();
        assert_eq!(report.stats.total_records, 2);
    }

    #[actix_web::test]
    async fn hr_reports_stay_in_scope() {
        let (store, calendar, fx) = seeded().await;
        let now = utc("2024-03-10T00:00:00Z");

        let hr = principal(Role::Hr, &[fx.khartoum]);
        let report = list_records(&store, &calendar, &hr, on_day("2024-03-04"), now).await.unwrap();
        assert_eq!(report.stats.total_records, 1);
        assert_eq!(report.records[0].office_id, fx.khartoum);

        let mut query = on_day("2024-03-04");
        query.office_id = Some(fx.kosti);
        assert!(matches!(
            list_records(&store, &calendar, &hr, query, now).await,
            Err(AppError::Forbidden(_))
        ));

        let unassigned = principal(Role::Hr, &[]);
        let report = list_records(&store, &calendar, &unassigned, on_day("2024-03-04"), now)
            .await
            .unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.stats, AttendanceStats::default());
    }
}
