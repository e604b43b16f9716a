//! Attendance status and working-hours computation.
//!
//! Everything here is pure: callers hand in timestamps and the office
//! schedule snapshot, nothing is read from storage or the clock.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::model::attendance::{AttendanceAction, AttendanceStatus};
use crate::model::office::OfficeSchedule;

/// Tolerance applied to card-scan statuses, in minutes.
pub const GRACE_MINUTES: i64 = 5;

/// How strictly a timestamp is compared against the expected time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPolicy {
    /// Manual entries: late is anything after the expected minute.
    Strict,
    /// Card scans: late/early only beyond [`GRACE_MINUTES`].
    Grace,
}

impl StatusPolicy {
    fn tolerance(self) -> i64 {
        match self {
            StatusPolicy::Strict => 0,
            StatusPolicy::Grace => GRACE_MINUTES,
        }
    }
}

/// Parses a 24-hour `HH:MM` string into minutes since midnight.
pub fn parse_hhmm(raw: &str) -> Option<i64> {
    let (h, m) = raw.trim().split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (h, m): (i64, i64) = (h.parse().ok()?, m.parse().ok()?);
    if h > 23 || m > 59 {
        return None;
    }
    Some(h * 60 + m)
}

pub fn is_valid_hhmm(raw: &str) -> bool {
    parse_hhmm(raw).is_some()
}

/// Decides ON_TIME/LATE/EARLY for a local wall-clock time.
///
/// A schedule string that fails to parse yields `OnTime`: recording the
/// event matters more than classifying it.
pub fn compute_status<T: Timelike>(
    at: &T,
    action: AttendanceAction,
    schedule: &OfficeSchedule,
    policy: StatusPolicy,
) -> AttendanceStatus {
    let t = i64::from(at.hour()) * 60 + i64::from(at.minute());
    let grace = policy.tolerance();

    match action {
        AttendanceAction::CheckIn => match parse_hhmm(&schedule.expected_check_in) {
            Some(e) if t > e + grace => AttendanceStatus::Late,
            _ => AttendanceStatus::OnTime,
        },
        AttendanceAction::CheckOut => match parse_hhmm(&schedule.expected_check_out) {
            Some(e) if t < e - grace => AttendanceStatus::Early,
            _ => AttendanceStatus::OnTime,
        },
    }
}

/// Rounds to two decimals, half away from zero.
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

pub fn compute_working_hours(
    check_in: Option<DateTime<Utc>>,
    check_out: Option<DateTime<Utc>>,
) -> Option<f64> {
    let (check_in, check_out) = (check_in?, check_out?);
    let millis = (check_out - check_in).num_milliseconds() as f64;
    Some(round_hours(millis / 3_600_000.0))
}

/// Inclusive UTC bounds of one local calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Maps UTC instants onto the configured local calendar.
#[derive(Debug, Clone, Copy)]
pub struct Calendar {
    tz: Tz,
}

impl Calendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn local(&self, at: DateTime<Utc>) -> DateTime<Tz> {
        at.with_timezone(&self.tz)
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local(at).date_naive()
    }

    /// `[00:00:00.000, 23:59:59.999]` of the local day containing `at`.
    pub fn day_window(&self, at: DateTime<Utc>) -> DayWindow {
        self.date_window(self.local_date(at))
    }

    pub fn date_window(&self, date: NaiveDate) -> DayWindow {
        let start = self.start_of(date);
        let next = date
            .succ_opt()
            .map(|d| self.start_of(d))
            .unwrap_or(start + Duration::days(1));
        DayWindow {
            start,
            end: next - Duration::milliseconds(1),
        }
    }

    fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::MIN);
        match self.tz.from_local_datetime(&midnight).earliest() {
            Some(local) => local.with_timezone(&Utc),
            // midnight skipped by a DST jump; the day starts at the first valid instant
            None => self
                .tz
                .from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
                .map(|local| local.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&midnight)),
        }
    }
}
