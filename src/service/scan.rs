//! Card-scan handling: find the card's agent, work out whether this scan
//! checks them in or out, and record it.

use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::model::agent::AgentWithOffice;
use crate::model::attendance::{AttendanceAction, AttendanceRecord, AttendanceSource};
use crate::service::attendance::EntryContext;
use crate::service::schedule::{Calendar, StatusPolicy};
use crate::store::Store;

/// Shortest card number a reader may submit.
pub const MIN_CARD_LENGTH: usize = 4;

/// Lookup key for a card number. Matching ignores case and leading zeros,
/// so `"0042"` and `"42"` name the same card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardCode {
    lowered: String,
    normalized: String,
}

impl CardCode {
    pub fn new(raw: &str) -> AppResult<Self> {
        let lowered = raw.trim().to_lowercase();
        if lowered.is_empty() {
            return Err(AppError::validation("Card number is required"));
        }
        let normalized = normalize_card(&lowered);
        Ok(Self { lowered, normalized })
    }

    /// Reader-submitted card numbers must be at least [`MIN_CARD_LENGTH`] long.
    pub fn from_reader(raw: &str) -> AppResult<Self> {
        if raw.trim().chars().count() < MIN_CARD_LENGTH {
            tracing::warn!(card = raw, "Invalid card number format received");
            return Err(AppError::validation("Invalid card number format"));
        }
        Self::new(raw)
    }

    pub fn lowered(&self) -> &str {
        &self.lowered
    }

    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn matches(&self, registered: &str) -> bool {
        normalize_card(registered) == self.normalized
    }
}

/// Lowercases and strips leading zeros; an all-zero code stays `"0"`.
pub fn normalize_card(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let stripped = lowered.trim_start_matches('0');
    if stripped.is_empty() && !lowered.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    }
}

/// A scan checks in unless the agent's last record today is a check-in.
pub fn next_scan_action(last: Option<&AttendanceRecord>) -> AttendanceAction {
    match last {
        Some(record) if record.action == AttendanceAction::CheckIn => AttendanceAction::CheckOut,
        _ => AttendanceAction::CheckIn,
    }
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub agent: AgentWithOffice,
    pub record: AttendanceRecord,
}

/// Confirms a card is registered without recording anything.
pub async fn check_card(store: &dyn Store, card_number: &str) -> AppResult<AgentWithOffice> {
    let card = CardCode::from_reader(card_number)?;
    find_card_holder(store, &card).await
}

pub(crate) async fn find_card_holder(
    store: &dyn Store,
    card: &CardCode,
) -> AppResult<AgentWithOffice> {
    match store.find_agent_by_card(card).await? {
        Some(agent) => Ok(agent),
        None => {
            tracing::warn!(card = card.lowered(), "No agent found with RFID card");
            Err(AppError::not_found("No agent found with this RFID card"))
        }
    }
}

/// Records one scan. Every successful call inserts exactly one record.
pub async fn resolve_scan(
    store: &dyn Store,
    calendar: &Calendar,
    card_number: &str,
    timestamp: Option<DateTime<Utc>>,
    source: Option<AttendanceSource>,
) -> AppResult<ScanOutcome> {
    let card = CardCode::from_reader(card_number)?;
    let source = source.unwrap_or(AttendanceSource::RfidReader);
    tracing::debug!(card = card.lowered(), %source, "Received RFID scan");

    let agent = find_card_holder(store, &card).await?;

    let at = timestamp.unwrap_or_else(Utc::now);
    let schedule = agent.office.schedule();
    let agent_id = agent.agent.id;
    let entry = EntryContext {
        agent_id,
        at,
        local: calendar.local(at),
        schedule: &schedule,
        policy: StatusPolicy::Grace,
        source,
        recorded_by: None,
    };

    let record = store
        .record_in_sequence(agent_id, calendar.day_window(at), &|last| {
            let action = next_scan_action(last);
            tracing::debug!(agent_id, %action, "Determined scan action");
            Ok(entry.draft(action, last))
        })
        .await?;

    tracing::info!(
        agent = %agent.agent.name,
        action = %record.action,
        status = %record.status,
        "RFID scan recorded"
    );

    Ok(ScanOutcome { agent, record })
}
