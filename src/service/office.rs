use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::office::{
    CheckInMethod, DEFAULT_CHECK_IN, DEFAULT_CHECK_OUT, NewOffice, Office, OfficeSummary,
};
use crate::service::schedule::is_valid_hhmm;
use crate::service::scope::resolve_office_scope;
use crate::store::Store;

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OfficePayload {
    #[schema(example = "Kosti")]
    pub name: Option<String>,
    #[schema(example = "Kosti, White Nile")]
    pub location: Option<String>,
    pub check_in_methods: Option<Vec<CheckInMethod>>,
    #[schema(example = "09:00")]
    pub expected_check_in: Option<String>,
    #[schema(example = "17:00")]
    pub expected_check_out: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn schedule_time(value: Option<String>, fallback: &str, field: &str) -> AppResult<String> {
    let value = non_blank(value).unwrap_or_else(|| fallback.to_string());
    if is_valid_hhmm(&value) {
        Ok(value)
    } else {
        Err(AppError::validation(format!("{field} must be a 24-hour HH:MM time")))
    }
}

/// Applies the payload over `existing` (or the defaults for a new office).
fn office_fields(payload: OfficePayload, existing: Option<&Office>) -> AppResult<NewOffice> {
    let (Some(name), Some(location)) = (non_blank(payload.name), non_blank(payload.location))
    else {
        return Err(AppError::validation("Name and location are required"));
    };

    let check_in_methods = match (payload.check_in_methods, existing) {
        (Some(methods), _) => methods,
        (None, Some(office)) => office.check_in_methods.clone(),
        (None, None) => vec![CheckInMethod::Manual, CheckInMethod::Rfid],
    };
    if check_in_methods.is_empty() {
        return Err(AppError::validation("At least one check-in method is required"));
    }

    let (default_in, default_out) = existing
        .map(|o| (o.expected_check_in.as_str(), o.expected_check_out.as_str()))
        .unwrap_or((DEFAULT_CHECK_IN, DEFAULT_CHECK_OUT));

    Ok(NewOffice {
        name,
        location,
        check_in_methods,
        expected_check_in: schedule_time(
            payload.expected_check_in,
            default_in,
            "expectedCheckIn",
        )?,
        expected_check_out: schedule_time(
            payload.expected_check_out,
            default_out,
            "expectedCheckOut",
        )?,
    })
}

pub async fn list_offices(
    store: &dyn Store,
    principal: &AuthUser,
) -> AppResult<Vec<OfficeSummary>> {
    let scope = resolve_office_scope(principal, None, None)?;
    if scope.is_empty() {
        return Ok(Vec::new());
    }
    store.list_offices(&scope).await
}

pub async fn create_office(
    store: &dyn Store,
    principal: &AuthUser,
    payload: OfficePayload,
) -> AppResult<Office> {
    principal.require_admin()?;
    let office = store.create_office(office_fields(payload, None)?).await?;
    tracing::info!(office_id = office.id, name = %office.name, "Office created");
    Ok(office)
}

pub async fn update_office(
    store: &dyn Store,
    principal: &AuthUser,
    id: u64,
    payload: OfficePayload,
) -> AppResult<Office> {
    principal.require_admin()?;
    let existing = store
        .get_office(id)
        .await?
        .ok_or_else(|| AppError::not_found("Office not found"))?;

    let office = store
        .update_office(id, office_fields(payload, Some(&existing))?)
        .await?
        .ok_or_else(|| AppError::not_found("Office not found"))?;
    tracing::info!(office_id = id, "Office updated");
    Ok(office)
}

/// Deletes the office with its agents and their attendance history.
pub async fn delete_office(store: &dyn Store, principal: &AuthUser, id: u64) -> AppResult<()> {
    principal.require_admin()?;
    if !store.delete_office(id).await? {
        return Err(AppError::not_found("Office not found"));
    }
    tracing::info!(office_id = id, "Office deleted");
    Ok(())
}
