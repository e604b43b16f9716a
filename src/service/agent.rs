use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::model::agent::{Agent, AgentStatus, AgentWithOffice, NewAgent};
use crate::service::scope::{ensure_office_access, resolve_office_scope};
use crate::store::Store;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AgentPayload {
    #[schema(example = "Amira Hassan")]
    pub name: String,
    #[schema(example = "amira@kosti.com")]
    pub email: Option<String>,
    /// Blank values clear the card.
    #[schema(example = "0042")]
    pub rfid_code: Option<String>,
    #[schema(example = 1)]
    pub office_id: u64,
    pub status: Option<AgentStatus>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

async fn agent_fields(
    store: &dyn Store,
    payload: AgentPayload,
    current_status: AgentStatus,
) -> AppResult<NewAgent> {
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("Name is required"));
    }
    if store.get_office(payload.office_id).await?.is_none() {
        return Err(AppError::not_found("Office not found"));
    }

    Ok(NewAgent {
        name,
        email: trimmed(payload.email),
        rfid_code: trimmed(payload.rfid_code),
        status: payload.status.unwrap_or(current_status),
        office_id: payload.office_id,
    })
}

fn duplicate_card(err: AppError) -> AppError {
    match err {
        AppError::Conflict(_) => AppError::Conflict("RFID code already exists".to_string()),
        other => other,
    }
}

pub async fn list_agents(
    store: &dyn Store,
    principal: &AuthUser,
    office_id: Option<u64>,
    office_ids: Option<&[u64]>,
) -> AppResult<Vec<AgentWithOffice>> {
    let scope = resolve_office_scope(principal, office_id, office_ids)?;
    if scope.is_empty() {
        return Ok(Vec::new());
    }
    store.list_agents(&scope).await
}

pub async fn get_agent(
    store: &dyn Store,
    principal: &AuthUser,
    id: u64,
) -> AppResult<AgentWithOffice> {
    let agent = store
        .get_agent(id)
        .await?
        .ok_or_else(|| AppError::not_found("Agent not found"))?;
    ensure_office_access(principal, agent.agent.office_id)?;
    Ok(agent)
}

pub async fn create_agent(
    store: &dyn Store,
    principal: &AuthUser,
    payload: AgentPayload,
) -> AppResult<Agent> {
    principal.require_admin()?;
    let fields = agent_fields(store, payload, AgentStatus::Active).await?;
    let agent = store.create_agent(fields).await.map_err(duplicate_card)?;
    tracing::info!(
        agent_id = agent.id,
        name = %agent.name,
        office_id = agent.office_id,
        "Agent created"
    );
    Ok(agent)
}

pub async fn update_agent(
    store: &dyn Store,
    principal: &AuthUser,
    id: u64,
    payload: AgentPayload,
) -> AppResult<Agent> {
    principal.require_admin()?;
    let existing = store
        .get_agent(id)
        .await?
        .ok_or_else(|| AppError::not_found("Agent not found"))?;

    let fields = agent_fields(store, payload, existing.agent.status).await?;
    let agent = store
        .update_agent(id, fields)
        .await
        .map_err(duplicate_card)?
        .ok_or_else(|| AppError::not_found("Agent not found"))?;
    tracing::info!(agent_id = id, "Agent updated");
    Ok(agent)
}

/// Deletes the agent and all of its attendance records.
pub async fn delete_agent(store: &dyn Store, principal: &AuthUser, id: u64) -> AppResult<()> {
    principal.require_admin()?;
    if !store.delete_agent(id).await? {
        return Err(AppError::not_found("Agent not found"));
    }
    tracing::info!(agent_id = id, "Agent deleted");
    Ok(())
}
