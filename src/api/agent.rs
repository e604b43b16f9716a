use actix_web::{HttpResponse, http::StatusCode, web};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::api::{message, success, success_with_message};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::service::agent::{self, AgentPayload};
use crate::service::scope::parse_office_ids;
use crate::store::Store;

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AgentQuery {
    /// Single office filter
    #[schema(example = 1)]
    pub office_id: Option<u64>,
    /// Comma separated office ids, ignored when `officeId` is present
    #[schema(example = "1,2")]
    pub office_ids: Option<String>,
}

/// List agents
#[utoipa::path(
    get,
    path = "/api/agents",
    params(AgentQuery),
    responses(
        (status = 200, description = "Agents with their office, ordered by name", body = Object, example = json!({
            "success": true,
            "data": { "agents": [{
                "id": 7, "name": "Amira Hassan", "email": null, "rfidCode": "0042",
                "status": "ACTIVE", "officeId": 1,
                "office": { "id": 1, "name": "Kosti" }
            }]}
        })),
        (status = 400, description = "Malformed officeIds"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Office outside the caller's scope")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Agent"
)]
pub async fn list_agents(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    query: web::Query<AgentQuery>,
) -> Result<HttpResponse, AppError> {
    let office_ids = query.office_ids.as_deref().map(parse_office_ids).transpose()?;
    let agents =
        agent::list_agents(store.get_ref(), &auth, query.office_id, office_ids.as_deref()).await?;
    Ok(success(json!({ "agents": agents })))
}

/// Get agent
#[utoipa::path(
    get,
    path = "/api/agents/{id}",
    params(
        ("id" = u64, Path, description = "Agent id")
    ),
    responses(
        (status = 200, description = "Agent with office"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Agent outside the caller's scope"),
        (status = 404, description = "Agent not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Agent"
)]
pub async fn get_agent(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    let agent = agent::get_agent(store.get_ref(), &auth, path.into_inner()).await?;
    Ok(success(json!({ "agent": agent })))
}

/// Create agent (Admin)
#[utoipa::path(
    post,
    path = "/api/agents",
    request_body = AgentPayload,
    responses(
        (status = 201, description = "Agent created"),
        (status = 400, description = "Missing name"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Office not found"),
        (status = 409, description = "RFID code already exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Agent"
)]
pub async fn create_agent(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    payload: web::Json<AgentPayload>,
) -> Result<HttpResponse, AppError> {
    let agent = agent::create_agent(store.get_ref(), &auth, payload.into_inner()).await?;
    Ok(success_with_message(
        StatusCode::CREATED,
        json!({ "agent": agent }),
        "Agent created successfully",
    ))
}

/// Update agent (Admin)
#[utoipa::path(
    put,
    path = "/api/agents/{id}",
    params(
        ("id" = u64, Path, description = "Agent id")
    ),
    request_body = AgentPayload,
    responses(
        (status = 200, description = "Agent updated"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Agent or office not found"),
        (status = 409, description = "RFID code already exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Agent"
)]
pub async fn update_agent(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
    payload: web::Json<AgentPayload>,
) -> Result<HttpResponse, AppError> {
    let agent =
        agent::update_agent(store.get_ref(), &auth, path.into_inner(), payload.into_inner()).await?;
    Ok(success_with_message(
        StatusCode::OK,
        json!({ "agent": agent }),
        "Agent updated successfully",
    ))
}

/// Delete agent (Admin)
#[utoipa::path(
    delete,
    path = "/api/agents/{id}",
    params(
        ("id" = u64, Path, description = "Agent id")
    ),
    responses(
        (status = 200, description = "Agent deleted successfully"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Agent not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Agent"
)]
pub async fn delete_agent(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    agent::delete_agent(store.get_ref(), &auth, path.into_inner()).await?;
    Ok(message("Agent deleted successfully"))
}
