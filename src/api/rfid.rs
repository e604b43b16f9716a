//! Card reader endpoints. Readers hold no credentials, so these routes sit
//! outside the bearer-protected scope and are only rate limited.

use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::model::agent::AgentWithOffice;
use crate::model::attendance::{AttendanceRecord, AttendanceSource};
use crate::service::scan;
use crate::service::schedule::Calendar;
use crate::store::Store;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanReqDto {
    #[schema(example = "0042")]
    pub card_number: String,
    /// Defaults to the time the request is handled.
    #[schema(value_type = Option<String>, format = "date-time", example = "2024-03-04T09:04:00Z")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Defaults to `RFIDR`.
    pub source: Option<AttendanceSource>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CardHolder {
    pub id: u64,
    pub name: String,
    /// Office name
    pub office: String,
}

/// The stored record with the agent and office it was written for.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScanAttendance {
    #[serde(flatten)]
    pub record: AttendanceRecord,
    pub agent: AgentWithOffice,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/check/{card_number}").route(web::get().to(check_card)))
        .service(web::resource("/scan").route(web::post().to(scan)));
}

/// Check whether a card is registered
#[utoipa::path(
    get,
    path = "/api/rfid/check/{card_number}",
    params(("card_number" = String, Path, description = "Card number as read from the card")),
    responses(
        (status = 200, description = "Card is registered", body = Object, example = json!({
            "success": true,
            "message": "Card is registered",
            "agent": { "id": 7, "name": "Amira Hassan", "office": "Kosti" }
        })),
        (status = 400, description = "Card number shorter than four characters"),
        (status = 404, description = "No agent found with this RFID card")
    ),
    tag = "RFID"
)]
pub async fn check_card(
    store: web::Data<dyn Store>,
    card_number: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let holder = scan::check_card(store.get_ref(), &card_number).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Card is registered",
        "agent": CardHolder {
            id: holder.agent.id,
            name: holder.agent.name,
            office: holder.office.name,
        },
    })))
}

/// Record a card scan
///
/// Checks the agent in, or out when their last record today is a check-in.
#[utoipa::path(
    post,
    path = "/api/rfid/scan",
    request_body = ScanReqDto,
    responses(
        (status = 200, description = "Scan recorded", body = Object, example = json!({
            "success": true,
            "message": "Check-in successful",
            "attendance": { "id": 12, "agentId": 7, "action": "CHECK_IN", "status": "ON_TIME" }
        })),
        (status = 400, description = "Invalid card number format"),
        (status = 404, description = "No agent found with this RFID card")
    ),
    tag = "RFID"
)]
pub async fn scan(
    store: web::Data<dyn Store>,
    calendar: web::Data<Calendar>,
    payload: web::Json<ScanReqDto>,
) -> Result<HttpResponse, AppError> {
    let ScanReqDto {
        card_number,
        timestamp,
        source,
    } = payload.into_inner();

    let outcome =
        scan::resolve_scan(store.get_ref(), calendar.get_ref(), &card_number, timestamp, source)
            .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": format!("{} successful", outcome.record.action.verb()),
        "attendance": ScanAttendance {
            record: outcome.record,
            agent: outcome.agent,
        },
    })))
}
