use actix_web::{HttpResponse, http::StatusCode, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::api::{message, success, success_with_message};
use crate::auth::auth::AuthUser;
use crate::error::AppError;
use crate::model::attendance::{AttendanceAction, AttendanceStatus};
use crate::service::attendance::{self, CheckRequest, RecordUpdate};
use crate::service::report::{self, ReportQuery};
use crate::service::schedule::Calendar;
use crate::store::Store;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckAttendanceReqDto {
    /// Either `agentId` or `rfidCode` must be given.
    #[schema(example = 7)]
    pub agent_id: Option<u64>,
    #[schema(example = "0042")]
    pub rfid_code: Option<String>,
    pub action: AttendanceAction,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Defaults to the caller's email.
    pub recorded_by: Option<String>,
    pub is_manual_entry: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AttendanceQuery {
    /// `YYYY-MM-DD` or RFC 3339; defaults to the start of today
    #[schema(example = "2024-03-04")]
    pub start_date: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339; defaults to the end of today
    #[schema(example = "2024-03-04")]
    pub end_date: Option<String>,
    pub office_id: Option<u64>,
    pub status: Option<AttendanceStatus>,
    pub agent_id: Option<u64>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttendanceReqDto {
    #[schema(value_type = Option<String>, format = "date-time")]
    pub timestamp: Option<DateTime<Utc>>,
    pub status: Option<AttendanceStatus>,
}

/// Manual check-in or check-out
#[utoipa::path(
    post,
    path = "/api/attendance/check",
    request_body = CheckAttendanceReqDto,
    responses(
        (status = 201, description = "Attendance recorded", body = Object, example = json!({
            "success": true,
            "data": { "id": 12, "agentId": 7, "action": "CHECK_IN", "status": "LATE" },
            "message": "Check-in successful"
        })),
        (status = 400, description = "Missing agent or out-of-sequence action", body = Object, example = json!({
            "success": false,
            "message": "Agent is already checked in"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Agent belongs to an office outside the caller's scope"),
        (status = 404, description = "Agent not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    calendar: web::Data<Calendar>,
    payload: web::Json<CheckAttendanceReqDto>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;

    let payload = payload.into_inner();
    let request = CheckRequest {
        agent_id: payload.agent_id,
        rfid_code: payload.rfid_code,
        action: payload.action,
        timestamp: payload.timestamp,
        recorded_by: payload.recorded_by,
        is_manual_entry: payload.is_manual_entry.unwrap_or(false),
    };

    let record =
        attendance::check_attendance(store.get_ref(), calendar.get_ref(), &auth, request).await?;
    let message = format!("{} successful", record.action.verb());

    Ok(success_with_message(StatusCode::CREATED, record, &message))
}

/// Attendance report
///
/// Records in the caller's scope, most recent first, with counts by status.
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Matching records and stats", body = Object, example = json!({
            "success": true,
            "data": {
                "records": [],
                "stats": { "totalRecords": 0, "lateCheckIns": 0, "earlyDepartures": 0, "onTime": 0 }
            }
        })),
        (status = 400, description = "Malformed date"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Office outside the caller's scope")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    calendar: web::Data<Calendar>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;

    let query = query.into_inner();
    let report = report::list_records(
        store.get_ref(),
        calendar.get_ref(),
        &auth,
        ReportQuery {
            start_date: query.start_date,
            end_date: query.end_date,
            office_id: query.office_id,
            status: query.status,
            agent_id: query.agent_id,
        },
        Utc::now(),
    )
    .await?;

    Ok(success(report))
}

/// Correct an attendance record
#[utoipa::path(
    put,
    path = "/api/attendance/{id}",
    params(
        ("id" = u64, Path, description = "Attendance record id")
    ),
    request_body = UpdateAttendanceReqDto,
    responses(
        (status = 200, description = "Attendance record updated successfully"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Record outside the caller's scope"),
        (status = 404, description = "Attendance record not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn update_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendanceReqDto>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;

    let payload = payload.into_inner();
    let record = attendance::update_attendance_record(
        store.get_ref(),
        &auth,
        path.into_inner(),
        RecordUpdate {
            timestamp: payload.timestamp,
            status: payload.status,
        },
    )
    .await?;

    Ok(success_with_message(
        StatusCode::OK,
        record,
        "Attendance record updated successfully",
    ))
}

/// Delete an attendance record
#[utoipa::path(
    delete,
    path = "/api/attendance/{id}",
    params(
        ("id" = u64, Path, description = "Attendance record id")
    ),
    responses(
        (status = 200, description = "Record deleted successfully"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Record outside the caller's scope"),
        (status = 404, description = "Attendance record not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn delete_attendance(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    path: web::Path<u64>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;
    attendance::delete_attendance_record(store.get_ref(), &auth, path.into_inner()).await?;
    Ok(message("Record deleted successfully"))
}

/// Who is in right now
///
/// Maps every agent in the caller's scope to `CHECKED_IN` or `CHECKED_OUT`
/// based on their last record today.
#[utoipa::path(
    get,
    path = "/api/attendance/latest-status",
    responses(
        (status = 200, description = "Current presence per agent id", body = Object, example = json!({
            "success": true,
            "data": { "statuses": { "7": "CHECKED_IN", "8": "CHECKED_OUT" } }
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn latest_status(
    auth: AuthUser,
    store: web::Data<dyn Store>,
    calendar: web::Data<Calendar>,
) -> Result<HttpResponse, AppError> {
    auth.require_staff()?;
    let statuses =
        attendance::latest_status(store.get_ref(), calendar.get_ref(), &auth, Utc::now()).await?;
    Ok(success(json!({ "statuses": statuses })))
}
