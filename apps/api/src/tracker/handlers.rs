use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::export::{csv_attachment, to_csv, ExportFormat, ExportQuery};
use crate::models::tracker::{AttendanceRecord, RoundStatus};
use crate::state::AppState;
use crate::tracker::attendance::{
    attendance_summary, list_registrations, mark_attendance, register_for_event,
    AttendanceReport, ATTENDANCE_HEADERS,
};
use crate::tracker::rounds::{student_status, upload_round_selections, RoundUpload, RoundUploadSummary};

#[derive(Deserialize)]
pub struct RegistrationRequest {
    pub student_email: String,
}

#[derive(Serialize)]
pub struct RegistrationResponse {
    pub registered: bool,
    pub message: String,
}

#[derive(Deserialize)]
pub struct AttendanceRequest {
    pub student_email: String,
    pub present: bool,
}

#[derive(Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

/// POST /api/v1/events/:id/registrations
pub async fn handle_register(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<RegistrationResponse>), AppError> {
    let created = register_for_event(state.tracker.as_ref(), event_id, &req.student_email).await?;
    let (status, message) = if created {
        (StatusCode::CREATED, "Registered")
    } else {
        (StatusCode::OK, "Already registered")
    };
    Ok((
        status,
        Json(RegistrationResponse {
            registered: true,
            message: message.to_string(),
        }),
    ))
}

/// POST /api/v1/events/:id/attendance
pub async fn handle_mark_attendance(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Json(req): Json<AttendanceRequest>,
) -> Result<Json<AttendanceReport>, AppError> {
    let report = mark_attendance(
        state.tracker.as_ref(),
        event_id,
        &req.student_email,
        req.present,
    )
    .await?;
    Ok(Json(report))
}

/// GET /api/v1/events/:id/registrations
pub async fn handle_list_registrations(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    Ok(Json(list_registrations(state.tracker.as_ref(), event_id).await?))
}

/// GET /api/v1/events/:id/attendance?format=json|csv
pub async fn handle_attendance_summary(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let format = ExportFormat::parse(params.format.as_deref())?;
    let summary = attendance_summary(state.tracker.as_ref(), event_id).await?;
    match format {
        ExportFormat::Csv => {
            let body = to_csv(&summary.lines(), &ATTENDANCE_HEADERS)?;
            Ok(csv_attachment(&format!("attendance_{event_id}.csv"), body))
        }
        ExportFormat::Json => Ok(Json(summary).into_response()),
    }
}

/// POST /api/v1/placements/:id/rounds
pub async fn handle_upload_round(
    State(state): State<AppState>,
    Path(placement_id): Path<Uuid>,
    Json(req): Json<RoundUpload>,
) -> Result<Json<RoundUploadSummary>, AppError> {
    let summary = upload_round_selections(state.tracker.as_ref(), placement_id, &req).await?;
    Ok(Json(summary))
}

/// GET /api/v1/placements/status?email=
pub async fn handle_round_status(
    State(state): State<AppState>,
    Query(params): Query<EmailQuery>,
) -> Result<Json<Vec<RoundStatus>>, AppError> {
    Ok(Json(student_status(state.tracker.as_ref(), &params.email).await?))
}
