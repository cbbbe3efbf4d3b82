//! Axum route handlers for the recommendation API.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::export::{csv_attachment, safe_filename_part, to_csv, ExportFormat, ExportQuery};
use crate::models::opportunity::{OpportunityRecord, PlacementRow};
use crate::models::student::RawStudentProfile;
use crate::recommend::candidates::{
    create_placement, fetch_placement, fetch_student, list_students, list_visible_placements,
    NewPlacement,
};
use crate::recommend::feedback::record_feedback;
use crate::recommend::model::ModelProvenance;
use crate::recommend::ranker::{recommend, ExternalScore, ScoreResult};
use crate::recommend::reasons::ReasonSet;
use crate::recommend::roster::{eligible_students, EligibleStudent, ROSTER_HEADERS};
use crate::state::AppState;

const DEFAULT_VISIBLE_LIMIT: i64 = 200;
const MAX_VISIBLE_LIMIT: i64 = 500;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RankRequest {
    pub student: RawStudentProfile,
    pub opportunities: Vec<OpportunityRecord>,
    #[serde(default)]
    pub external_scores: HashMap<String, ExternalScore>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RankResponse {
    pub results: Vec<ScoreResult>,
    pub excluded: usize,
    pub model: ModelProvenance,
}

#[derive(Debug, Deserialize)]
pub struct VisibleQuery {
    pub email: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct VisiblePlacement {
    #[serde(flatten)]
    pub placement: PlacementRow,
    pub score: f64,
    pub reasons: ReasonSet,
}

#[derive(Debug, Serialize)]
pub struct EligibleStudentsResponse {
    pub placement_id: Uuid,
    pub company_name: String,
    pub title: String,
    pub students: Vec<EligibleStudent>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub email: String,
    pub opportunity_id: String,
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub provenance: ModelProvenance,
    pub artifact_path: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/recommendations/rank
///
/// Ranks caller-supplied candidates (e.g. from the extraction pipeline) for a
/// caller-supplied profile snapshot. Ineligible candidates are omitted.
pub async fn handle_rank(
    State(state): State<AppState>,
    Json(request): Json<RankRequest>,
) -> Result<Json<RankResponse>, AppError> {
    let student = request.student.into_signals();
    let submitted = request.opportunities.len();
    let scorer = state.models.scorer();

    let results = recommend(
        &scorer,
        &student,
        request.opportunities,
        &request.external_scores,
        None,
    );
    let excluded = submitted - results.len();
    let results = match request.limit {
        Some(limit) => results.into_iter().take(limit).collect(),
        None => results,
    };

    Ok(Json(RankResponse {
        results,
        excluded,
        model: state.models.provenance(),
    }))
}

/// GET /api/v1/placements/visible?email=
///
/// Eligible placement notices for a stored student, highest match first.
pub async fn handle_visible_placements(
    State(state): State<AppState>,
    Query(params): Query<VisibleQuery>,
) -> Result<Json<Vec<VisiblePlacement>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_VISIBLE_LIMIT)
        .clamp(1, MAX_VISIBLE_LIMIT);

    let student = fetch_student(&state.db, &params.email)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Student {} not found", params.email)))?;
    let signals = student.signals();

    let rows = list_visible_placements(&state.db, &signals, limit).await?;
    let records = rows.iter().map(PlacementRow::to_record).collect();
    let ranked = recommend(&state.models.scorer(), &signals, records, &HashMap::new(), None);

    let mut by_id: HashMap<String, PlacementRow> =
        rows.into_iter().map(|r| (r.id.to_string(), r)).collect();
    let placements = ranked
        .into_iter()
        .filter_map(|result| {
            by_id
                .remove(&result.opportunity_id)
                .map(|placement| VisiblePlacement {
                    placement,
                    score: result.score,
                    reasons: result.reasons,
                })
        })
        .collect();

    Ok(Json(placements))
}

/// POST /api/v1/placements
pub async fn handle_create_placement(
    State(state): State<AppState>,
    Json(request): Json<NewPlacement>,
) -> Result<(StatusCode, Json<PlacementRow>), AppError> {
    let row = create_placement(&state.db, &request).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/placements/:id/eligible-students?format=json|csv
///
/// Staff roster of stored students passing every gate of the placement.
pub async fn handle_eligible_students(
    State(state): State<AppState>,
    Path(placement_id): Path<Uuid>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let format = ExportFormat::parse(params.format.as_deref())?;
    let placement = fetch_placement(&state.db, placement_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Placement {placement_id} not found")))?;

    let students = list_students(&state.db).await?;
    let roster = eligible_students(&state.models.scorer(), &placement.to_record(), &students);
    info!(
        "Exporting {} of {} students as eligible for placement {}",
        roster.len(),
        students.len(),
        placement.id
    );

    match format {
        ExportFormat::Csv => {
            let filename = format!(
                "eligible_students_{}.csv",
                safe_filename_part(&placement.company_name)
            );
            Ok(csv_attachment(&filename, to_csv(&roster, &ROSTER_HEADERS)?))
        }
        ExportFormat::Json => Ok(Json(EligibleStudentsResponse {
            placement_id: placement.id,
            company_name: placement.company_name,
            title: placement.title,
            students: roster,
        })
        .into_response()),
    }
}

/// POST /api/v1/ml/feedback
///
/// Fire-and-forget telemetry write. Never waits on retraining.
pub async fn handle_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    if request.email.trim().is_empty()
        || request.opportunity_id.trim().is_empty()
        || request.action.trim().is_empty()
    {
        return Err(AppError::Validation(
            "email, opportunity_id and action are required".to_string(),
        ));
    }

    let saved = record_feedback(
        state.feedback.as_ref(),
        &request.email,
        &request.opportunity_id,
        &request.action,
    )
    .await;
    if !saved {
        return Err(AppError::Feedback("Failed to save feedback".to_string()));
    }

    Ok(Json(FeedbackResponse {
        status: "feedback saved".to_string(),
    }))
}

/// GET /api/v1/admin/model
pub async fn handle_model_info(State(state): State<AppState>) -> Json<ModelInfoResponse> {
    Json(ModelInfoResponse {
        provenance: state.models.provenance(),
        artifact_path: state.config.model_path.display().to_string(),
    })
}

/// POST /api/v1/admin/model/reload
///
/// Swaps in the artifact most recently published by `retrain`.
pub async fn handle_model_reload(
    State(state): State<AppState>,
) -> Result<Json<ModelInfoResponse>, AppError> {
    let provenance = state
        .models
        .reload()
        .map_err(|e| AppError::Model(e.to_string()))?;
    Ok(Json(ModelInfoResponse {
        provenance,
        artifact_path: state.config.model_path.display().to_string(),
    }))
}
