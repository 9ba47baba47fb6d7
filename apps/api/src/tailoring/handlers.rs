use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::resumes;
use crate::state::AppState;
use crate::tailoring::analysis::keyword_report;
use crate::tailoring::{check_job_description, TailoredResume};

#[derive(Deserialize)]
pub struct TailorRequest {
    pub job_description: String,
}

#[derive(Serialize)]
pub struct MatchAnalysisResponse {
    pub resume_id: Uuid,
    pub match_score: u8,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub suggestions: Vec<String>,
    pub keyword_density: BTreeMap<String, f64>,
}

#[derive(Serialize)]
pub struct SuggestionsResponse {
    pub resume_id: Uuid,
    pub suggestions: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// POST /api/v1/resumes/:id/tailor
pub async fn handle_tailor(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TailorRequest>,
) -> Result<Json<TailoredResume>, AppError> {
    let job_description = check_job_description(&req.job_description)?;
    let resume = resumes::get_resume(state.blobs.as_ref(), session.id, id).await?;

    let tailored = state
        .tailor
        .tailor(&resume.extracted_text, job_description)
        .await?;
    Ok(Json(tailored))
}

/// POST /api/v1/resumes/:id/analyze
/// Same body as tailoring. The score and keyword density are computed without the LLM.
pub async fn handle_analyze(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TailorRequest>,
) -> Result<Json<MatchAnalysisResponse>, AppError> {
    let job_description = check_job_description(&req.job_description)?;
    let resume = resumes::get_resume(state.blobs.as_ref(), session.id, id).await?;

    let report = keyword_report(&resume.extracted_text, job_description);
    let insights = state
        .tailor
        .analyze(&resume.extracted_text, job_description)
        .await?;

    Ok(Json(MatchAnalysisResponse {
        resume_id: id,
        match_score: report.match_score,
        matched_skills: insights.matched_skills,
        missing_skills: insights.missing_skills,
        suggestions: insights.suggestions,
        keyword_density: report.keyword_density,
    }))
}

/// GET /api/v1/resumes/:id/suggestions
pub async fn handle_suggestions(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SuggestionsResponse>, AppError> {
    let resume = resumes::get_resume(state.blobs.as_ref(), session.id, id).await?;
    let suggestions = state.tailor.suggest(&resume.extracted_text).await?;
    Ok(Json(SuggestionsResponse {
        resume_id: id,
        suggestions,
        generated_at: Utc::now(),
    }))
}
