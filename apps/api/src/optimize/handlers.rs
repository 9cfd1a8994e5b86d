use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::auth::VerifiedUser;
use crate::errors::AppError;
use crate::optimize::ats::AtsReport;
use crate::optimize::models::{EditBatch, EditMode};
use crate::optimize::patch::PatchReport;
use crate::optimize::pipeline::{run_ats, run_optimize, RenderedDocument};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    #[serde(default)]
    pub job_description: String,
    pub mode: Option<EditMode>,
}

#[derive(Debug, Serialize)]
pub struct OptimizeResponse {
    pub message: String,
    pub changes_accumulated: EditBatch,
    pub patch_report: PatchReport,
    pub document: Option<RenderedDocument>,
}

#[derive(Debug, Deserialize)]
pub struct AtsRequest {
    #[serde(default)]
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct AtsResponse {
    pub message: AtsReport,
}

fn require_job_description(job_description: &str) -> Result<&str, AppError> {
    let trimmed = job_description.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("job_description is required".to_string()));
    }
    Ok(trimmed)
}

/// POST /api/v1/ai/optimize
pub async fn handle_optimize(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<OptimizeResponse>, AppError> {
    let job_description = require_job_description(&req.job_description)?;
    let mode = req.mode.unwrap_or(state.config.edit_mode);

    let outcome = run_optimize(&state, &claims.uid, job_description, mode).await?;

    Ok(Json(OptimizeResponse {
        message: "Resume optimized successfully".to_string(),
        changes_accumulated: outcome.changes_accumulated,
        patch_report: outcome.patch_report,
        document: outcome.document,
    }))
}

/// POST /api/v1/ai/ats
pub async fn handle_ats(
    State(state): State<AppState>,
    VerifiedUser(claims): VerifiedUser,
    Json(req): Json<AtsRequest>,
) -> Result<Json<AtsResponse>, AppError> {
    let job_description = require_job_description(&req.job_description)?;
    let report = run_ats(&state, &claims.uid, job_description).await?;
    Ok(Json(AtsResponse { message: report }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_job_description_rejected() {
        assert!(matches!(
            require_job_description("  \n"),
            Err(AppError::Validation(_))
        ));
        assert_eq!(require_job_description(" Rust dev ").unwrap(), "Rust dev");
    }

    #[test]
    fn test_request_mode_is_optional() {
        let req: OptimizeRequest =
            serde_json::from_str(r#"{"job_description":"Rust dev"}"#).unwrap();
        assert!(req.mode.is_none());

        let req: OptimizeRequest =
            serde_json::from_str(r#"{"job_description":"Rust dev","mode":"whole_document"}"#)
                .unwrap();
        assert_eq!(req.mode, Some(EditMode::WholeDocument));
    }
}
