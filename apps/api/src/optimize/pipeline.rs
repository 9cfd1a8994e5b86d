//! Optimization orchestrator.
//!
//! One run works on one resume snapshot from start to finish:
//! 1. Allowance check, then the per-user run lock (409 while held)
//! 2. Resolve the resume into a model reference plus plain text and links
//! 3. Structure Extractor → Edit Proposer → Patch Applier
//! 4. Regenerator → Renderer → content storage, user pointer updated
//! 5. Model file handle released, credit spent, lock released
//!
//! Model and renderer failures degrade the result (`failed` sections,
//! `document: None`); they never fail the run, and a completed run always
//! costs a credit.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::resume::ResumeSource;
use crate::models::user::UserRow;
use crate::optimize::ats::{extract_job_keywords, score_resume, AtsReport};
use crate::optimize::extractor::extract_structure;
use crate::optimize::links::{extract_pdf_links, extract_text_links};
use crate::optimize::lock::RunLock;
use crate::optimize::models::{EditBatch, EditMode, EditPair, ExtractedProfile, ResumeInput};
use crate::optimize::patch::{apply_edits, PatchReport};
use crate::optimize::proposer::propose_edits;
use crate::optimize::regenerator::regenerate_document;
use crate::state::AppState;
use crate::storage::{rendered_key, PDF_CONTENT_TYPE};
use crate::users::store;

/// Pointer to the PDF produced by a run.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedDocument {
    pub filename: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OptimizeOutcome {
    pub changes_accumulated: EditBatch,
    pub patch_report: PatchReport,
    pub document: Option<RenderedDocument>,
}

/// A resume resolved for one run.
struct PreparedResume {
    input: ResumeInput,
    /// Plain text the edits are verified against. Empty when the PDF has no
    /// extractable text layer.
    plain_text: String,
    links: Vec<String>,
    /// Model file handle to release when the run ends.
    model_file: Option<String>,
    /// Base name for the rendered PDF.
    filename: String,
}

pub async fn run_optimize(
    state: &AppState,
    firebase_id: &str,
    job_description: &str,
    mode: EditMode,
) -> Result<OptimizeOutcome, AppError> {
    let user = store::require_user(&state.db, firebase_id).await?;
    ensure_allowance(&user)?;

    let lock = RunLock::acquire(&state.redis, user.id)
        .await?
        .ok_or_else(|| AppError::Conflict("An optimization is already running".to_string()))?;

    let result = run_locked(state, firebase_id, job_description, mode).await;
    lock.release(&state.redis).await;
    result
}

async fn run_locked(
    state: &AppState,
    firebase_id: &str,
    job_description: &str,
    mode: EditMode,
) -> Result<OptimizeOutcome, AppError> {
    // Re-read under the lock: credits or the resume may have changed.
    let user = store::require_user(&state.db, firebase_id).await?;
    ensure_allowance(&user)?;
    let source = user
        .resume_source()
        .ok_or_else(|| AppError::NotFound("No resume uploaded".to_string()))?;

    let prepared = prepare_resume(state, &user, source).await?;
    let outcome = optimize_prepared(state, &user, &prepared, job_description, mode).await;

    if let Some(file_id) = &prepared.model_file {
        release_model_file(state, &user, file_id).await;
    }

    let outcome = outcome?;
    let remaining = store::consume_credit(&state.db, user.id).await?;
    info!("User {} spent a credit, {remaining} left", user.id);
    Ok(outcome)
}

async fn optimize_prepared(
    state: &AppState,
    user: &UserRow,
    prepared: &PreparedResume,
    job_description: &str,
    mode: EditMode,
) -> Result<OptimizeOutcome, AppError> {
    let (mut profile, sections) = match extract_structure(&state.llm, &prepared.input).await {
        Some(structure) => (structure.profile, structure.sections),
        None => (ExtractedProfile::default(), Vec::new()),
    };
    profile.merge_links(prepared.links.iter().cloned());

    let batch = propose_edits(&state.llm, &prepared.input, job_description, &sections, mode).await;
    let (_, patch_report) = apply_edits(&prepared.plain_text, &batch.edits());
    info!(
        "Patch verification: {} applied, {} skipped",
        patch_report.applied_count(),
        patch_report.skipped.len()
    );

    let regen_edits = regeneration_edits(prepared, &batch, &patch_report);

    let document = if regen_edits.is_empty() && !batch.any_succeeded() {
        None
    } else {
        render_and_store(state, user, &prepared.input, &regen_edits, &profile, &prepared.filename)
            .await?
    };

    Ok(OptimizeOutcome {
        changes_accumulated: batch,
        patch_report,
        document,
    })
}

/// Edits the regenerator applies to the original resume: the verified ones,
/// or every proposed edit when the PDF has no text layer to verify against.
fn regeneration_edits(
    prepared: &PreparedResume,
    batch: &EditBatch,
    report: &PatchReport,
) -> Vec<EditPair> {
    match &prepared.input {
        ResumeInput::File { .. } if prepared.plain_text.trim().is_empty() => {
            warn!("No text layer to verify edits against, forwarding all proposed edits");
            batch.edits()
        }
        _ => report.applied.clone(),
    }
}

/// Regenerates, renders and stores the document. Regeneration and render
/// failures yield `None`; a storage failure is an error.
async fn render_and_store(
    state: &AppState,
    user: &UserRow,
    input: &ResumeInput,
    edits: &[EditPair],
    profile: &ExtractedProfile,
    filename: &str,
) -> Result<Option<RenderedDocument>, AppError> {
    let latex = match regenerate_document(&state.llm, input, edits, profile).await {
        Ok(latex) => latex,
        Err(e) => {
            warn!("Regeneration failed for user {}: {e}", user.id);
            return Ok(None);
        }
    };

    let pdf = match state.renderer.render(&latex, &user.id.to_string()).await {
        Ok(pdf) => pdf,
        Err(e) => {
            warn!("Render failed for user {}: {e}", user.id);
            return Ok(None);
        }
    };

    let key = rendered_key(user.id);
    let filename = rendered_filename(filename);
    state.storage.put(&key, pdf, PDF_CONTENT_TYPE).await?;
    let created_at = store::set_rendered(&state.db, user.id, &key, &filename).await?;

    Ok(Some(RenderedDocument {
        filename,
        created_at,
    }))
}

async fn prepare_resume(
    state: &AppState,
    user: &UserRow,
    source: ResumeSource,
) -> Result<PreparedResume, AppError> {
    match source {
        ResumeSource::Text(text) => Ok(PreparedResume {
            links: extract_text_links(&text),
            input: ResumeInput::Text(text.clone()),
            plain_text: text,
            model_file: None,
            filename: "resume.pdf".to_string(),
        }),
        ResumeSource::File {
            key,
            filename,
            model_file_id,
        } => {
            let bytes = state.storage.get(&key).await?;
            let (bytes, plain_text, links) = read_pdf(bytes).await?;

            let file_id = match model_file_id {
                Some(id) => id,
                None => {
                    let id = state
                        .llm
                        .upload_file(bytes, &filename)
                        .await
                        .map_err(|e| AppError::Llm(format!("Resume file registration failed: {e}")))?;
                    if let Err(e) = store::set_model_file(&state.db, user.id, &key, &id).await {
                        warn!("Could not record model file {id}: {e}");
                    }
                    id
                }
            };

            Ok(PreparedResume {
                input: ResumeInput::File {
                    file_id: file_id.clone(),
                },
                plain_text,
                links,
                model_file: Some(file_id),
                filename,
            })
        }
    }
}

/// Text layer and link annotations of a PDF, off the async executor.
/// Returns the bytes back for reuse.
async fn read_pdf(bytes: Vec<u8>) -> Result<(Vec<u8>, String, Vec<String>), AppError> {
    tokio::task::spawn_blocking(move || {
        let text = pdf_text(&bytes);
        let links = extract_pdf_links(&bytes);
        (bytes, text, links)
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed reading PDF: {e}")))
}

fn pdf_text(bytes: &[u8]) -> String {
    // pdf-extract panics on some malformed documents.
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("PDF text extraction failed: {e}");
            String::new()
        }
        Err(_) => {
            warn!("PDF text extraction panicked");
            String::new()
        }
    }
}

async fn release_model_file(state: &AppState, user: &UserRow, file_id: &str) {
    if let Err(e) = state.llm.delete_file(file_id).await {
        warn!("Failed to release model file {file_id}: {e}");
        return;
    }
    if let Err(e) = store::clear_model_file(&state.db, user.id, file_id).await {
        warn!("Failed to clear model file {file_id} for user {}: {e}", user.id);
    }
}

fn ensure_allowance(user: &UserRow) -> Result<(), AppError> {
    if user.has_run_allowance() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not enough credits".to_string()))
    }
}

/// `cv.pdf` → `cv-optimized.pdf`
fn rendered_filename(original: &str) -> String {
    let stem = original
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(original)
        .trim();
    let stem = if stem.is_empty() { "resume" } else { stem };
    format!("{stem}-optimized.pdf")
}

/// Scores the current resume against a job description. Does not spend credit.
pub async fn run_ats(
    state: &AppState,
    firebase_id: &str,
    job_description: &str,
) -> Result<AtsReport, AppError> {
    let user = store::require_user(&state.db, firebase_id).await?;
    ensure_allowance(&user)?;
    let source = user
        .resume_source()
        .ok_or_else(|| AppError::NotFound("No resume uploaded".to_string()))?;

    let text = match source {
        ResumeSource::Text(text) => text,
        ResumeSource::File { key, .. } => {
            let bytes = state.storage.get(&key).await?;
            let (_, text, _) = read_pdf(bytes).await?;
            text
        }
    };
    if text.trim().is_empty() {
        return Err(AppError::Validation(
            "No readable text found in the resume".to_string(),
        ));
    }

    let keywords = extract_job_keywords(&state.llm, job_description)
        .await
        .map_err(|e| AppError::Llm(format!("Keyword extraction failed: {e}")))?;
    let report = score_resume(&text, &keywords);
    info!("ATS score for user {}: {}", user.id, report.score);
    Ok(report)
}
