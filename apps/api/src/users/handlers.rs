use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::{ResumeKind, ResumeSource};
use crate::models::user::UserRow;
use crate::state::AppState;
use crate::storage::{sanitize_filename, upload_key, PDF_CONTENT_TYPE};
use crate::users::store;

const PDF_MAGIC: &[u8] = b"%PDF-";
const DEFAULT_FILENAME: &str = "resume.pdf";

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadTextRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub email: String,
    pub credits: i32,
    pub membership: String,
    pub subscription_status: String,
    pub subscription_end: Option<DateTime<Utc>>,
    pub resume: Option<ResumeKind>,
    pub resume_filename: Option<String>,
    pub rendered_at: Option<DateTime<Utc>>,
}

impl From<UserRow> for ProfileResponse {
    fn from(user: UserRow) -> Self {
        let resume = user.resume_source().map(|s| s.kind());
        let resume_filename = match resume {
            Some(ResumeKind::File) => user.resume_filename,
            _ => None,
        };
        Self {
            email: user.email,
            credits: user.credits,
            membership: user.membership,
            subscription_status: user.subscription_status,
            subscription_end: user.subscription_end,
            resume,
            resume_filename,
            rendered_at: user.rendered_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    /// Storage key of an uploaded file; `null` for pasted text.
    pub resume_id: Option<String>,
}

/// POST /api/v1/user/create
pub async fn handle_create_user(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<ProfileResponse>), AppError> {
    // Fall back to the address on the token when the body leaves it out.
    let email = match req.email.trim() {
        "" => claims.email.as_deref().unwrap_or_default().trim(),
        email => email,
    };
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("A valid email is required".to_string()));
    }

    let user = store::create_user(&state.db, &claims.uid, email).await?;
    info!("Created user {} for {}", user.id, claims.uid);
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /api/v1/user/profile
pub async fn handle_profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = store::require_user(&state.db, &claims.uid).await?;
    Ok(Json(user.into()))
}

/// POST /api/v1/user/upload_resume
///
/// Accepts either a multipart form with a PDF in field `file` or a JSON
/// body `{"text": "..."}`. Either way the new resume replaces every other
/// representation.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    request: Request,
) -> Result<Json<UploadResponse>, AppError> {
    let user = store::require_user(&state.db, &claims.uid).await?;

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let (source, resume_id) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        let (bytes, filename) = read_pdf_field(multipart, state.config.max_upload_bytes).await?;
        let source = store_file(&state, &user, bytes, filename).await?;
        let key = match &source {
            ResumeSource::File { key, .. } => Some(key.clone()),
            ResumeSource::Text(_) => None,
        };
        (source, key)
    } else {
        let Json(body) = Json::<UploadTextRequest>::from_request(request, &state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        let text = body.text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Resume text must not be empty".to_string()));
        }
        (ResumeSource::Text(text.to_string()), None)
    };

    if let Some(old_file) = &user.resume_model_file_id {
        if let Err(e) = state.llm.delete_file(old_file).await {
            warn!("Failed to release replaced model file {old_file}: {e}");
        }
    }
    store::set_resume_source(&state.db, user.id, &source).await?;
    info!("User {} uploaded a {:?} resume", user.id, source.kind());

    Ok(Json(UploadResponse {
        message: "Resume uploaded successfully".to_string(),
        resume_id,
    }))
}

/// Pulls the `file` field out of the form and checks it is a PDF.
async fn read_pdf_field(
    mut multipart: Multipart,
    max_bytes: usize,
) -> Result<(Vec<u8>, String), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(sanitize_filename)
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;
        validate_pdf(&bytes, max_bytes)?;
        return Ok((bytes.to_vec(), filename));
    }
    Err(AppError::Validation("Missing 'file' field".to_string()))
}

fn validate_pdf(bytes: &[u8], max_bytes: usize) -> Result<(), AppError> {
    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "Uploaded file exceeds {max_bytes} bytes"
        )));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(AppError::Validation("Only PDF resumes are supported".to_string()));
    }
    Ok(())
}

/// Stores the upload and registers it with the model's file store. A failed
/// registration is retried lazily by the next run.
async fn store_file(
    state: &AppState,
    user: &UserRow,
    bytes: Vec<u8>,
    filename: String,
) -> Result<ResumeSource, AppError> {
    let key = upload_key(user.id, &filename);
    state.storage.put(&key, bytes.clone(), PDF_CONTENT_TYPE).await?;

    let model_file_id = match state.llm.upload_file(bytes, &filename).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Model file registration deferred for user {}: {e}", user.id);
            None
        }
    };

    Ok(ResumeSource::File {
        key,
        filename,
        model_file_id,
    })
}

/// GET /api/v1/user/retrieve_resume
pub async fn handle_retrieve_resume(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Response, AppError> {
    let user = store::require_user(&state.db, &claims.uid).await?;
    let key = user
        .rendered_key
        .as_deref()
        .ok_or_else(|| AppError::NotFound("No optimized resume found".to_string()))?;

    let bytes = state.storage.get(key).await?;
    let filename = user
        .rendered_filename
        .as_deref()
        .map(sanitize_filename)
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string());

    Ok((
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
