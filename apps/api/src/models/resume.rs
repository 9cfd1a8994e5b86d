use serde::Serialize;

/// The single active resume representation for a user.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeSource {
    /// Binary upload held in content storage. `model_file_id` is the handle
    /// registered with the LLM provider's file store, when one is live.
    File {
        key: String,
        filename: String,
        model_file_id: Option<String>,
    },
    /// Pasted plain text.
    Text(String),
}

impl ResumeSource {
    pub fn kind(&self) -> ResumeKind {
        match self {
            ResumeSource::File { .. } => ResumeKind::File,
            ResumeSource::Text(_) => ResumeKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeKind {
    File,
    Text,
}

/// Column image of a `ResumeSource` on the `users` row.
///
/// Every write goes through this type so that storing one representation
/// always nulls the others.
#[derive(Debug, Default, PartialEq)]
pub struct ResumeColumns {
    pub resume_text: Option<String>,
    pub resume_key: Option<String>,
    pub resume_filename: Option<String>,
    pub resume_model_file_id: Option<String>,
}

impl From<&ResumeSource> for ResumeColumns {
    fn from(source: &ResumeSource) -> Self {
        match source {
            ResumeSource::File {
                key,
                filename,
                model_file_id,
            } => ResumeColumns {
                resume_key: Some(key.clone()),
                resume_filename: Some(filename.clone()),
                resume_model_file_id: model_file_id.clone(),
                ..Default::default()
            },
            ResumeSource::Text(text) => ResumeColumns {
                resume_text: Some(text.clone()),
                ..Default::default()
            },
        }
    }
}
