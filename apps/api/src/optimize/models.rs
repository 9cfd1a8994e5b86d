//! Data exchanged between the optimization pipeline stages.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::llm_client::ContentPart;

/// Free-text section label as reported by the model ("Work Experience").
pub type SectionName = String;

/// The resume as the model sees it: an opaque file handle or inline text.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeInput {
    File { file_id: String },
    Text(String),
}

impl ResumeInput {
    pub fn content_part(&self) -> ContentPart {
        match self {
            ResumeInput::File { file_id } => ContentPart::InputFile {
                file_id: file_id.clone(),
            },
            ResumeInput::Text(text) => ContentPart::text(format!("RESUME:\n{text}")),
        }
    }

    /// Resume reference followed by the instruction prompt.
    pub fn with_prompt(&self, prompt: String) -> [ContentPart; 2] {
        [self.content_part(), ContentPart::text(prompt)]
    }
}

/// Personal details pulled from the resume header. Lives for one run only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedProfile {
    pub name: String,
    pub location: String,
    pub phone: String,
    pub email: String,
    pub links: Vec<String>,
}

impl ExtractedProfile {
    /// Appends links not already present, keeping first-seen order.
    pub fn merge_links(&mut self, links: impl IntoIterator<Item = String>) {
        for link in links {
            if !self.links.iter().any(|existing| existing == &link) {
                self.links.push(link);
            }
        }
    }
}

/// An exact old-text/new-text substitution.
///
/// Only meaningful against the resume snapshot it was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditPair {
    pub old_text: String,
    pub new_text: String,
}

/// Model wire format for edit lists: `{"changes": [[old, new], ...]}`.
/// Each inner array must hold exactly two strings.
#[derive(Debug, Deserialize)]
pub struct ChangesPayload {
    pub changes: Vec<(String, String)>,
}

impl ChangesPayload {
    /// Drops pairs that cannot be applied as a literal replacement
    /// (empty search text) or that change nothing.
    pub fn into_pairs(self) -> Vec<EditPair> {
        self.changes
            .into_iter()
            .filter(|(old, new)| !old.trim().is_empty() && old != new)
            .map(|(old_text, new_text)| EditPair { old_text, new_text })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// One model call per detected section, issued concurrently.
    PerSection,
    /// A single model call covering every section.
    WholeDocument,
}

impl FromStr for EditMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "per_section" => Ok(EditMode::PerSection),
            "whole_document" => Ok(EditMode::WholeDocument),
            other => Err(format!("unknown edit mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Ok,
    Failed,
}

/// Edits proposed for one section. `section` is `None` in whole-document mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionEdits {
    pub section: Option<SectionName>,
    pub status: SectionStatus,
    pub edits: Vec<EditPair>,
}

impl SectionEdits {
    pub fn ok(section: Option<SectionName>, edits: Vec<EditPair>) -> Self {
        Self {
            section,
            status: SectionStatus::Ok,
            edits,
        }
    }

    pub fn failed(section: Option<SectionName>) -> Self {
        Self {
            section,
            status: SectionStatus::Failed,
            edits: Vec::new(),
        }
    }
}

/// Every edit proposed in one run, in section order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EditBatch(pub Vec<SectionEdits>);

impl EditBatch {
    pub fn edits(&self) -> Vec<EditPair> {
        self.0
            .iter()
            .flat_map(|section| section.edits.iter().cloned())
            .collect()
    }

    pub fn any_succeeded(&self) -> bool {
        self.0.iter().any(|s| s.status == SectionStatus::Ok)
    }
}
