//! Structure Extractor: personal details and section names from a resume.

use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{LlmClient, OutputSchema};
use crate::optimize::models::{ExtractedProfile, ResumeInput, SectionName};
use crate::optimize::prompts::STRUCTURE_PROMPT;

#[derive(Debug, Deserialize)]
struct StructurePayload {
    name: String,
    location: String,
    phone: String,
    email: String,
    links: Vec<String>,
    sections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResumeStructure {
    pub profile: ExtractedProfile,
    pub sections: Vec<SectionName>,
}

fn structure_schema() -> OutputSchema {
    OutputSchema {
        name: "resume_structure",
        schema: json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "location": {"type": "string"},
                "phone": {"type": "string"},
                "email": {"type": "string"},
                "links": {"type": "array", "items": {"type": "string"}},
                "sections": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["name", "location", "phone", "email", "links", "sections"],
            "additionalProperties": false
        }),
    }
}

/// Asks the model for the resume's structure.
///
/// Returns `None` (logged, never an error) when the model produces nothing
/// or output that does not match the schema. No retry.
pub async fn extract_structure(llm: &LlmClient, resume: &ResumeInput) -> Option<ResumeStructure> {
    let content = resume.with_prompt(STRUCTURE_PROMPT.to_string());
    match llm
        .call_json::<StructurePayload>(JSON_ONLY_SYSTEM, &content, Some(&structure_schema()))
        .await
    {
        Ok(payload) => {
            let structure = into_structure(payload);
            info!("Extracted {} sections", structure.sections.len());
            Some(structure)
        }
        Err(e) => {
            warn!("Structure extraction failed: {e}");
            None
        }
    }
}

fn into_structure(payload: StructurePayload) -> ResumeStructure {
    let mut profile = ExtractedProfile {
        name: payload.name.trim().to_string(),
        location: payload.location.trim().to_string(),
        phone: payload.phone.trim().to_string(),
        email: payload.email.trim().to_string(),
        links: Vec::new(),
    };
    profile.merge_links(
        payload
            .links
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
    );

    ResumeStructure {
        profile,
        sections: normalize_sections(payload.sections),
    }
}

/// Trims labels and drops empty or repeated ones, preserving model order.
fn normalize_sections(sections: Vec<String>) -> Vec<SectionName> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for section in sections {
        let label = section.trim();
        if label.is_empty() {
            continue;
        }
        let key = label.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(label.to_string());
    }
    out
}
