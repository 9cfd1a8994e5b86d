//! Edit Proposer: asks the model for exact old/new line pairs.
//!
//! Per-section mode fans out one call per section and joins them; every
//! call recovers locally, so one failed section never sinks the batch.

use futures::future::join_all;
use serde_json::json;
use tracing::{info, warn};

use crate::llm_client::prompts::{
    fill_template, JSON_ONLY_SYSTEM, RESUME_EXPERT, VERBATIM_INSTRUCTION,
};
use crate::llm_client::{LlmClient, OutputSchema};
use crate::optimize::models::{
    ChangesPayload, EditBatch, EditMode, ResumeInput, SectionEdits, SectionName,
};
use crate::optimize::prompts::{DOCUMENT_EDIT_PROMPT, SECTION_EDIT_PROMPT};

fn changes_schema() -> OutputSchema {
    OutputSchema {
        name: "resume_changes",
        schema: json!({
            "type": "object",
            "properties": {
                "changes": {
                    "type": "array",
                    "items": {"type": "array", "items": {"type": "string"}}
                }
            },
            "required": ["changes"],
            "additionalProperties": false
        }),
    }
}

/// Proposes edits for a resume snapshot.
///
/// Per-section mode needs at least one known section; without any it falls
/// back to a single whole-document call.
pub async fn propose_edits(
    llm: &LlmClient,
    resume: &ResumeInput,
    job_description: &str,
    sections: &[SectionName],
    mode: EditMode,
) -> EditBatch {
    match mode {
        EditMode::PerSection if !sections.is_empty() => {
            let calls = sections
                .iter()
                .map(|section| propose_for_section(llm, resume, job_description, section));
            EditBatch(join_all(calls).await)
        }
        EditMode::PerSection => {
            warn!("No sections known, proposing edits for the whole document");
            EditBatch(vec![
                propose_for_document(llm, resume, job_description, sections).await,
            ])
        }
        EditMode::WholeDocument => EditBatch(vec![
            propose_for_document(llm, resume, job_description, sections).await,
        ]),
    }
}

async fn propose_for_section(
    llm: &LlmClient,
    resume: &ResumeInput,
    job_description: &str,
    section: &SectionName,
) -> SectionEdits {
    let prompt = build_section_prompt(section, job_description);
    match request_changes(llm, resume, prompt).await {
        Some(payload) => {
            let edits = payload.into_pairs();
            info!("Section '{section}': {} edits proposed", edits.len());
            SectionEdits::ok(Some(section.clone()), edits)
        }
        None => {
            warn!("Section '{section}': no usable edits");
            SectionEdits::failed(Some(section.clone()))
        }
    }
}

async fn propose_for_document(
    llm: &LlmClient,
    resume: &ResumeInput,
    job_description: &str,
    sections: &[SectionName],
) -> SectionEdits {
    let prompt = build_document_prompt(sections, job_description);
    match request_changes(llm, resume, prompt).await {
        Some(payload) => {
            let edits = payload.into_pairs();
            info!("Whole document: {} edits proposed", edits.len());
            SectionEdits::ok(None, edits)
        }
        None => SectionEdits::failed(None),
    }
}

async fn request_changes(
    llm: &LlmClient,
    resume: &ResumeInput,
    prompt: String,
) -> Option<ChangesPayload> {
    let content = resume.with_prompt(prompt);
    llm.call_json::<ChangesPayload>(JSON_ONLY_SYSTEM, &content, Some(&changes_schema()))
        .await
        .map_err(|e| warn!("Edit proposal call failed: {e}"))
        .ok()
}

fn build_section_prompt(section: &str, job_description: &str) -> String {
    fill_template(
        SECTION_EDIT_PROMPT,
        &[
            ("expert", RESUME_EXPERT),
            ("verbatim", VERBATIM_INSTRUCTION),
            ("section", section),
            ("job_description", job_description),
        ],
    )
}

fn build_document_prompt(sections: &[SectionName], job_description: &str) -> String {
    let sections = if sections.is_empty() {
        "(not detected, infer them from the resume)".to_string()
    } else {
        sections.join(", ")
    };
    fill_template(
        DOCUMENT_EDIT_PROMPT,
        &[
            ("expert", RESUME_EXPERT),
            ("verbatim", VERBATIM_INSTRUCTION),
            ("sections", &sections),
            ("job_description", job_description),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const JD: &str = "Senior Rust Engineer. Required: Rust, Kubernetes, distributed systems.";

    #[test]
    fn test_section_prompt_names_section_and_targets_line_length() {
        let prompt = build_section_prompt("Work Experience", JD);
        assert!(prompt.contains("optimize the \"Work Experience\" section"));
        assert!(prompt.contains("60-70 characters"));
        assert!(prompt.contains("EXACT old line"));
        assert!(prompt.ends_with(JD));
        assert!(!prompt.contains("{section}"));
        assert!(!prompt.contains("{expert}"));
    }

    #[test]
    fn test_document_prompt_embeds_section_list() {
        let sections = vec!["Work Experience".to_string(), "Projects".to_string()];
        let prompt = build_document_prompt(&sections, JD);
        assert!(prompt.contains("The resume contains these sections: Work Experience, Projects"));
        assert!(prompt.contains(r#"{"changes":[["Old line","New line"]"#));
        assert!(!prompt.contains("{sections}"));
    }

    #[test]
    fn test_section_name_placeholders_are_not_expanded() {
        let prompt = build_section_prompt("Skills {job_description}", JD);
        assert!(prompt.contains("Skills {job_description}"));
        assert_eq!(prompt.matches(JD).count(), 1);
    }

    #[test]
    fn test_document_prompt_without_sections() {
        let prompt = build_document_prompt(&[], JD);
        assert!(prompt.contains("not detected"));
    }

    #[test]
    fn test_job_description_placeholders_are_not_reexpanded() {
        let prompt = build_section_prompt("Skills", "Mention {section} literally");
        assert!(prompt.ends_with("Mention {section} literally"));
    }

    #[test]
    fn test_changes_schema_is_strict() {
        let schema = changes_schema();
        assert_eq!(schema.schema["additionalProperties"], false);
        assert_eq!(schema.schema["required"][0], "changes");
    }
}
