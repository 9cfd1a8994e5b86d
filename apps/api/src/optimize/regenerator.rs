//! Document Regenerator: the model rewrites the whole resume as LaTeX with
//! the verified edits applied.

use tracing::info;

use crate::llm_client::prompts::fill_template;
use crate::llm_client::{LlmClient, LlmError};
use crate::optimize::models::{EditPair, ExtractedProfile, ResumeInput};
use crate::optimize::prompts::{REGENERATE_PROMPT, REGENERATE_SYSTEM};
use crate::render::latex::{render_header, EXAMPLE_TEMPLATE};

const NO_HEADER: &str = "(no personal details were extracted; take them from the resume)";

/// Returns the raw LaTeX source. Fences are stripped, syntax is not checked.
pub async fn regenerate_document(
    llm: &LlmClient,
    resume: &ResumeInput,
    edits: &[EditPair],
    profile: &ExtractedProfile,
) -> Result<String, LlmError> {
    let prompt = build_regenerate_prompt(edits, profile)?;
    let latex = llm
        .call_text(REGENERATE_SYSTEM, &resume.with_prompt(prompt))
        .await?;
    info!("Regenerated LaTeX document ({} chars)", latex.len());
    Ok(latex)
}

fn build_regenerate_prompt(
    edits: &[EditPair],
    profile: &ExtractedProfile,
) -> Result<String, LlmError> {
    let edits_json = serde_json::to_string_pretty(edits)?;
    let header = render_header(profile);
    let header = if header.is_empty() {
        NO_HEADER.to_string()
    } else {
        header
    };
    Ok(fill_template(
        REGENERATE_PROMPT,
        &[
            ("header", &header),
            ("example", EXAMPLE_TEMPLATE),
            ("edits_json", &edits_json),
        ],
    ))
}
