//! ATS Scorer: model-extracted job keywords, deterministic matching.
//!
//! Algorithm:
//! 1. The model lists the posting's keywords with frequency and weight.
//! 2. Each keyword (deduplicated case-insensitively) is looked up in the
//!    resume text, case-insensitive, on alphanumeric word boundaries.
//! 3. score = Σ(weight of matched) / Σ(weight) × 100, rounded.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::llm_client::prompts::{fill_template, JSON_ONLY_SYSTEM};
use crate::llm_client::{ContentPart, LlmClient, LlmError, OutputSchema};
use crate::optimize::prompts::ATS_KEYWORDS_PROMPT;

/// A single keyword from the job description, weighted by importance and frequency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub keyword: String,
    pub frequency: u32,
    pub weighted_score: f32,
}

impl KeywordEntry {
    fn weight(&self) -> f32 {
        if self.weighted_score.is_finite() && self.weighted_score > 0.0 {
            self.weighted_score
        } else {
            self.frequency.max(1) as f32
        }
    }
}

#[derive(Debug, Deserialize)]
struct KeywordPayload {
    keywords: Vec<KeywordEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtsReport {
    /// 0 – 100
    pub score: u32,
    pub matched_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
}

fn keywords_schema() -> OutputSchema {
    OutputSchema {
        name: "job_keywords",
        schema: json!({
            "type": "object",
            "properties": {
                "keywords": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "keyword": {"type": "string"},
                            "frequency": {"type": "integer"},
                            "weighted_score": {"type": "number"}
                        },
                        "required": ["keyword", "frequency", "weighted_score"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["keywords"],
            "additionalProperties": false
        }),
    }
}

/// Extracts weighted keywords from a job description.
pub async fn extract_job_keywords(
    llm: &LlmClient,
    job_description: &str,
) -> Result<Vec<KeywordEntry>, LlmError> {
    let prompt = fill_template(ATS_KEYWORDS_PROMPT, &[("job_description", job_description)]);
    let payload: KeywordPayload = llm
        .call_json(
            JSON_ONLY_SYSTEM,
            &[ContentPart::text(prompt)],
            Some(&keywords_schema()),
        )
        .await?;
    info!("Extracted {} job keywords", payload.keywords.len());
    Ok(payload.keywords)
}

/// Scores resume text against the keyword inventory.
pub fn score_resume(resume_text: &str, keywords: &[KeywordEntry]) -> AtsReport {
    let haystack = resume_text.to_lowercase();
    let mut seen: Vec<String> = Vec::new();
    let mut matched_keywords = Vec::new();
    let mut missing_keywords = Vec::new();
    let mut total_weight = 0.0_f32;
    let mut matched_weight = 0.0_f32;

    for entry in keywords {
        let keyword = entry.keyword.trim();
        if keyword.is_empty() {
            continue;
        }
        let needle = keyword.to_lowercase();
        if seen.contains(&needle) {
            continue;
        }
        seen.push(needle.clone());

        let weight = entry.weight();
        total_weight += weight;
        if contains_term(&haystack, &needle) {
            matched_weight += weight;
            matched_keywords.push(keyword.to_string());
        } else {
            missing_keywords.push(keyword.to_string());
        }
    }

    let score = if total_weight > 0.0 {
        ((matched_weight / total_weight) * 100.0).round() as u32
    } else {
        0
    };

    AtsReport {
        score: score.min(100),
        matched_keywords,
        missing_keywords,
    }
}

/// True when `needle` occurs in `haystack` not glued to other letters or digits.
/// Both sides are expected lowercased.
fn contains_term(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
