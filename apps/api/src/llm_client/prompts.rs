// Shared prompt constants.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include citations, explanations or apologies.";

/// Persona shared by every resume-editing prompt.
pub const RESUME_EXPERT: &str = "You are an expert in making resumes that catch the \
    attention of recruiters, hiring managers and applicant tracking systems (ATS).";

/// Instruction that makes edit pairs usable for exact find/replace.
pub const VERBATIM_INSTRUCTION: &str = "\
    CRITICAL: For every line you change, give the EXACT old line in FULL, character for \
    character as it appears in the resume, and the complete new line. \
    The old line will be located with a literal CTRL+F search; \
    if it is paraphrased, truncated or re-punctuated the edit is discarded.";

/// Substitutes `{key}` placeholders in a single pass.
///
/// Inserted values are never scanned again, so text from a resume, a job
/// description or a model reply cannot expand another placeholder. Braces
/// that do not name a known key are kept as written.
pub fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let known = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, close))
        });
        match known {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
