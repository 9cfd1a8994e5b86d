// All LLM prompt templates for the optimization pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Structure extraction prompt. No placeholders.
pub const STRUCTURE_PROMPT: &str = "Look at the resume and extract the candidate's personal \
details and the list of sections it contains.

Personal details: full name, location (city / region as written), phone number and email \
address exactly as written. Use an empty string for anything that is not present. \
List every URL written in the resume under links (portfolio, GitHub, LinkedIn, ...).

Sections: return the section headings in the order they appear. Common sections are: \
Summary/Objective, Work Experience, Education, Skills, Projects, Extracurricular Activities, \
Languages, Volunteering Experience, Hobbies & Interests.";

/// Per-section edit prompt.
/// Replace: {expert}, {verbatim}, {section}, {job_description}
pub const SECTION_EDIT_PROMPT: &str = r#"{expert}

Using the resume and the job description below, optimize the "{section}" section to make this resume the best possible candidate for the role. Your goal is to improve the ATS score by including key terms from the job description, with extra emphasis on recurring terms.

{verbatim}

RULES:
1. Only edit bullet points of the "{section}" section. Never touch headings, dates, names or contact details.
2. Aim for about 60-70 characters per new line.
3. Never invent employers, titles, degrees, dates or metrics that are not in the resume.
4. Return ONLY this JSON object, no whitespace formatting, no code block, no citations:
{"changes":[["Old line","New line"],["Another old line","Another new line"]]}
5. If nothing in this section should change, return {"changes":[]}

JOB DESCRIPTION:
{job_description}"#;

/// Whole-document edit prompt.
/// Replace: {expert}, {verbatim}, {sections}, {job_description}
pub const DOCUMENT_EDIT_PROMPT: &str = r#"{expert}

Using the resume and the job description below, optimize the whole resume to make it the best possible candidate for the role. Your goal is to improve the ATS score by including key terms from the job description, with extra emphasis on recurring terms.

The resume contains these sections: {sections}

{verbatim}

RULES:
1. Only edit bullet points. Never touch headings, dates, names or contact details.
2. Aim for about 60-70 characters per new line.
3. Never invent employers, titles, degrees, dates or metrics that are not in the resume.
4. Order the changes as they appear in the resume, top to bottom.
5. Return ONLY this JSON object, no whitespace formatting, no code block, no citations:
{"changes":[["Old line","New line"],["Another old line","Another new line"]]}

JOB DESCRIPTION:
{job_description}"#;

/// System prompt for LaTeX regeneration.
pub const REGENERATE_SYSTEM: &str = "You are an expert LaTeX typesetter for resumes. \
You respond with a complete, compilable LaTeX document and nothing else: \
no markdown code fences, no commentary, no explanations.";

/// Regeneration prompt.
/// Replace: {header}, {edits_json}, {example}
pub const REGENERATE_PROMPT: &str = r#"Re-create the resume above as a complete LaTeX document.

Apply EVERY change below: wherever the "old_text" appears, write the "new_text" instead. Keep all other content exactly as it is in the resume: every section, entry, date and bullet, in the same order. Do not add or drop content.

CHANGES (JSON):
{edits_json}

Start the document body with this header, verbatim:
{header}

LaTeX rules:
1. Follow the structure and macros of the example template below; it compiles with pdflatex and only standard packages.
2. Escape LaTeX special characters in resume text: & % $ # _ { } ~ ^ and backslash.
3. Return raw LaTeX starting with \documentclass and ending with \end{document}. No code fences, no commentary.

EXAMPLE TEMPLATE:
{example}"#;

/// Keyword extraction prompt for ATS scoring.
/// Replace: {job_description}
pub const ATS_KEYWORDS_PROMPT: &str = r#"Extract the keywords an applicant tracking system would screen for in this job description: hard skills, tools, technologies, certifications, methodologies and domain terms. Skip generic words ("team", "passionate", "experience").

For every keyword give:
- keyword: the shortest canonical form as written in the posting ("Kubernetes", "CI/CD")
- frequency: how many times it (or an obvious variant) appears
- weighted_score: 1.0 for nice-to-have, 2.0 for explicitly required, multiplied by frequency

JOB DESCRIPTION:
{job_description}"#;
