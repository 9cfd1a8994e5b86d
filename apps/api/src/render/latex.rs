//! Deterministic LaTeX fragments: escaping, the resume header and the worked
//! example handed to the regenerator.

use crate::optimize::models::ExtractedProfile;

/// Escapes LaTeX special characters in running text.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes the characters hyperref does not accept raw inside `\href{...}`.
pub fn escape_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for c in url.chars() {
        match c {
            '%' | '#' | '\\' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Visible label for a link: scheme, `www.` and trailing slash removed.
fn link_label(url: &str) -> &str {
    let label = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let label = label.strip_prefix("www.").unwrap_or(label);
    label.strip_suffix('/').unwrap_or(label)
}

/// Renders the centered name / contact / links block. Empty fields are left
/// out; an entirely empty profile renders as an empty string.
pub fn render_header(profile: &ExtractedProfile) -> String {
    let mut lines = Vec::new();

    let name = profile.name.trim();
    if !name.is_empty() {
        lines.push(format!(r"{{\LARGE \textbf{{{}}}}}", escape_latex(name)));
    }

    let mut contact = Vec::new();
    for field in [&profile.location, &profile.phone] {
        let field = field.trim();
        if !field.is_empty() {
            contact.push(escape_latex(field));
        }
    }
    let email = profile.email.trim();
    if !email.is_empty() {
        contact.push(format!(
            r"\href{{mailto:{}}}{{{}}}",
            escape_url(email),
            escape_latex(email)
        ));
    }
    if !contact.is_empty() {
        lines.push(contact.join(r" $|$ "));
    }

    let links: Vec<String> = profile
        .links
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(|l| format!(r"\href{{{}}}{{{}}}", escape_url(l), escape_latex(link_label(l))))
        .collect();
    if !links.is_empty() {
        lines.push(links.join(r" $|$ "));
    }

    if lines.is_empty() {
        return String::new();
    }
    format!(
        "\\begin{{center}}\n{}\n\\end{{center}}",
        lines.join(" \\\\\n")
    )
}

/// A complete one-column resume that compiles with pdflatex and standard
/// packages only.
pub const EXAMPLE_TEMPLATE: &str = r##"\documentclass[11pt,letterpaper]{article}
\usepackage[margin=0.6in]{geometry}
\usepackage[hidelinks]{hyperref}
\usepackage{enumitem}
\usepackage{titlesec}
\usepackage[T1]{fontenc}

\pagestyle{empty}
\setlength{\parindent}{0pt}
\titleformat{\section}{\large\bfseries}{}{0em}{}[\titlerule]
\titlespacing*{\section}{0pt}{8pt}{4pt}
\setlist[itemize]{leftmargin=1.2em,itemsep=1pt,topsep=2pt,parsep=0pt}

\newcommand{\resumeEntry}[4]{%
  \textbf{#1} \hfill #2 \\
  \textit{#3} \hfill \textit{#4}
}

\begin{document}

\begin{center}
{\LARGE \textbf{Jane Doe}} \\
Toronto, ON $|$ (555) 010-0000 $|$ \href{mailto:jane@example.com}{jane@example.com} \\
\href{https://github.com/janedoe}{github.com/janedoe} $|$ \href{https://linkedin.com/in/janedoe}{linkedin.com/in/janedoe}
\end{center}

\section{Work Experience}
\resumeEntry{Acme Corp}{Toronto, ON}{Backend Engineer}{Jan 2022 -- Present}
\begin{itemize}
  \item Built Rust microservices on Kubernetes serving 2M requests per day
  \item Cut p99 latency by 40\% by moving hot paths to async I/O
\end{itemize}

\section{Education}
\resumeEntry{University of Toronto}{Toronto, ON}{B.Sc. Computer Science}{2017 -- 2021}

\section{Skills}
\textbf{Languages:} Rust, Python, SQL \\
\textbf{Tools:} PostgreSQL, Redis, Docker, Kubernetes

\end{document}
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_latex_special_characters() {
        assert_eq!(escape_latex("R&D 100% $5 #1 a_b"), r"R\&D 100\% \$5 \#1 a\_b");
        assert_eq!(escape_latex("{x}"), r"\{x\}");
        assert_eq!(escape_latex(r"a\b"), r"a\textbackslash{}b");
        assert_eq!(escape_latex("~^"), r"\textasciitilde{}\textasciicircum{}");
        assert_eq!(escape_latex("plain text"), "plain text");
    }

    #[test]
    fn test_escape_url_keeps_url_characters() {
        assert_eq!(
            escape_url("https://example.com/a_b~c?q=1#frag%20"),
            r"https://example.com/a_b~c?q=1\#frag\%20"
        );
    }

    #[test]
    fn test_link_label_strips_scheme() {
        assert_eq!(link_label("https://www.github.com/ada/"), "github.com/ada");
        assert_eq!(link_label("http://ada.dev"), "ada.dev");
        assert_eq!(link_label("ada.dev"), "ada.dev");
    }

    #[test]
    fn test_render_header_full_profile() {
        let profile = ExtractedProfile {
            name: "Ada Lovelace".to_string(),
            location: "London, UK".to_string(),
            phone: "+44 20 0000 0000".to_string(),
            email: "ada_l@example.com".to_string(),
            links: vec!["https://github.com/ada".to_string()],
        };
        let header = render_header(&profile);
        assert!(header.starts_with("\\begin{center}\n"));
        assert!(header.ends_with("\n\\end{center}"));
        assert!(header.contains(r"{\LARGE \textbf{Ada Lovelace}}"));
        assert!(header.contains(
            r"London, UK $|$ +44 20 0000 0000 $|$ \href{mailto:ada_l@example.com}{ada\_l@example.com}"
        ));
        assert!(header.contains(r"\href{https://github.com/ada}{github.com/ada}"));
    }

    #[test]
    fn test_render_header_skips_empty_fields() {
        let profile = ExtractedProfile {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            ..Default::default()
        };
        let header = render_header(&profile);
        assert!(!header.contains("$|$"));
        assert!(header.contains(r"\href{mailto:ada@example.com}{ada@example.com}"));
    }

    #[test]
    fn test_render_header_empty_profile() {
        assert_eq!(render_header(&ExtractedProfile::default()), "");
    }

    #[test]
    fn test_render_header_escapes_name() {
        let profile = ExtractedProfile {
            name: "Smith & Sons".to_string(),
            ..Default::default()
        };
        assert!(render_header(&profile).contains(r"Smith \& Sons"));
    }

    #[test]
    fn test_example_template_is_complete_document() {
        assert!(EXAMPLE_TEMPLATE.starts_with(r"\documentclass"));
        assert!(EXAMPLE_TEMPLATE.trim_end().ends_with(r"\end{document}"));
    }
}
