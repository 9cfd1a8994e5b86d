//! Patch Applier: literal find/replace of edit pairs over resume text.
//!
//! Matching is byte-for-byte. A pair whose `old_text` is absent is skipped
//! and reported; it is never forced in and never matched approximately.

use serde::Serialize;

use crate::optimize::models::EditPair;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatchReport {
    pub applied: Vec<EditPair>,
    pub skipped: Vec<EditPair>,
}

impl PatchReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

/// Applies `edits` to `document` in one pass.
///
/// Every `old_text` is located in the original `document`, never in text an
/// earlier pair produced. A pair is skipped when its `old_text` is empty or
/// absent, or when any of its occurrences overlaps a range an earlier pair
/// already claimed. Every occurrence of an applied `old_text` is replaced.
pub fn apply_edits(document: &str, edits: &[EditPair]) -> (String, PatchReport) {
    let mut claimed: Vec<(usize, usize, usize)> = Vec::new();
    let mut report = PatchReport::default();

    for edit in edits {
        if edit.old_text.is_empty() {
            report.skipped.push(edit.clone());
            continue;
        }
        let ranges: Vec<(usize, usize)> = document
            .match_indices(edit.old_text.as_str())
            .map(|(start, matched)| (start, start + matched.len()))
            .collect();
        let overlaps = ranges.iter().any(|&(start, end)| {
            claimed
                .iter()
                .any(|&(c_start, c_end, _)| start < c_end && c_start < end)
        });
        if ranges.is_empty() || overlaps {
            report.skipped.push(edit.clone());
            continue;
        }

        let index = report.applied.len();
        claimed.extend(ranges.into_iter().map(|(start, end)| (start, end, index)));
        report.applied.push(edit.clone());
    }

    claimed.sort_unstable_by_key(|&(start, _, _)| start);
    let mut text = String::with_capacity(document.len());
    let mut cursor = 0;
    for (start, end, index) in claimed {
        text.push_str(&document[cursor..start]);
        text.push_str(&report.applied[index].new_text);
        cursor = end;
    }
    text.push_str(&document[cursor..]);

    (text, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(old: &str, new: &str) -> EditPair {
        EditPair {
            old_text: old.to_string(),
            new_text: new.to_string(),
        }
    }

    const RESUME: &str = "Jane Doe\n\
        Work Experience\n\
        - Built internal tools in Python\n\
        - Maintained CI pipelines\n\
        Skills\n\
        - Python, SQL\n";

    #[test]
    fn test_present_pairs_replace_old_text() {
        let edits = vec![
            pair(
                "Built internal tools in Python",
                "Built Rust microservices on Kubernetes serving 2M req/day",
            ),
            pair("Maintained CI pipelines", "Owned CI/CD pipelines and release tooling"),
        ];
        let (patched, report) = apply_edits(RESUME, &edits);

        for edit in &edits {
            assert!(patched.contains(&edit.new_text));
            assert!(!patched.contains(&edit.old_text));
        }
        assert_eq!(report.applied_count(), 2);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_absent_old_text_leaves_document_unchanged() {
        let edits = vec![pair("Built internal tools in Go", "Built Rust services")];
        let (patched, report) = apply_edits(RESUME, &edits);
        assert_eq!(patched, RESUME);
        assert!(report.applied.is_empty());
        assert_eq!(report.skipped, edits);
    }

    #[test]
    fn test_matching_is_exact_not_fuzzy() {
        // Different case and trailing period: neither matches.
        let edits = vec![
            pair("built internal tools in python", "x"),
            pair("Maintained CI pipelines.", "y"),
        ];
        let (patched, report) = apply_edits(RESUME, &edits);
        assert_eq!(patched, RESUME);
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn test_mixed_batch_reports_both_sides() {
        let edits = vec![
            pair("- Python, SQL", "- Rust, Python, SQL, PostgreSQL"),
            pair("Led a team of 12", "Led a team of 12 engineers"),
        ];
        let (patched, report) = apply_edits(RESUME, &edits);
        assert!(patched.contains("- Rust, Python, SQL, PostgreSQL"));
        assert_eq!(report.applied, vec![edits[0].clone()]);
        assert_eq!(report.skipped, vec![edits[1].clone()]);
    }

    #[test]
    fn test_later_pair_cannot_rewrite_inserted_text() {
        let doc = "- Built REST APIs\n- Python, SQL\n";
        let edits = vec![
            pair("Built REST APIs", "Built REST APIs with Python, SQL"),
            pair("Python, SQL", "Python, Rust, SQL"),
        ];
        let (patched, report) = apply_edits(doc, &edits);

        assert_eq!(
            patched,
            "- Built REST APIs with Python, SQL\n- Python, Rust, SQL\n"
        );
        for edit in &edits {
            assert!(patched.contains(&edit.new_text));
        }
        assert_eq!(report.applied_count(), 2);
    }

    #[test]
    fn test_old_text_only_present_after_an_edit_is_skipped() {
        let edits = vec![
            pair("Maintained CI pipelines", "Maintained CI pipelines in Rust"),
            pair("pipelines in Rust", "INJECTED"),
        ];
        let (patched, report) = apply_edits(RESUME, &edits);

        assert!(patched.contains("- Maintained CI pipelines in Rust\n"));
        assert!(!patched.contains("INJECTED"));
        assert_eq!(report.applied, vec![edits[0].clone()]);
        assert_eq!(report.skipped, vec![edits[1].clone()]);
    }

    #[test]
    fn test_overlapping_pair_is_skipped() {
        let edits = vec![
            pair("Maintained CI pipelines", "Owned CI/CD pipelines"),
            pair("CI pipelines", "build pipelines"),
        ];
        let (patched, report) = apply_edits(RESUME, &edits);

        assert!(patched.contains("- Owned CI/CD pipelines\n"));
        assert_eq!(report.applied, vec![edits[0].clone()]);
        assert_eq!(report.skipped, vec![edits[1].clone()]);
    }

    #[test]
    fn test_every_occurrence_is_replaced() {
        let doc = "Python\nPython";
        let (patched, _) = apply_edits(doc, &[pair("Python", "Rust")]);
        assert_eq!(patched, "Rust\nRust");
    }

    #[test]
    fn test_empty_old_text_is_skipped() {
        let (patched, report) = apply_edits(RESUME, &[pair("", "injected")]);
        assert_eq!(patched, RESUME);
        assert_eq!(report.skipped.len(), 1);
    }
}
