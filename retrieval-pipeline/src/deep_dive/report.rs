use std::fmt::Write;

use common::storage::types::paper::Paper;

/// Formats a deep-dive report. Pure formatting; an empty related list is valid.
pub fn render_report(seed: &Paper, search_terms: &[String], related: &[Paper]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# {}", seed.title.trim());
    let _ = writeln!(out);
    let authors = if seed.authors.is_empty() {
        "unknown".to_string()
    } else {
        seed.authors.join(", ")
    };
    let _ = writeln!(out, "Authors: {authors}");
    let _ = writeln!(out, "Published: {}", seed.published.format("%Y-%m-%d"));
    let _ = writeln!(out, "Full text: {}", seed.full_text_link);

    let _ = writeln!(out, "\n## Abstract\n");
    let _ = writeln!(out, "{}", seed.abstract_text.trim());

    let _ = writeln!(out, "\n## Summary\n");
    match seed.summary.as_deref().map(str::trim) {
        Some(summary) if !summary.is_empty() => {
            let _ = writeln!(out, "{summary}");
        }
        _ => {
            let _ = writeln!(out, "(no summary available)");
        }
    }

    let _ = writeln!(out, "\n## Related papers\n");
    if related.is_empty() {
        let _ = writeln!(out, "(no related papers found)");
    }
    for (rank, paper) in related.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} [{}] (relevance {})",
            rank + 1,
            paper.title.trim(),
            paper.id,
            paper.relevance_or_zero()
        );
    }

    let _ = writeln!(out, "\n## Search terms\n");
    for term in search_terms {
        let _ = writeln!(out, "- {term}");
    }

    out
}
