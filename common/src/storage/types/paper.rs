use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest relevance an oracle may assign.
pub const MAX_RELEVANCE: u8 = 100;

/// A research paper as produced by a paper source and annotated by scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Paper {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub abstract_link: Option<String>,
    pub full_text_link: String,
    pub published: DateTime<Utc>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub relevance: Option<u8>,
}

impl Paper {
    /// Applies a scoring result, clamping relevance into the valid range.
    pub fn scored(mut self, summary: String, relevance: u8) -> Self {
        self.summary = Some(summary);
        self.relevance = Some(relevance.min(MAX_RELEVANCE));
        self
    }

    pub fn relevance_or_zero(&self) -> u8 {
        self.relevance.unwrap_or(0)
    }

    pub fn is_published_since(&self, cutoff: DateTime<Utc>) -> bool {
        self.published >= cutoff
    }

    /// Short multi-line entry used by the digest listing.
    pub fn pretty_print(&self) -> String {
        let mut out = format!("{} [{}]\n", self.title, self.id);
        if !self.authors.is_empty() {
            out.push_str(&format!("Authors: {}\n", self.authors.join(", ")));
        }
        if let Some(relevance) = self.relevance {
            out.push_str(&format!("Relevance: {relevance}\n"));
        }
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(&format!("Summary: {summary}\n"));
        }
        out.push_str(&format!(
            "Link: {}",
            self.abstract_link.as_deref().unwrap_or(&self.full_text_link)
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_paper(id: &str, title: &str) -> Paper {
        Paper {
            id: id.to_string(),
            title: title.to_string(),
            authors: vec!["Ada Lovelace".to_string()],
            abstract_text: format!("Abstract of {title}"),
            abstract_link: None,
            full_text_link: format!("https://arxiv.org/pdf/{id}"),
            published: Utc
                .with_ymd_and_hms(2025, 8, 1, 0, 0, 0)
                .single()
                .expect("valid date"),
            summary: None,
            relevance: None,
        }
    }

    #[test]
    fn scoring_clamps_relevance() {
        let paper = sample_paper("2507.00001", "Clamped").scored("fine".into(), 250);
        assert_eq!(paper.relevance, Some(MAX_RELEVANCE));
        assert_eq!(paper.summary.as_deref(), Some("fine"));
    }

    #[test]
    fn deserializes_abstract_field_name() {
        let json = r#"{
            "id": "2507.23701",
            "title": "TextQuests",
            "abstract": "Interactive fiction benchmark",
            "full_text_link": "https://arxiv.org/pdf/2507.23701",
            "published": "2025-07-31T00:00:00Z"
        }"#;
        let paper: Paper = serde_json::from_str(json).expect("paper");
        assert_eq!(paper.abstract_text, "Interactive fiction benchmark");
        assert!(paper.authors.is_empty());
        assert_eq!(paper.relevance_or_zero(), 0);
    }

    #[test]
    fn pretty_print_prefers_abstract_link() {
        let mut paper = sample_paper("2507.00002", "Linked").scored("short".into(), 80);
        paper.abstract_link = Some("https://arxiv.org/abs/2507.00002".into());
        let rendered = paper.pretty_print();
        assert!(rendered.starts_with("Linked [2507.00002]"));
        assert!(rendered.contains("Relevance: 80"));
        assert!(rendered.ends_with("https://arxiv.org/abs/2507.00002"));
    }
}
