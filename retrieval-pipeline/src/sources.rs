use std::{collections::HashMap, path::PathBuf};

use async_trait::async_trait;
use common::{error::AppError, storage::types::paper::Paper, utils::config::AppConfig};
use tracing::{debug, instrument};

/// A place papers come from.
///
/// Implementors supply `fetch` and `parse`; lookups by id are built on top.
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Retrieves the raw payload from the source.
    async fn fetch(&self) -> Result<String, AppError>;

    /// Turns a raw payload into papers.
    fn parse(&self, raw: &str) -> Result<Vec<Paper>, AppError>;

    async fn fetch_papers(&self) -> Result<Vec<Paper>, AppError> {
        let raw = self.fetch().await?;
        self.parse(&raw)
    }

    /// Returns the papers matching `ids`, in the order of `ids`. Unknown ids are skipped.
    #[instrument(skip_all, fields(source = self.name(), requested = ids.len()))]
    async fn resolve(&self, ids: &[String]) -> Result<Vec<Paper>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut by_id: HashMap<String, Paper> = self
            .fetch_papers()
            .await?
            .into_iter()
            .map(|paper| (paper.id.clone(), paper))
            .collect();

        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            match by_id.remove(id) {
                Some(paper) => resolved.push(paper),
                None => debug!(paper_id = %id, "Paper not present in source, skipping"),
            }
        }
        Ok(resolved)
    }

    async fn lookup(&self, id: &str) -> Result<Paper, AppError> {
        self.resolve(&[id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("paper {id} in source {}", self.name())))
    }
}

/// Reads a JSON array of papers from a file on disk.
#[derive(Debug, Clone)]
pub struct JsonPaperSource {
    path: PathBuf,
}

impl JsonPaperSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.papers_path)
    }
}

#[async_trait]
impl PaperSource for JsonPaperSource {
    fn name(&self) -> &str {
        "json"
    }

    async fn fetch(&self) -> Result<String, AppError> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }

    fn parse(&self, raw: &str) -> Result<Vec<Paper>, AppError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::test_support::paper;

    fn write_papers(papers: &[Paper]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(serde_json::to_string(papers).expect("json").as_bytes())
            .expect("write");
        file
    }

    #[tokio::test]
    async fn resolve_preserves_requested_order_and_skips_unknown() {
        let file = write_papers(&[paper("a"), paper("b"), paper("c")]);
        let source = JsonPaperSource::new(file.path());

        let ids = vec!["c".to_string(), "zz".to_string(), "a".to_string()];
        let resolved = source.resolve(&ids).await.expect("resolve");

        let got: Vec<&str> = resolved.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(got, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn lookup_reports_missing_paper() {
        let file = write_papers(&[paper("a")]);
        let source = JsonPaperSource::new(file.path());

        assert_eq!(source.lookup("a").await.expect("lookup").id, "a");
        let err = source.lookup("missing").await.expect_err("should be missing");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn reads_abstract_field_from_json() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"[{{"id":"2401.1","title":"T","abstract":"About things","full_text_link":"https://x/y.pdf","published":"2024-01-02T00:00:00Z"}}]"#
        )
        .expect("write");

        let papers = JsonPaperSource::new(file.path())
            .fetch_papers()
            .await
            .expect("papers");
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].abstract_text, "About things");
        assert!(papers[0].authors.is_empty());
        assert_eq!(papers[0].relevance, None);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let source = JsonPaperSource::new("/definitely/not/here.json");
        let err = source.fetch_papers().await.expect_err("missing file");
        assert!(matches!(err, AppError::Io(_)));
    }
}
