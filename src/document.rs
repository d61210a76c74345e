//! Source documents and the summary reports produced from them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Delimiter separating paragraphs inside [`Report::content`].
pub const PARAGRAPH_DELIMITER: &str = "\n\n";

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read document: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("document is empty")]
    Empty,
}

/// The text being summarised. Never mutated after load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Load a document from a local text file
    pub fn load_from_local<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Err(DocumentError::Empty);
        }
        Ok(Self { content })
    }

    /// Number of whitespace-delimited tokens in the document
    pub fn num_tokens(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Structured summarisation report returned by the LLM.
///
/// The JSON schema of this struct is handed to the model, so field docs double
/// as instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    /// The title of the summarization report
    pub title: String,
    /// The content of the summarization report
    pub content: String,
}

impl Report {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Non-empty paragraphs of the content, trimmed
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.content
            .split(PARAGRAPH_DELIMITER)
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_from_local_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "UCLA is a public university.").unwrap();

        let document = Document::load_from_local(file.path()).unwrap();
        assert_eq!(document.content, "UCLA is a public university.");
        assert_eq!(document.num_tokens(), 4);
    }

    #[test]
    fn load_from_local_rejects_blank_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "  \n ").unwrap();

        assert!(matches!(
            Document::load_from_local(file.path()),
            Err(DocumentError::Empty)
        ));
    }

    #[test]
    fn paragraphs_skip_blank_segments() {
        let report = Report::new("UCLA", "A.\n\n  \n\nB.\n\n");
        let paragraphs: Vec<&str> = report.paragraphs().collect();
        assert_eq!(paragraphs, vec!["A.", "B."]);
    }
}
