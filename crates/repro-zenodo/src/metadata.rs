//! Deposition metadata document.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PublishError, ZenodoResult};

/// Keywords attached to every deposition.
pub const KEYWORDS: [&str; 3] = ["jupyter", "reproducibility", "ro-crate"];

/// License declared for every deposition.
pub const LICENSE: &str = "CC-BY-4.0";

/// A deposition creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub name: String,
}

/// The `metadata` object sent when creating a deposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositionMetadata {
    pub title: String,
    pub upload_type: String,
    pub description: String,
    pub creators: Vec<Creator>,
    pub keywords: Vec<String>,
    pub license: String,
    /// `YYYY-MM-DD`
    pub publication_date: String,
}

impl DepositionMetadata {
    /// Dataset metadata by a single author, dated today.
    pub fn new(title: impl Into<String>, description: impl Into<String>, author: &str) -> Self {
        Self {
            title: title.into(),
            upload_type: "dataset".to_string(),
            description: description.into(),
            creators: vec![Creator {
                name: author.to_string(),
            }],
            keywords: KEYWORDS.iter().map(|k| k.to_string()).collect(),
            license: LICENSE.to_string(),
            publication_date: chrono::Local::now().date_naive().to_string(),
        }
    }

    /// Write the metadata as pretty JSON.
    pub fn write_to(&self, path: &Path) -> ZenodoResult<()> {
        let write_error = |message: String| PublishError::WriteFile {
            path: path.to_path_buf(),
            message,
        };
        let text = serde_json::to_string_pretty(self).map_err(|e| write_error(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| write_error(e.to_string()))?;
        tracing::info!("Zenodo metadata written to {}", path.display());
        Ok(())
    }
}
