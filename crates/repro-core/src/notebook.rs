//! Jupyter notebook (.ipynb) reading.
//!
//! Only the parts of the document the pipeline consumes are modelled:
//! cell types, cell sources, and the kernel specification.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A Jupyter notebook document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupyterNotebook {
    /// Notebook metadata (kernelspec, language info, ...)
    #[serde(default)]
    pub metadata: serde_json::Value,

    /// Format version
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,

    /// Minor format version
    #[serde(default)]
    pub nbformat_minor: u32,

    /// Notebook cells
    #[serde(default)]
    pub cells: Vec<JupyterCell>,
}

fn default_nbformat() -> u32 {
    4
}

/// A Jupyter cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupyterCell {
    /// Cell type (`code`, `markdown`, `raw`)
    pub cell_type: String,

    /// Cell source
    #[serde(default)]
    pub source: CellSource,
}

/// Cell source, stored either as one string or as a list of lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellSource {
    /// Whole source as a single string
    Text(String),
    /// Source split into lines (each usually ending in `\n`)
    Lines(Vec<String>),
}

impl Default for CellSource {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl CellSource {
    /// Full source text.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Lines(lines) => lines.concat(),
        }
    }
}

impl JupyterNotebook {
    /// Parse a notebook from JSON text.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Read a notebook from a file.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::Notebook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&content).map_err(|e| Error::Notebook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Sources of every code cell, in document order.
    pub fn code_sources(&self) -> impl Iterator<Item = String> + '_ {
        self.cells
            .iter()
            .filter(|cell| cell.cell_type == "code")
            .map(|cell| cell.source.text())
    }
}

/// A notebook selected for processing in the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notebook {
    /// Path as given (or as discovered)
    pub raw_path: PathBuf,

    /// Absolute, canonical path; the notebook's identity
    pub path: PathBuf,

    /// Name given to per-notebook artifacts
    name: String,
}

impl Notebook {
    /// Resolve a notebook path.
    pub fn resolve(raw_path: impl AsRef<Path>) -> Result<Self> {
        let raw_path = raw_path.as_ref().to_path_buf();
        let path = raw_path.canonicalize().map_err(|e| Error::Notebook {
            path: raw_path.clone(),
            message: e.to_string(),
        })?;
        let name = path
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Ok(Self {
            raw_path,
            path,
            name,
        })
    }

    /// Name of the per-notebook artifacts: the file stem, unless discovery
    /// had to disambiguate notebooks sharing a stem.
    pub fn name(&self) -> String {
        self.name.clone()
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.name = name;
    }

    /// File name including the extension.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// Directory holding the notebook.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// Read and parse the notebook document.
    pub fn read(&self) -> Result<JupyterNotebook> {
        JupyterNotebook::read_from_file(&self.path)
    }
}
