//! RO-Crate archive assembly for reproducible notebooks.
//!
//! An archive is a folder holding copies of a source folder's files plus an
//! `ro-crate-metadata.json` document describing them. Two backends build it:
//!
//! - [`ManualBackend`] writes the JSON-LD graph directly, into `<folder>-ro-crate`
//! - [`LibraryBackend`] goes through the [`RoCrate`] model, into
//!   `<folder>-library-ro-crate`
//!
//! Both read README and LICENSE files through the same [`Enrichment`] policy.
//! Finished archives are packed with [`bundle_archive`].

pub mod bundle;
pub mod enrich;
pub mod error;
pub mod library;
pub mod manual;
pub mod model;

pub use bundle::bundle_archive;
pub use enrich::{Enrichment, Summary, license_uri};
pub use error::{ArchiveError, ArchiveResult};
pub use library::LibraryBackend;
pub use manual::ManualBackend;
pub use model::{Entity, METADATA_FILE, RoCrate, read_metadata};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Builds an archive from a source folder.
pub trait ArchiveBackend {
    /// Build an archive next to `source_dir`. Rebuilding overwrites the
    /// metadata and copied files and keeps unrelated files in the folder.
    fn build(&self, source_dir: &Path, author: &str, enrichment: &Enrichment)
    -> ArchiveResult<Archive>;
}

/// Which backend to build with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArchiveStrategy {
    /// Hand-built metadata graph
    #[default]
    Manual,
    /// Metadata built through the [`RoCrate`] model
    Library,
}

impl ArchiveStrategy {
    /// The backend implementing this strategy.
    pub fn backend(self) -> Box<dyn ArchiveBackend> {
        match self {
            Self::Manual => Box::new(ManualBackend),
            Self::Library => Box::new(LibraryBackend),
        }
    }

    /// Suffix appended to the source folder name.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Manual => "-ro-crate",
            Self::Library => "-library-ro-crate",
        }
    }

    /// Name of the crate folder built from a folder called `folder_name`.
    pub fn crate_name(self, folder_name: &str) -> String {
        format!("{}{}", folder_name, self.suffix())
    }
}

impl fmt::Display for ArchiveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => f.write_str("manual"),
            Self::Library => f.write_str("library"),
        }
    }
}

impl FromStr for ArchiveStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "library" => Ok(Self::Library),
            other => Err(format!("unknown archive method '{}'", other)),
        }
    }
}

/// A built archive on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    /// Crate folder
    pub path: PathBuf,

    /// Files listed under the root's `hasPart`, in order
    pub parts: Vec<String>,

    /// Backend that built it
    pub strategy: ArchiveStrategy,
}

impl Archive {
    /// Folder name of the crate.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    /// Path of the metadata document.
    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILE)
    }

    /// Move the crate into `dir`. When a crate of the same name is already
    /// there, the built files are copied over it and files this build did
    /// not write are left in place.
    pub fn relocate(self, dir: &Path) -> ArchiveResult<Self> {
        let target = dir.join(self.name());
        if !target.exists() {
            fs::rename(&self.path, &target).map_err(|e| ArchiveError::write(&target, e))?;
            return Ok(Self {
                path: target,
                ..self
            });
        }

        for entry in fs::read_dir(&self.path).map_err(|e| ArchiveError::read(&self.path, e))? {
            let file = entry?.path();
            if file.is_file() {
                let dest = target.join(file_name(&file));
                fs::copy(&file, &dest).map_err(|e| ArchiveError::write(&dest, e))?;
            }
        }
        fs::remove_dir_all(&self.path).map_err(|e| ArchiveError::write(&self.path, e))?;
        tracing::debug!("Merged {} into {}", self.name(), target.display());

        Ok(Self {
            path: target,
            ..self
        })
    }
}

/// Source folder facts shared by both backends.
pub(crate) struct Source {
    pub dir: PathBuf,
    pub name: String,
    /// Regular files in the folder, sorted by name
    pub files: Vec<PathBuf>,
}

impl Source {
    pub fn open(dir: &Path) -> ArchiveResult<Self> {
        if !dir.is_dir() {
            return Err(ArchiveError::SourceNotFound(dir.to_path_buf()));
        }
        let dir = dir.canonicalize()?;
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ArchiveError::UnnamedSource(dir.clone()))?;

        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| ArchiveError::read(&dir, e))? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        Ok(Self { dir, name, files })
    }

    /// Sibling folder that receives the crate, created when missing.
    ///
    /// An existing folder is reused; the build overwrites the files it
    /// writes and leaves any other file untouched.
    pub fn destination(&self, strategy: ArchiveStrategy) -> ArchiveResult<PathBuf> {
        let dest = self.dir.with_file_name(strategy.crate_name(&self.name));
        fs::create_dir_all(&dest).map_err(|e| ArchiveError::write(&dest, e))?;
        Ok(dest)
    }
}

/// File name of `path` as a string.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// Today's date as `YYYY-MM-DD`.
pub(crate) fn today() -> String {
    chrono::Local::now().date_naive().to_string()
}
