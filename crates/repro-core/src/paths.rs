//! Output directory management.
//!
//! Every run writes its artifacts into one fixed tree rooted next to the
//! notebooks:
//!
//! ```text
//! <root>/
//! ├── dependencies/     # Generated manifests, one folder per notebook
//! ├── style_reports/    # <name>_style.txt
//! ├── conda_execution/  # Executed notebook copies and logs
//! ├── ro_crates/        # Built archives and their .tar.gz bundles
//! └── zenodo/           # Deposition metadata and upload results
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Directory name that makes the output root move one level up.
const NOTEBOOKS_DIR: &str = "notebooks";

/// Generated manifests.
pub const DEPENDENCIES_DIR: &str = "dependencies";
/// Style checker reports.
pub const STYLE_REPORTS_DIR: &str = "style_reports";
/// Executed notebooks and execution logs.
pub const CONDA_EXECUTION_DIR: &str = "conda_execution";
/// Built archives.
pub const RO_CRATES_DIR: &str = "ro_crates";
/// Publish metadata and results.
pub const ZENODO_DIR: &str = "zenodo";

/// All output subdirectory names.
pub const OUTPUT_DIRS: [&str; 5] = [
    DEPENDENCIES_DIR,
    STYLE_REPORTS_DIR,
    CONDA_EXECUTION_DIR,
    RO_CRATES_DIR,
    ZENODO_DIR,
];

/// The canonical output tree for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// Root holding all output subdirectories
    pub root: PathBuf,
}

impl OutputLayout {
    /// Choose the output root for an input path.
    ///
    /// For a notebook the root is its directory; for a directory input the
    /// directory itself. Either way, a directory named `notebooks` is
    /// replaced by its parent.
    pub fn for_input(input: &Path) -> Self {
        let base = if input.is_dir() {
            input
        } else {
            input.parent().unwrap_or(Path::new("."))
        };

        let root = match (base.file_name(), base.parent()) {
            (Some(name), Some(parent)) if name == NOTEBOOKS_DIR => parent,
            _ => base,
        };

        Self {
            root: root.to_path_buf(),
        }
    }

    /// Create every output subdirectory.
    pub fn create(&self) -> Result<()> {
        for dir in OUTPUT_DIRS {
            fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    /// `dependencies/`
    pub fn dependencies_dir(&self) -> PathBuf {
        self.root.join(DEPENDENCIES_DIR)
    }

    /// `style_reports/`
    pub fn style_reports_dir(&self) -> PathBuf {
        self.root.join(STYLE_REPORTS_DIR)
    }

    /// `conda_execution/`
    pub fn conda_execution_dir(&self) -> PathBuf {
        self.root.join(CONDA_EXECUTION_DIR)
    }

    /// `ro_crates/`
    pub fn ro_crates_dir(&self) -> PathBuf {
        self.root.join(RO_CRATES_DIR)
    }

    /// `zenodo/`
    pub fn zenodo_dir(&self) -> PathBuf {
        self.root.join(ZENODO_DIR)
    }

    /// Folder holding the generated manifests of notebook `name`.
    pub fn notebook_dependencies(&self, name: &str) -> PathBuf {
        self.dependencies_dir().join(name)
    }

    pub fn style_report(&self, name: &str) -> PathBuf {
        self.style_reports_dir().join(format!("{}_style.txt", name))
    }

    pub fn executed_notebook(&self, name: &str) -> PathBuf {
        self.conda_execution_dir().join(format!("{}.ipynb", name))
    }

    pub fn execution_log(&self, name: &str) -> PathBuf {
        self.conda_execution_dir()
            .join(format!("{}_execution.log", name))
    }

    pub fn zenodo_metadata(&self, name: &str) -> PathBuf {
        self.zenodo_dir()
            .join(format!("zenodo_metadata_{}.json", name))
    }

    pub fn upload_results(&self, name: &str) -> PathBuf {
        self.zenodo_dir()
            .join(format!("upload_results_{}.json", name))
    }

    /// Whether `dir` is one of this tree's output subdirectories.
    pub fn is_output_dir(&self, dir: &Path) -> bool {
        dir.parent() == Some(self.root.as_path())
            && dir
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| OUTPUT_DIRS.contains(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_root_for_notebook_file() {
        let temp = TempDir::new().unwrap();
        let nb = temp.path().join("project").join("analysis.ipynb");
        fs::create_dir_all(nb.parent().unwrap()).unwrap();
        fs::write(&nb, "{}").unwrap();

        let layout = OutputLayout::for_input(&nb);
        assert_eq!(layout.root, temp.path().join("project"));
    }

    #[test]
    fn test_root_skips_notebooks_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("project").join("notebooks");
        fs::create_dir_all(&dir).unwrap();
        let nb = dir.join("analysis.ipynb");
        fs::write(&nb, "{}").unwrap();

        assert_eq!(OutputLayout::for_input(&nb).root, temp.path().join("project"));
        assert_eq!(OutputLayout::for_input(&dir).root, temp.path().join("project"));
    }

    #[test]
    fn test_root_for_plain_directory() {
        let temp = TempDir::new().unwrap();
        assert_eq!(OutputLayout::for_input(temp.path()).root, temp.path());
    }

    #[test]
    fn test_create_and_artifact_paths() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::for_input(temp.path());
        layout.create().unwrap();

        for dir in OUTPUT_DIRS {
            assert!(temp.path().join(dir).is_dir());
        }
        assert_eq!(
            layout.style_report("nb"),
            temp.path().join("style_reports").join("nb_style.txt")
        );
        assert_eq!(
            layout.upload_results("nb"),
            temp.path().join("zenodo").join("upload_results_nb.json")
        );
        assert!(layout.is_output_dir(&layout.ro_crates_dir()));
        assert!(!layout.is_output_dir(&temp.path().join("data")));
    }
}
