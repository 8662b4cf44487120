//! Dependency manifest reading and generation.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::imports::extract_imports;
use super::{Reconciliation, reconcile};
use crate::error::{Error, Result};
use crate::notebook::JupyterNotebook;

/// Environment name written into generated `environment.yml` files.
pub const GENERATED_ENV_NAME: &str = "repronotebook-env";

/// Channel written into generated `environment.yml` files.
pub const DEFAULT_CHANNEL: &str = "defaults";

static PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-.]+").expect("package name pattern is valid"));

/// Which manifest format a file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestForm {
    /// Flat `requirements.txt` list, one package per line
    Requirements,
    /// Conda `environment.yml` with `name`, `channels`, `dependencies`
    Environment,
}

impl ManifestForm {
    /// Both forms, in generation order.
    pub const ALL: [ManifestForm; 2] = [ManifestForm::Requirements, ManifestForm::Environment];

    /// Detect the form from a file extension (`.yml`/`.yaml` are structured).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml" | "yaml") => Self::Environment,
            _ => Self::Requirements,
        }
    }

    /// Conventional file name for this form.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Requirements => "requirements.txt",
            Self::Environment => "environment.yml",
        }
    }
}

/// Result of trying to read a manifest file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestRead {
    /// No file at the path
    Missing,
    /// The file exists but could not be read or parsed
    Unreadable(String),
    /// Package names declared by the file
    Parsed(BTreeSet<String>),
}

impl ManifestRead {
    /// Declared packages; empty unless the file parsed.
    pub fn into_packages(self) -> BTreeSet<String> {
        match self {
            Self::Parsed(packages) => packages,
            Self::Missing | Self::Unreadable(_) => BTreeSet::new(),
        }
    }
}

/// A dependency manifest on disk, as seen by the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyManifest {
    /// File path
    pub path: PathBuf,

    /// File format
    pub form: ManifestForm,

    /// Whether the file exists
    pub exists: bool,

    /// Declared package names
    pub packages: BTreeSet<String>,
}

impl DependencyManifest {
    /// Load the manifest at `path`, detecting its form from the extension.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let form = ManifestForm::from_path(&path);
        let read = load_manifest(&path, form);
        Self {
            exists: !matches!(read, ManifestRead::Missing),
            packages: read.into_packages(),
            path,
            form,
        }
    }

    /// Check the notebook's imports against this manifest.
    pub fn reconcile(&self, imports: &BTreeSet<String>) -> Reconciliation {
        reconcile(&self.packages, imports)
    }
}

#[derive(Debug, Deserialize)]
struct EnvironmentFile {
    #[serde(default)]
    dependencies: Option<Vec<EnvironmentEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EnvironmentEntry {
    Spec(String),
    Pip { pip: Vec<String> },
    Other(serde_yaml::Value),
}

/// Reduce a requirement spec to its bare package name.
///
/// Environment markers (after `;`) are dropped, then the leading run of
/// letters, digits, `_`, `-` and `.` is taken: `numpy>=1.2; python_version<"3.8"`
/// becomes `numpy`.
pub fn package_name(spec: &str) -> Option<&str> {
    let spec = spec.split(';').next().unwrap_or_default().trim();
    PACKAGE_NAME.find(spec).map(|m| m.as_str())
}

/// Read the package names declared by a manifest.
///
/// Missing and unreadable files both yield an empty set.
pub fn read_manifest(path: impl AsRef<Path>, form: ManifestForm) -> BTreeSet<String> {
    load_manifest(path, form).into_packages()
}

/// Read a manifest, distinguishing a missing file from an unreadable one.
pub fn load_manifest(path: impl AsRef<Path>, form: ManifestForm) -> ManifestRead {
    let path = path.as_ref();
    if !path.exists() {
        return ManifestRead::Missing;
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Failed to read dependency file {}: {}", path.display(), e);
            return ManifestRead::Unreadable(e.to_string());
        }
    };

    match form {
        ManifestForm::Requirements => ManifestRead::Parsed(parse_requirements(&content)),
        ManifestForm::Environment => match parse_environment(&content) {
            Ok(packages) => ManifestRead::Parsed(packages),
            Err(e) => {
                tracing::warn!("Failed to parse dependency file {}: {}", path.display(), e);
                ManifestRead::Unreadable(e.to_string())
            }
        },
    }
}

fn parse_requirements(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(package_name)
        .map(String::from)
        .collect()
}

fn parse_environment(content: &str) -> serde_yaml::Result<BTreeSet<String>> {
    // An empty document has no dependencies rather than being malformed.
    if content.trim().is_empty() {
        return Ok(BTreeSet::new());
    }

    let env: EnvironmentFile = serde_yaml::from_str(content)?;
    let mut packages = BTreeSet::new();

    for entry in env.dependencies.unwrap_or_default() {
        match entry {
            EnvironmentEntry::Spec(spec) => {
                if let Some(name) = package_name(&spec) {
                    packages.insert(name.to_string());
                }
            }
            EnvironmentEntry::Pip { pip } => {
                packages.extend(pip.iter().filter_map(|s| package_name(s)).map(String::from));
            }
            EnvironmentEntry::Other(_) => {}
        }
    }

    Ok(packages)
}

/// Render a manifest containing exactly `packages`, in sorted order.
pub fn render_manifest(packages: &BTreeSet<String>, form: ManifestForm) -> String {
    let mut out = String::new();
    match form {
        ManifestForm::Requirements => {
            for package in packages {
                let _ = writeln!(out, "{}", package);
            }
        }
        ManifestForm::Environment => {
            let _ = writeln!(out, "name: {}", GENERATED_ENV_NAME);
            let _ = writeln!(out, "channels:");
            let _ = writeln!(out, "  - {}", DEFAULT_CHANNEL);
            let _ = writeln!(out, "dependencies:");
            for package in packages {
                let _ = writeln!(out, "  - {}", package);
            }
        }
    }
    out
}

/// Write a manifest for `packages` to `path`, overwriting any existing file.
pub fn write_manifest(
    packages: &BTreeSet<String>,
    path: impl AsRef<Path>,
    form: ManifestForm,
) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, render_manifest(packages, form)).map_err(|e| Error::ManifestWrite {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Generate a manifest from the notebook's imports into `target_dir`.
///
/// Returns the path of the written file.
pub fn generate(
    notebook: &JupyterNotebook,
    target_dir: impl AsRef<Path>,
    form: ManifestForm,
) -> Result<PathBuf> {
    let path = target_dir.as_ref().join(form.file_name());
    write_manifest(&extract_imports(notebook), &path, form)?;
    tracing::debug!("Generated {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_package_name_strips_versions_and_markers() {
        assert_eq!(package_name("numpy"), Some("numpy"));
        assert_eq!(package_name("numpy>=1.21"), Some("numpy"));
        assert_eq!(package_name("scikit-learn==1.3.0"), Some("scikit-learn"));
        assert_eq!(package_name("python=3.11"), Some("python"));
        assert_eq!(
            package_name(r#"typing_extensions ; python_version < "3.8""#),
            Some("typing_extensions")
        );
        assert_eq!(package_name("zope.interface[extra]"), Some("zope.interface"));
        assert_eq!(package_name(">=1.0"), None);
    }

    #[test]
    fn test_read_requirements_skips_comments_and_blanks() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("requirements.txt");
        fs::write(&path, "# pinned\nnumpy==1.26\n\n  pandas>=2  \nos\n").unwrap();

        assert_eq!(
            read_manifest(&path, ManifestForm::Requirements),
            set(&["numpy", "os", "pandas"])
        );
    }

    #[test]
    fn test_read_environment_with_pip_section() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("environment.yml");
        fs::write(
            &path,
            "name: demo\nchannels:\n  - conda-forge\ndependencies:\n  - python=3.11\n  - numpy\n  - pip\n  - pip:\n    - requests>=2\n    - rich\n",
        )
        .unwrap();

        assert_eq!(
            read_manifest(&path, ManifestForm::Environment),
            set(&["numpy", "pip", "python", "requests", "rich"])
        );
    }

    #[test]
    fn test_missing_file_is_empty_without_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("requirements.txt");

        assert_eq!(load_manifest(&path, ManifestForm::Requirements), ManifestRead::Missing);
        assert!(read_manifest(&path, ManifestForm::Environment).is_empty());

        let manifest = DependencyManifest::load(&path);
        assert!(!manifest.exists);
        assert!(manifest.packages.is_empty());
    }

    #[test]
    fn test_malformed_environment_is_unreadable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("environment.yml");
        fs::write(&path, "dependencies: [unterminated\n").unwrap();

        assert!(matches!(
            load_manifest(&path, ManifestForm::Environment),
            ManifestRead::Unreadable(_)
        ));
        assert!(read_manifest(&path, ManifestForm::Environment).is_empty());
    }

    #[test]
    fn test_render_environment_form() {
        let rendered = render_manifest(&set(&["pandas", "numpy"]), ManifestForm::Environment);
        assert_eq!(
            rendered,
            "name: repronotebook-env\nchannels:\n  - defaults\ndependencies:\n  - numpy\n  - pandas\n"
        );
    }

    #[test]
    fn test_generated_environment_reads_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("environment.yml");
        write_manifest(&set(&["numpy", "os"]), &path, ManifestForm::Environment).unwrap();

        let manifest = DependencyManifest::load(&path);
        assert_eq!(manifest.form, ManifestForm::Environment);
        assert_eq!(manifest.packages, set(&["numpy", "os"]));
    }

    #[test]
    fn test_generate_is_byte_identical_across_runs() {
        let temp = TempDir::new().unwrap();
        let notebook = JupyterNotebook::from_json(
            r#"{"cells": [{"cell_type": "code", "source": "import pandas as pd, os\nimport numpy as np"}]}"#,
        )
        .unwrap();

        for form in ManifestForm::ALL {
            let path = generate(&notebook, temp.path(), form).unwrap();
            let first = fs::read(&path).unwrap();
            generate(&notebook, temp.path(), form).unwrap();
            let second = fs::read(&path).unwrap();
            assert_eq!(first, second);
        }

        assert_eq!(
            fs::read_to_string(temp.path().join("requirements.txt")).unwrap(),
            "numpy\nos\npandas\n"
        );
    }

    #[test]
    fn test_generate_into_missing_dir_fails_without_panic() {
        let temp = TempDir::new().unwrap();
        let notebook = JupyterNotebook::from_json(r#"{"cells": []}"#).unwrap();

        let err = generate(&notebook, temp.path().join("absent"), ManifestForm::Requirements)
            .unwrap_err();
        assert!(matches!(err, Error::ManifestWrite { .. }));
    }

    #[test]
    fn test_empty_generated_environment_reads_back_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("environment.yml");
        write_manifest(&BTreeSet::new(), &path, ManifestForm::Environment).unwrap();

        assert_eq!(
            load_manifest(&path, ManifestForm::Environment),
            ManifestRead::Parsed(BTreeSet::new())
        );
    }

    #[test]
    fn test_form_from_path() {
        assert_eq!(ManifestForm::from_path(Path::new("env.yaml")), ManifestForm::Environment);
        assert_eq!(ManifestForm::from_path(Path::new("environment.yml")), ManifestForm::Environment);
        assert_eq!(ManifestForm::from_path(Path::new("reqs.txt")), ManifestForm::Requirements);
    }
}
