//! Dependency analysis for notebooks.
//!
//! Extracts the set of top-level packages a notebook imports, reads existing
//! dependency manifests, reconciles the two, and generates unpinned manifests.
//!
//! # Manifest forms
//!
//! ```text
//! requirements.txt            environment.yml
//! ────────────────            ───────────────
//! numpy                       name: repronotebook-env
//! pandas                      channels:
//!                               - defaults
//!                             dependencies:
//!                               - numpy
//!                               - pandas
//! ```
//!
//! Only package names are tracked; version constraints are never solved.

mod imports;
mod manifest;

pub use imports::{extract_imports, imports_from_source};
pub use manifest::{
    DEFAULT_CHANNEL, DependencyManifest, GENERATED_ENV_NAME, ManifestForm, ManifestRead, generate,
    load_manifest, package_name, read_manifest, render_manifest, write_manifest,
};

use std::collections::BTreeSet;

/// Outcome of checking a notebook's imports against a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Every import is declared in the manifest
    pub satisfied: bool,

    /// Imports the manifest does not declare
    pub missing: BTreeSet<String>,
}

/// Compare an import set against a manifest's package set.
///
/// `missing = imports − manifest`; the manifest is satisfied iff nothing is
/// missing. Matching is exact and case-sensitive.
pub fn reconcile(manifest: &BTreeSet<String>, imports: &BTreeSet<String>) -> Reconciliation {
    let missing: BTreeSet<String> = imports.difference(manifest).cloned().collect();
    Reconciliation {
        satisfied: missing.is_empty(),
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_reconcile_reports_missing() {
        let result = reconcile(&set(&["numpy", "os"]), &set(&["numpy", "os", "pandas"]));
        assert!(!result.satisfied);
        assert_eq!(result.missing, set(&["pandas"]));
    }

    #[test]
    fn test_reconcile_superset_manifest_is_satisfied() {
        let result = reconcile(&set(&["numpy", "scipy", "os"]), &set(&["numpy"]));
        assert!(result.satisfied);
        assert!(result.missing.is_empty());
    }

    #[test]
    fn test_reconcile_is_case_sensitive() {
        let result = reconcile(&set(&["PyYAML"]), &set(&["yaml"]));
        assert_eq!(result.missing, set(&["yaml"]));

        let result = reconcile(&set(&["Numpy"]), &set(&["numpy"]));
        assert!(!result.satisfied);
    }

    #[test]
    fn test_reconcile_empty_sets() {
        assert!(reconcile(&BTreeSet::new(), &BTreeSet::new()).satisfied);
        let result = reconcile(&BTreeSet::new(), &set(&["requests"]));
        assert_eq!(result.missing, set(&["requests"]));
    }
}
