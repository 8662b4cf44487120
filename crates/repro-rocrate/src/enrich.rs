//! README and LICENSE enrichment shared by every archive backend.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::model::{Entity, reference};

/// License assumed when no LICENSE file says otherwise.
pub const DEFAULT_LICENSE: &str = "https://creativecommons.org/licenses/by/4.0/";

/// Description used when there is no README.
pub const DEFAULT_DESCRIPTION: &str = "A reproducible notebook package";

/// Keywords attached to every archive.
pub const DEFAULT_KEYWORDS: [&str; 3] = ["jupyter", "reproducibility", "ro-crate"];

// "mit" is checked last: GPL and Apache texts contain words like "permitted".
const LICENSE_PATTERNS: [(&str, &str); 4] = [
    ("gnu general public license", "https://www.gnu.org/licenses/gpl-3.0.html"),
    ("gpl", "https://www.gnu.org/licenses/gpl-3.0.html"),
    ("apache", "https://www.apache.org/licenses/LICENSE-2.0"),
    ("mit", "https://opensource.org/licenses/MIT"),
];

/// Infer a license URI from LICENSE file text.
///
/// Matching is a case-insensitive substring search, first match wins.
pub fn license_uri(text: &str) -> &'static str {
    let lowered = text.to_lowercase();
    LICENSE_PATTERNS
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, uri)| *uri)
        .unwrap_or(DEFAULT_LICENSE)
}

/// Title and description taken from README text.
///
/// The first line (without leading `#` and whitespace) is the title; up to
/// two following non-empty lines form the description.
pub fn readme_summary(text: &str) -> (Option<String>, Option<String>) {
    let mut lines = text.lines();
    let title = lines
        .next()
        .map(|line| line.trim_start_matches(|c: char| c == '#' || c.is_whitespace()).trim())
        .filter(|title| !title.is_empty())
        .map(String::from);

    let description: Vec<&str> = lines
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(2)
        .collect();
    let description = (!description.is_empty()).then(|| description.join(" "));

    (title, description)
}

/// Metadata derived from a source folder by [`Enrichment::inspect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Dataset title
    pub title: String,

    /// Dataset description
    pub description: String,

    /// License URI
    pub license: String,

    /// Dataset keywords
    pub keywords: Vec<String>,
}

impl Summary {
    /// Set `license` and `keywords` on the root dataset.
    pub fn apply_license_and_keywords(&self, root: &mut Entity) {
        root.set("license", reference(&self.license)).set(
            "keywords",
            Value::from(self.keywords.clone()),
        );
    }

    /// Set every summary field on the root dataset.
    pub fn apply(&self, root: &mut Entity) {
        root.set("name", self.title.as_str())
            .set("description", self.description.as_str());
        self.apply_license_and_keywords(root);
    }
}

/// Policy for deriving archive metadata from README and LICENSE files.
#[derive(Debug, Clone)]
pub struct Enrichment {
    /// Keywords added to every archive
    pub keywords: Vec<String>,

    /// Description when no README provides one
    pub default_description: String,
}

impl Default for Enrichment {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            default_description: DEFAULT_DESCRIPTION.to_string(),
        }
    }
}

impl Enrichment {
    /// Derive the summary for `folder`, named `folder_name`.
    ///
    /// Unreadable README or LICENSE files are treated as absent.
    pub fn inspect(&self, folder: &Path, folder_name: &str) -> Summary {
        let readme = find_prefixed(folder, "README").and_then(|p| read_text(&p));
        let license = find_prefixed(folder, "LICENSE").and_then(|p| read_text(&p));

        let (title, description) = readme
            .as_deref()
            .map(readme_summary)
            .unwrap_or((None, None));

        Summary {
            title: title.unwrap_or_else(|| folder_name.to_string()),
            description: description.unwrap_or_else(|| self.default_description.clone()),
            license: license
                .as_deref()
                .map(license_uri)
                .unwrap_or(DEFAULT_LICENSE)
                .to_string(),
            keywords: self.keywords.clone(),
        }
    }
}

/// First regular file in `folder` whose name starts with `prefix`
/// (case-insensitive), in name order.
pub fn find_prefixed(folder: &Path, prefix: &str) -> Option<PathBuf> {
    let prefix = prefix.to_lowercase();
    let mut matches: Vec<PathBuf> = fs::read_dir(folder)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_lowercase().starts_with(&prefix))
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

fn read_text(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
            None
        }
    }
}
