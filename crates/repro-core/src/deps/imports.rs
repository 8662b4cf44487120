//! Import-statement extraction from notebook code cells.

use std::collections::BTreeSet;

use crate::notebook::JupyterNotebook;

/// Extract the sorted, deduplicated set of top-level packages imported by
/// the notebook's code cells.
pub fn extract_imports(notebook: &JupyterNotebook) -> BTreeSet<String> {
    let mut imports = BTreeSet::new();
    for source in notebook.code_sources() {
        imports.extend(imports_from_source(&source));
    }
    imports
}

/// Extract top-level package names from one cell's source text.
///
/// Inline comments are dropped and each line is split into `;`-separated
/// statements. A statement qualifies when, after trimming, it starts with
/// `import ` or `from `; commas count as whitespace.
///
/// - `import a.b, c as d` yields `a` and `c`
/// - `from a.b import c` yields `a`
/// - relative imports (`from . import x`) and statements with nothing
///   after `import` yield nothing
pub fn imports_from_source(source: &str) -> BTreeSet<String> {
    let mut imports = BTreeSet::new();

    for line in source.lines() {
        let code = line.split('#').next().unwrap_or_default();
        for statement in code.split(';') {
            statement_imports(statement.trim(), &mut imports);
        }
    }

    imports
}

fn statement_imports(statement: &str, imports: &mut BTreeSet<String>) {
    if !statement.starts_with("import ") && !statement.starts_with("from ") {
        return;
    }

    let code = statement.replace(',', " ");
    let words: Vec<&str> = code.split_whitespace().collect();

    let Some(import_idx) = words.iter().position(|w| *w == "import") else {
        return;
    };

    if words[0] == "from" {
        if import_idx < 2 {
            return;
        }
        if let Some(name) = top_level(words[1]) {
            imports.insert(name.to_string());
        }
        return;
    }

    let mut skip_alias = false;
    for word in &words[import_idx + 1..] {
        if skip_alias {
            skip_alias = false;
            continue;
        }
        if *word == "as" {
            skip_alias = true;
            continue;
        }
        if let Some(name) = top_level(word) {
            imports.insert(name.to_string());
        }
    }
}

/// First dotted component of a module path; `None` for relative modules.
fn top_level(module: &str) -> Option<&str> {
    module.split('.').next().filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(source: &str) -> Vec<String> {
        imports_from_source(source).into_iter().collect()
    }

    #[test]
    fn test_aliased_and_multi_name_imports() {
        let notebook = JupyterNotebook::from_json(
            r#"{"cells": [
                {"cell_type": "code", "source": "import numpy as np"},
                {"cell_type": "code", "source": "import pandas as pd, os"}
            ]}"#,
        )
        .unwrap();

        let imports: Vec<String> = extract_imports(&notebook).into_iter().collect();
        assert_eq!(imports, vec!["numpy", "os", "pandas"]);
    }

    #[test]
    fn test_from_import_yields_module_not_member() {
        assert_eq!(names("from sklearn.model_selection import train_test_split"), vec!["sklearn"]);
        assert_eq!(names("from collections import OrderedDict, defaultdict"), vec!["collections"]);
    }

    #[test]
    fn test_dotted_import_truncated() {
        assert_eq!(names("import os.path"), vec!["os"]);
        assert_eq!(names("import matplotlib.pyplot as plt"), vec!["matplotlib"]);
    }

    #[test]
    fn test_inline_comments_and_indentation() {
        let source = "    import json  # used for config, yaml\nif True:\n\timport re # regex";
        assert_eq!(names(source), vec!["json", "re"]);
    }

    #[test]
    fn test_malformed_and_relative_lines_skipped() {
        assert!(names("import \nimport # nothing here").is_empty());
        assert!(names("from . import sibling").is_empty());
        assert!(names("from .local import thing").is_empty());
        assert!(names("from requests").is_empty());
    }

    #[test]
    fn test_semicolon_separated_statements() {
        assert_eq!(names("import os; import sys"), vec!["os", "sys"]);
        assert_eq!(names("x = 1; from pathlib import Path;"), vec!["pathlib"]);
        assert_eq!(names("import json # a; import hidden"), vec!["json"]);
    }

    #[test]
    fn test_non_import_lines_ignored() {
        let source = "x = 'import fake'\nprint('from here')\nimported = 1";
        assert!(names(source).is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let source = "import numpy\nimport numpy as np\nfrom numpy import array";
        assert_eq!(names(source), vec!["numpy"]);
    }

    #[test]
    fn test_markdown_cells_are_not_scanned() {
        let notebook = JupyterNotebook::from_json(
            r#"{"cells": [
                {"cell_type": "markdown", "source": "import hidden"},
                {"cell_type": "raw", "source": "import raw_cell"},
                {"cell_type": "code", "source": ["import scipy\n"]}
            ]}"#,
        )
        .unwrap();

        let imports: Vec<String> = extract_imports(&notebook).into_iter().collect();
        assert_eq!(imports, vec!["scipy"]);
    }
}
