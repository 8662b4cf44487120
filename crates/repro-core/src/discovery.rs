//! Notebook discovery.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::notebook::Notebook;
use crate::paths::OutputLayout;

const NOTEBOOK_EXTENSION: &str = "ipynb";

/// Find the notebooks selected by `input`.
///
/// A notebook file selects itself. A directory selects every `.ipynb`
/// below it, sorted by path, skipping hidden directories (such as
/// `.ipynb_checkpoints`) and the output tree of `layout`.
///
/// Notebooks in different folders that share a file stem are named by
/// their path below `input` instead (`a/analysis.ipynb` becomes
/// `a__analysis`), so their artifacts do not overwrite each other.
pub fn discover_notebooks(input: &Path, layout: &OutputLayout) -> Result<Vec<Notebook>> {
    if input.is_file() {
        if !is_notebook(input) {
            return Err(Error::InvalidInput(input.to_path_buf()));
        }
        return Ok(vec![Notebook::resolve(input)?]);
    }

    if !input.is_dir() {
        return Err(Error::InvalidInput(input.to_path_buf()));
    }

    let mut found = Vec::new();
    collect(input, layout, &mut found)?;
    found.sort();

    let mut notebooks = found
        .iter()
        .map(Notebook::resolve)
        .collect::<Result<Vec<_>>>()?;
    disambiguate(input, &found, &mut notebooks);
    tracing::debug!("Discovered {} notebooks under {}", notebooks.len(), input.display());
    Ok(notebooks)
}

fn collect(dir: &Path, layout: &OutputLayout, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_dir() {
            if is_hidden(&path) || layout.is_output_dir(&path) {
                continue;
            }
            collect(&path, layout, found)?;
        } else if is_notebook(&path) {
            found.push(path);
        }
    }
    Ok(())
}

/// Rename notebooks whose stems collide after their path below `input`.
fn disambiguate(input: &Path, found: &[PathBuf], notebooks: &mut [Notebook]) {
    let mut by_name: BTreeMap<String, usize> = BTreeMap::new();
    for notebook in notebooks.iter() {
        *by_name.entry(notebook.name()).or_default() += 1;
    }

    for (raw, notebook) in found.iter().zip(notebooks.iter_mut()) {
        if by_name.get(&notebook.name()).copied().unwrap_or_default() < 2 {
            continue;
        }
        let relative = raw.strip_prefix(input).unwrap_or(raw).with_extension("");
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("__");
        tracing::warn!(
            "Several notebooks are named {}; using {} for {}",
            notebook.name(),
            name,
            raw.display()
        );
        notebook.rename(name);
    }
}

fn is_notebook(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == NOTEBOOK_EXTENSION)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}
