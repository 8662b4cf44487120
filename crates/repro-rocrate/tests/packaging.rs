//! Integration tests for archive assembly.
//!
//! Builds crates with both backends from a realistic source folder and checks
//! the resulting metadata documents.

use std::fs;
use std::path::{Path, PathBuf};

use repro_rocrate::{
    ArchiveBackend, ArchiveStrategy, Enrichment, LibraryBackend, ManualBackend, bundle_archive,
    read_metadata,
};
use serde_json::{Value, json};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

/// A source folder with a notebook, a manifest and optional README/LICENSE.
fn source_folder(root: &Path, license: Option<&str>) -> PathBuf {
    let dir = root.join("study");
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("study.ipynb"), r#"{"cells": []}"#).unwrap();
    fs::write(dir.join("requirements.txt"), "numpy\n").unwrap();
    fs::write(dir.join("README.md"), "# Rainfall study\nMonthly totals per station.\n").unwrap();
    fs::write(dir.join("nested").join("ignored.txt"), "not a top-level file").unwrap();
    if let Some(text) = license {
        fs::write(dir.join("LICENSE"), text).unwrap();
    }
    dir
}

fn entity<'a>(doc: &'a Value, id: &str) -> &'a Value {
    doc["@graph"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["@id"] == id)
        .unwrap_or_else(|| panic!("no entity {}", id))
}

fn has_part(doc: &Value) -> Vec<String> {
    entity(doc, "./")["hasPart"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["@id"].as_str().unwrap().to_string())
        .collect()
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_file())
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

// =============================================================================
// Manual backend
// =============================================================================

#[test]
fn test_manual_has_part_lists_exactly_copied_files() {
    let temp = temp_dir();
    let source = source_folder(temp.path(), None);

    let archive = ManualBackend
        .build(&source, "Ada Lovelace", &Enrichment::default())
        .unwrap();
    assert_eq!(archive.path, temp.path().join("study-ro-crate"));

    let copied: Vec<String> = files_in(&archive.path)
        .into_iter()
        .filter(|n| n != "ro-crate-metadata.json")
        .collect();
    let doc = read_metadata(&archive.path).unwrap();

    assert_eq!(has_part(&doc), copied);
    assert_eq!(archive.parts, copied);
    assert_eq!(copied, vec!["README.md", "requirements.txt", "study.ipynb"]);
}

#[test]
fn test_manual_graph_entities() {
    let temp = temp_dir();
    let source = source_folder(temp.path(), Some("MIT License\n\nPermission is hereby granted"));

    let archive = ManualBackend
        .build(&source, "Ada Lovelace", &Enrichment::default())
        .unwrap();
    let doc = read_metadata(&archive.path).unwrap();

    assert_eq!(doc["@context"], "https://w3id.org/ro/crate/1.1/context");
    assert_eq!(entity(&doc, "ro-crate-metadata.json")["about"]["@id"], "./");

    let root = entity(&doc, "./");
    assert_eq!(root["name"], "study");
    assert_eq!(root["author"]["@id"], "#author");
    assert_eq!(root["license"]["@id"], "https://opensource.org/licenses/MIT");
    assert_eq!(root["keywords"], json!(["jupyter", "reproducibility", "ro-crate"]));
    assert_eq!(root["datePublished"].as_str().unwrap().len(), 10);

    assert_eq!(entity(&doc, "#author")["name"], "Ada Lovelace");

    let notebook = entity(&doc, "study.ipynb");
    assert_eq!(notebook["@type"], "SoftwareSourceCode");
    assert_eq!(
        notebook["programmingLanguage"],
        json!({"@id": "https://w3id.org/ro/terms#Python", "name": "Python"})
    );
}

#[test]
fn test_rebuild_keeps_unrelated_files() {
    let temp = temp_dir();
    let source = source_folder(temp.path(), None);

    let first = ManualBackend
        .build(&source, "A", &Enrichment::default())
        .unwrap();
    fs::write(first.path.join("user_notes.txt"), "keep me").unwrap();
    fs::write(first.path.join("study.ipynb"), "edited copy").unwrap();

    let second = ManualBackend
        .build(&source, "B", &Enrichment::default())
        .unwrap();
    assert_eq!(second.path, first.path);
    assert_eq!(
        fs::read_to_string(second.path.join("user_notes.txt")).unwrap(),
        "keep me"
    );
    assert_eq!(
        fs::read(second.path.join("study.ipynb")).unwrap(),
        fs::read(source.join("study.ipynb")).unwrap()
    );
    assert!(!second.parts.contains(&"user_notes.txt".to_string()));

    let doc = read_metadata(&second.path).unwrap();
    assert_eq!(entity(&doc, "#author")["name"], "B");
}

// =============================================================================
// Library backend
// =============================================================================

#[test]
fn test_library_backend_enriches_from_readme() {
    let temp = temp_dir();
    let source = source_folder(temp.path(), None);

    let archive = LibraryBackend
        .build(&source, "Ada Lovelace", &Enrichment::default())
        .unwrap();
    assert_eq!(archive.path, temp.path().join("study-library-ro-crate"));

    let doc = read_metadata(&archive.path).unwrap();
    let root = entity(&doc, "./");
    assert_eq!(root["name"], "Rainfall study");
    assert_eq!(root["description"], "Monthly totals per station.");
    assert_eq!(
        root["license"]["@id"],
        "https://creativecommons.org/licenses/by/4.0/"
    );
    assert_eq!(has_part(&doc), vec!["README.md", "requirements.txt", "study.ipynb"]);

    let notebook = entity(&doc, "study.ipynb");
    assert_eq!(notebook["@type"], json!(["File", "SoftwareSourceCode"]));
    assert_eq!(
        notebook["programmingLanguage"]["@id"],
        "https://w3id.org/ro/terms#Python"
    );
}

#[test]
fn test_library_license_inference_is_case_insensitive() {
    let temp = temp_dir();
    let source = source_folder(temp.path(), Some("mit license"));

    let crate_ = LibraryBackend
        .assemble(&source, "A", &Enrichment::default())
        .unwrap();
    assert_eq!(
        crate_.root().get("license"),
        Some(&json!({"@id": "https://opensource.org/licenses/MIT"}))
    );
}

#[test]
fn test_strategy_dispatch_and_bundle() {
    let temp = temp_dir();
    let source = source_folder(temp.path(), None);

    for strategy in [ArchiveStrategy::Manual, ArchiveStrategy::Library] {
        let archive = strategy
            .backend()
            .build(&source, "A", &Enrichment::default())
            .unwrap();
        assert_eq!(archive.strategy, strategy);
        assert_eq!(archive.name(), strategy.crate_name("study"));

        let bundle = bundle_archive(&archive.path).unwrap();
        assert!(bundle.is_file());
        assert!(bundle.to_string_lossy().ends_with(".tar.gz"));
    }
}

#[test]
fn test_bundle_with_long_notebook_name() {
    let temp = temp_dir();
    let name = "monthly_rainfall_totals_per_station_2019_2024_full";
    assert_eq!(name.len(), 50);
    let source = temp.path().join(name);
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join(format!("{}.ipynb", name)), r#"{"cells": []}"#).unwrap();

    for strategy in [ArchiveStrategy::Manual, ArchiveStrategy::Library] {
        let archive = strategy
            .backend()
            .build(&source, "A", &Enrichment::default())
            .unwrap();
        let bundle = bundle_archive(&archive.path).unwrap();
        assert!(bundle.is_file());
    }
}

#[test]
fn test_missing_source_folder() {
    let temp = temp_dir();
    let err = ManualBackend
        .build(&temp.path().join("absent"), "A", &Enrichment::default())
        .unwrap_err();
    assert!(err.hint().is_some());
}

#[test]
fn test_relocate_merges_into_existing_crate() {
    let temp = temp_dir();
    let source = source_folder(temp.path(), None);
    let target_dir = temp.path().join("ro_crates");
    let existing = target_dir.join("study-ro-crate");
    fs::create_dir_all(&existing).unwrap();
    fs::write(existing.join("old.txt"), "old").unwrap();
    fs::write(existing.join("ro-crate-metadata.json"), "{}").unwrap();

    let archive = ManualBackend
        .build(&source, "A", &Enrichment::default())
        .unwrap()
        .relocate(&target_dir)
        .unwrap();

    assert_eq!(archive.path, existing);
    assert_eq!(fs::read_to_string(archive.path.join("old.txt")).unwrap(), "old");
    let doc = read_metadata(&archive.path).unwrap();
    assert_eq!(entity(&doc, "./")["name"], "study");
    assert!(archive.path.join("study.ipynb").is_file());
    assert!(!temp.path().join("study-ro-crate").exists());
}

#[test]
fn test_relocate_moves_when_target_is_absent() {
    let temp = temp_dir();
    let source = source_folder(temp.path(), None);
    let target_dir = temp.path().join("ro_crates");
    fs::create_dir_all(&target_dir).unwrap();

    let archive = ManualBackend
        .build(&source, "A", &Enrichment::default())
        .unwrap()
        .relocate(&target_dir)
        .unwrap();

    assert_eq!(archive.path, target_dir.join("study-ro-crate"));
    assert!(archive.metadata_path().is_file());
    assert!(!temp.path().join("study-ro-crate").exists());
}
