//! Archive backend built on the [`RoCrate`] model.

use std::path::Path;

use crate::enrich::Enrichment;
use crate::error::ArchiveResult;
use crate::model::{METADATA_FILE, RoCrate, python_language, reference};
use crate::{Archive, ArchiveBackend, ArchiveStrategy, Source, file_name, today};

const AUTHOR_ID: &str = "#author";

/// Builds `<folder>-library-ro-crate` through [`RoCrate`], overlaying
/// README/LICENSE metadata and tagging notebooks as Python source.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryBackend;

impl LibraryBackend {
    /// Assemble the crate model for `source_dir` without writing it.
    pub fn assemble(
        &self,
        source_dir: &Path,
        author: &str,
        enrichment: &Enrichment,
    ) -> ArchiveResult<RoCrate> {
        let source = Source::open(source_dir)?;
        Ok(assemble(&source, author, enrichment))
    }
}

fn assemble(source: &Source, author: &str, enrichment: &Enrichment) -> RoCrate {
    let mut crate_ = RoCrate::new();

    for file in &source.files {
        let name = file_name(file);
        if name != METADATA_FILE {
            crate_.add_file(file, &name);
        }
    }

    let summary = enrichment.inspect(&source.dir, &source.name);
    summary.apply(crate_.root_mut());
    crate_.root_mut().set("datePublished", today());

    crate_.add_person(AUTHOR_ID, author);
    crate_.root_mut().set("author", reference(AUTHOR_ID));

    for entity in crate_.entities_mut().filter(|e| e.id.ends_with(".ipynb")) {
        entity
            .add_type("SoftwareSourceCode")
            .set("programmingLanguage", python_language());
    }

    crate_
}

impl ArchiveBackend for LibraryBackend {
    fn build(
        &self,
        source_dir: &Path,
        author: &str,
        enrichment: &Enrichment,
    ) -> ArchiveResult<Archive> {
        let source = Source::open(source_dir)?;
        let crate_ = assemble(&source, author, enrichment);

        let dest = source.destination(ArchiveStrategy::Library)?;
        crate_.write(&dest)?;

        let parts = crate_
            .entities()
            .iter()
            .filter(|e| e.has_type("File"))
            .map(|e| e.id.clone())
            .collect();

        tracing::info!("RO-Crate generated at {}", dest.display());
        Ok(Archive {
            path: dest,
            parts,
            strategy: ArchiveStrategy::Library,
        })
    }
}
