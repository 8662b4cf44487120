//! Archive backend that writes the metadata graph directly.

use std::fs;
use std::path::Path;

use serde_json::{Value, json};

use crate::enrich::Enrichment;
use crate::error::{ArchiveError, ArchiveResult};
use crate::model::{
    METADATA_FILE, RO_CRATE_CONTEXT, RO_CRATE_SPEC, ROOT_ID, python_language, reference,
    write_metadata,
};
use crate::{Archive, ArchiveBackend, ArchiveStrategy, Source, file_name, today};

const AUTHOR_ID: &str = "#author";

/// Copies the source files into `<folder>-ro-crate` and describes them with
/// a hand-built graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualBackend;

impl ArchiveBackend for ManualBackend {
    fn build(
        &self,
        source_dir: &Path,
        author: &str,
        enrichment: &Enrichment,
    ) -> ArchiveResult<Archive> {
        let source = Source::open(source_dir)?;
        let dest = source.destination(ArchiveStrategy::Manual)?;

        for file in &source.files {
            let target = dest.join(file_name(file));
            fs::copy(file, &target).map_err(|e| ArchiveError::read(file, e))?;
        }

        let parts: Vec<String> = source
            .files
            .iter()
            .map(|f| file_name(f))
            .filter(|name| name != METADATA_FILE)
            .collect();

        let mut root = json!({
            "@id": ROOT_ID,
            "@type": "Dataset",
            "name": source.name,
            "datePublished": today(),
            "author": reference(AUTHOR_ID),
            "hasPart": parts.iter().map(|p| reference(p)).collect::<Vec<_>>(),
        });
        let summary = enrichment.inspect(&source.dir, &source.name);
        root["license"] = reference(&summary.license);
        root["keywords"] = Value::from(summary.keywords.clone());

        let mut graph = vec![
            json!({
                "@id": METADATA_FILE,
                "@type": "CreativeWork",
                "about": reference(ROOT_ID),
                "conformsTo": reference(RO_CRATE_SPEC),
            }),
            root,
            json!({
                "@id": AUTHOR_ID,
                "@type": "Person",
                "name": author,
            }),
        ];

        if let Some(notebook) = parts.iter().find(|p| p.ends_with(".ipynb")) {
            graph.push(json!({
                "@id": notebook,
                "@type": "SoftwareSourceCode",
                "name": notebook,
                "programmingLanguage": python_language(),
            }));
        }

        write_metadata(
            &dest,
            &json!({
                "@context": RO_CRATE_CONTEXT,
                "@graph": graph,
            }),
        )?;

        tracing::info!("RO-Crate created at {}", dest.display());
        Ok(Archive {
            path: dest,
            parts,
            strategy: ArchiveStrategy::Manual,
        })
    }
}
