//! RO-Crate entity graph.
//!
//! A crate is serialized as one JSON-LD document, `ro-crate-metadata.json`:
//!
//! ```text
//! {
//!   "@context": "https://w3id.org/ro/crate/1.1/context",
//!   "@graph": [
//!     metadata descriptor   (@id ro-crate-metadata.json, about ./)
//!     root dataset          (@id ./, name, datePublished, hasPart, author)
//!     data entities         (one per file)
//!     contextual entities   (people, ...)
//!   ]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{ArchiveError, ArchiveResult};

/// JSON-LD context of RO-Crate 1.1.
pub const RO_CRATE_CONTEXT: &str = "https://w3id.org/ro/crate/1.1/context";

/// Specification the metadata descriptor conforms to.
pub const RO_CRATE_SPEC: &str = "https://w3id.org/ro/crate/1.1";

/// File name of the metadata document.
pub const METADATA_FILE: &str = "ro-crate-metadata.json";

/// Identifier of the root data entity.
pub const ROOT_ID: &str = "./";

/// Language identifier attached to notebook entities.
pub const PYTHON_LANGUAGE_ID: &str = "https://w3id.org/ro/terms#Python";

/// The `programmingLanguage` value for notebooks.
pub fn python_language() -> Value {
    json!({ "@id": PYTHON_LANGUAGE_ID, "name": "Python" })
}

/// A reference to another entity in the graph.
pub fn reference(id: &str) -> Value {
    json!({ "@id": id })
}

/// One node of the `@graph`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity identifier
    #[serde(rename = "@id")]
    pub id: String,

    /// Entity type, a string or a list of strings
    #[serde(rename = "@type")]
    pub kind: Value,

    /// Remaining properties
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Entity {
    /// Create an entity with one type.
    pub fn new(id: impl Into<String>, kind: &str) -> Self {
        Self {
            id: id.into(),
            kind: Value::String(kind.to_string()),
            properties: Map::new(),
        }
    }

    /// Set a property, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Look up a property.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Add a type, turning a single type into a list.
    pub fn add_type(&mut self, kind: &str) -> &mut Self {
        if self.has_type(kind) {
            return self;
        }
        match &mut self.kind {
            Value::Array(kinds) => kinds.push(Value::String(kind.to_string())),
            other => {
                let existing = other.take();
                *other = json!([existing, kind]);
            }
        }
        self
    }

    /// Whether the entity carries type `kind`.
    pub fn has_type(&self, kind: &str) -> bool {
        match &self.kind {
            Value::String(k) => k == kind,
            Value::Array(kinds) => kinds.iter().any(|k| k == kind),
            _ => false,
        }
    }
}

/// A file to copy into the crate.
#[derive(Debug, Clone)]
struct Payload {
    source: PathBuf,
    dest: String,
}

/// An RO-Crate under construction.
///
/// Files are only copied when the crate is [written](RoCrate::write).
#[derive(Debug, Clone)]
pub struct RoCrate {
    root: Entity,
    entities: Vec<Entity>,
    payload: Vec<Payload>,
}

impl Default for RoCrate {
    fn default() -> Self {
        Self::new()
    }
}

impl RoCrate {
    /// Create an empty crate with a bare root dataset.
    pub fn new() -> Self {
        let mut root = Entity::new(ROOT_ID, "Dataset");
        root.set("hasPart", Value::Array(Vec::new()));
        Self {
            root,
            entities: Vec::new(),
            payload: Vec::new(),
        }
    }

    /// The root dataset.
    pub fn root(&self) -> &Entity {
        &self.root
    }

    /// The root dataset, for setting name, license and the like.
    pub fn root_mut(&mut self) -> &mut Entity {
        &mut self.root
    }

    /// Every non-root entity, in insertion order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Every non-root entity, mutably.
    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    /// Add a file entity copied from `source` to `dest` inside the crate,
    /// and list it under the root's `hasPart`.
    pub fn add_file(&mut self, source: impl Into<PathBuf>, dest: &str) -> &mut Entity {
        self.payload.push(Payload {
            source: source.into(),
            dest: dest.to_string(),
        });
        if let Some(Value::Array(parts)) = self.root.properties.get_mut("hasPart") {
            parts.push(reference(dest));
        }

        let mut entity = Entity::new(dest, "File");
        entity.set("name", dest);
        self.push(entity)
    }

    /// Add a `Person` contextual entity.
    pub fn add_person(&mut self, id: &str, name: &str) -> &mut Entity {
        let mut person = Entity::new(id, "Person");
        person.set("name", name);
        self.push(person)
    }

    fn push(&mut self, entity: Entity) -> &mut Entity {
        self.entities.push(entity);
        let last = self.entities.len() - 1;
        &mut self.entities[last]
    }

    /// Build the JSON-LD metadata document.
    pub fn to_json(&self) -> ArchiveResult<Value> {
        let mut descriptor = Entity::new(METADATA_FILE, "CreativeWork");
        descriptor
            .set("about", reference(ROOT_ID))
            .set("conformsTo", reference(RO_CRATE_SPEC));

        let mut graph = vec![serde_json::to_value(&descriptor)?, serde_json::to_value(&self.root)?];
        for entity in &self.entities {
            graph.push(serde_json::to_value(entity)?);
        }

        Ok(json!({
            "@context": RO_CRATE_CONTEXT,
            "@graph": graph,
        }))
    }

    /// Write the crate into `dest`: copy every file, then the metadata
    /// document. `dest` is created if needed.
    pub fn write(&self, dest: &Path) -> ArchiveResult<()> {
        fs::create_dir_all(dest).map_err(|e| ArchiveError::write(dest, e))?;

        for file in &self.payload {
            let target = dest.join(&file.dest);
            fs::copy(&file.source, &target).map_err(|e| ArchiveError::read(&file.source, e))?;
        }

        write_metadata(dest, &self.to_json()?)
    }
}

/// Write a metadata document as `ro-crate-metadata.json` inside `dir`.
pub(crate) fn write_metadata(dir: &Path, document: &Value) -> ArchiveResult<()> {
    let path = dir.join(METADATA_FILE);
    let text = serde_json::to_string_pretty(document)?;
    fs::write(&path, text).map_err(|e| ArchiveError::write(&path, e))
}

/// Read the metadata document of a written crate.
pub fn read_metadata(crate_dir: &Path) -> ArchiveResult<Value> {
    let path = crate_dir.join(METADATA_FILE);
    let text = fs::read_to_string(&path).map_err(|e| ArchiveError::read(&path, e))?;
    Ok(serde_json::from_str(&text)?)
}
