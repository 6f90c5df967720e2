//! JSON-schema-backed implementation of the [`TypeRegistry`] collaborator.
//!
//! A schema document enumerates every data-object, managed-object and
//! enumeration type of the target API by name:
//!
//! ```json
//! {
//!   "types": {
//!     "DynamicData": {"kind": "data"},
//!     "VirtualMachineConfigSpec": {
//!       "kind": "data",
//!       "extends": "DynamicData",
//!       "fields": [
//!         {"name": "name", "type": "xsd:string", "optional": true},
//!         {"name": "numCPUs", "type": "xsd:int", "optional": true}
//!       ]
//!     },
//!     "Folder": {"kind": "managed", "extends": "ManagedEntity"},
//!     "VirtualMachinePowerState": {"kind": "enum"}
//!   }
//! }
//! ```
//!
//! The document is parsed once; descriptors are built lazily on first
//! resolution and memoized for the life of the process, with field lists
//! flattened across the inheritance chain (parents first, schema order).
//! Memoization uses a `RefCell`, so the registry is not `Sync`; callers
//! sharing one registry across threads must add their own synchronization.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ahash::AHashMap;
use serde::Deserialize;
use thiserror::Error;

use vmomi_wire::{FieldDescriptor, TypeDescriptor, TypeKind, TypeRegistry, WireError};

/// Errors raised while loading a schema document.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed schema document
    #[error("malformed schema document: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct SchemaDoc {
    types: HashMap<String, SchemaType>,
}

#[derive(Debug, Deserialize)]
struct SchemaType {
    kind: SchemaKind,
    #[serde(default)]
    extends: Option<String>,
    #[serde(default)]
    fields: Vec<SchemaField>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SchemaKind {
    Data,
    Managed,
    Enum,
}

#[derive(Debug, Deserialize)]
struct SchemaField {
    name: String,
    #[serde(rename = "type")]
    wire_type: String,
    #[serde(default)]
    array: bool,
    #[serde(default)]
    optional: bool,
}

/// A lazy, memoizing [`TypeRegistry`] over a parsed schema document.
#[derive(Debug)]
pub struct SchemaRegistry {
    raw: HashMap<String, SchemaType>,
    cache: RefCell<AHashMap<String, Arc<TypeDescriptor>>>,
}

impl SchemaRegistry {
    /// Parse a schema document from JSON text.
    pub fn from_json(doc: &str) -> Result<Self, SchemaError> {
        let doc: SchemaDoc = serde_json::from_str(doc)?;
        tracing::debug!(types = doc.types.len(), "loaded schema document");
        Ok(Self {
            raw: doc.types,
            cache: RefCell::new(AHashMap::new()),
        })
    }

    /// Load a schema document from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Number of types named by the schema.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    fn build(&self, name: &str, chain: &mut Vec<String>) -> vmomi_wire::Result<Arc<TypeDescriptor>> {
        if let Some(desc) = self.cache.borrow().get(name) {
            return Ok(desc.clone());
        }
        let raw = self
            .raw
            .get(name)
            .ok_or_else(|| WireError::UnknownType(name.to_string()))?;
        if chain.iter().any(|n| n == name) {
            return Err(WireError::InvalidArgument(format!(
                "cyclic type inheritance through `{name}`"
            )));
        }
        chain.push(name.to_string());

        let mut fields = Vec::new();
        if let Some(parent) = &raw.extends {
            // Builtin roots (ManagedObject etc.) carry no fields; only
            // schema-defined parents contribute to the flattened list.
            if self.raw.contains_key(parent) {
                let parent_desc = self.build(parent, chain)?;
                fields.extend(parent_desc.fields.iter().cloned());
            }
        }
        for f in &raw.fields {
            let mut fd = FieldDescriptor::new(f.name.clone(), f.wire_type.clone());
            if f.array {
                fd = fd.array();
            }
            if f.optional {
                fd = fd.optional();
            }
            fields.push(fd);
        }
        chain.pop();

        let kind = match raw.kind {
            SchemaKind::Data => TypeKind::DataObject,
            SchemaKind::Managed => TypeKind::ManagedObject,
            SchemaKind::Enum => TypeKind::Enum,
        };
        let desc = Arc::new(TypeDescriptor {
            name: name.to_string(),
            kind,
            parent: raw.extends.clone(),
            fields,
        });
        self.cache
            .borrow_mut()
            .insert(name.to_string(), desc.clone());
        Ok(desc)
    }
}

impl TypeRegistry for SchemaRegistry {
    fn resolve(&self, name: &str) -> vmomi_wire::Result<Arc<TypeDescriptor>> {
        self.build(name, &mut Vec::new())
    }

    fn has_type(&self, name: &str) -> bool {
        self.raw.contains_key(name)
    }
}
