//! Schema-driven SOAP marshaling and RPC invocation for the vSphere VIM
//! protocol.
//!
//! The protocol's type system is not known at build time: data-object
//! layouts, managed-object types and enumerations are described by a
//! schema loaded at runtime through the [`TypeRegistry`] collaborator.
//! This crate is the marshaling pipeline over that open-ended type
//! hierarchy — it renders typed values into protocol-conformant XML
//! requests, submits them through a [`Transport`] collaborator, translates
//! server faults, and parses responses back into typed values.
//!
//! # Architecture
//!
//! ```text
//! Connection::invoke
//!   ├─ marshal::serialize_value   (value model → request XML)
//!   ├─ Transport::send            (blocking exchange, supplied by caller)
//!   ├─ fault::check_fault         (fault-code detection + translation)
//!   └─ marshal::deserialize_value (response XML → value model)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vmomi_wire::{CallDescriptor, Connection, ManagedObjectRef, PropertyMap, Transport};
//!
//! struct HttpTransport; // your HTTP/TLS session
//!
//! impl Transport for HttpTransport {
//!     fn send(&mut self, ns_and_rev: &str, body: &str) -> vmomi_wire::Result<(String, usize)> {
//!         // POST the enveloped body, return the response document
//!         unimplemented!()
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = vmomi_schema::SchemaRegistry::from_file("vim-types.json")?;
//! let mut conn = Connection::new(HttpTransport, Arc::new(schema), "urn:vim25", "8.0.1.0");
//!
//! let si = ManagedObjectRef::new("ServiceInstance", "ServiceInstance");
//! let desc = CallDescriptor {
//!     params: vec![],
//!     result: Some(vmomi_wire::ResultDescriptor {
//!         wire_type: "xsd:dateTime".into(),
//!         is_array: false,
//!         is_task: false,
//!     }),
//! };
//! let now = conn.invoke("CurrentTime", &desc, &si, &PropertyMap::new())?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod error;
pub mod fault;
pub mod marshal;
pub mod registry;
pub mod transport;
pub mod types;
pub mod xml;

// Re-export key types
pub use connection::{Connection, ProfileRecord, ProfileSummary};
pub use error::{Result, WireError};
pub use registry::{
    CallDescriptor, FieldDescriptor, PrimitiveKind, ResultDescriptor, TypeDescriptor, TypeKind,
    TypeRegistry,
};
pub use transport::Transport;
pub use types::{DataObject, KeyValue, ManagedObjectRef, PropertyMap, Value};
