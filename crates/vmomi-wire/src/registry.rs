//! Type descriptors and the registry boundary.
//!
//! The protocol's type system is not known at build time; it is supplied by
//! a [`TypeRegistry`] collaborator that resolves wire type names to
//! immutable [`TypeDescriptor`]s. The marshaling core only consumes this
//! interface. A fixed table of builtin wire primitives (the `xsd:` family,
//! `KeyValue`, and the generic managed-object roots) resolves without
//! touching the registry.

use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::Lazy;

use crate::error::{Result, WireError};

/// The wire primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Boolean,
    Int,
    Float,
    Str,
    Binary,
    DateTime,
}

/// The kind of a wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Enum,
    DataObject,
    /// The generic reference wrapper; elements of this type must carry an
    /// explicit type annotation.
    ManagedObjectReference,
    /// A concrete managed-object type (or the generic `ManagedObject` root).
    ManagedObject,
    KeyValue,
    /// The polymorphic placeholder (`anyType`); never deserialized directly.
    Any,
}

/// One field of a structured type, or one parameter of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub wire_type: String,
    pub is_array: bool,
    pub is_optional: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, wire_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wire_type: wire_type.into(),
            is_array: false,
            is_optional: false,
        }
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }
}

/// Registry-supplied metadata describing one wire type.
///
/// Descriptors are immutable once loaded and are identified by name. For
/// data-object kinds, `fields` is the full ordered field list — own fields
/// and inherited ones, in schema order, parents first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
    /// The immediate supertype's name, if any.
    pub parent: Option<String>,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            fields: Vec::new(),
        }
    }

    /// Find a field descriptor by wire name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Per-call metadata supplied by the caller, sourced from the schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallDescriptor {
    /// Declared parameters, in declared order.
    pub params: Vec<FieldDescriptor>,
    /// Absent for void methods.
    pub result: Option<ResultDescriptor>,
}

/// Shape of a call's declared result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultDescriptor {
    pub wire_type: String,
    pub is_array: bool,
    /// Set when the call returns an asynchronous task handle instead of the
    /// declared result type.
    pub is_task: bool,
}

/// The type-descriptor collaborator.
///
/// Resolution failure is fatal to the current call, never retried.
/// Implementations are expected to load lazily and memoize for the life of
/// the process; they are not required to be thread-safe, and callers
/// sharing one registry across threads must synchronize externally.
pub trait TypeRegistry {
    /// Resolve a type name to its descriptor, or fail with
    /// [`WireError::UnknownType`].
    fn resolve(&self, name: &str) -> Result<Arc<TypeDescriptor>>;

    /// Whether the name is present in the loaded schema.
    fn has_type(&self, name: &str) -> bool;
}

static BUILTINS: Lazy<AHashMap<&'static str, Arc<TypeDescriptor>>> = Lazy::new(|| {
    let mut map = AHashMap::new();
    let mut put = |name: &'static str, kind: TypeKind| {
        map.insert(name, Arc::new(TypeDescriptor::new(name, kind)));
    };
    put("anyType", TypeKind::Any);
    put("boolean", TypeKind::Primitive(PrimitiveKind::Boolean));
    put("string", TypeKind::Primitive(PrimitiveKind::Str));
    put("int", TypeKind::Primitive(PrimitiveKind::Int));
    put("long", TypeKind::Primitive(PrimitiveKind::Int));
    put("short", TypeKind::Primitive(PrimitiveKind::Int));
    put("byte", TypeKind::Primitive(PrimitiveKind::Int));
    put("float", TypeKind::Primitive(PrimitiveKind::Float));
    put("double", TypeKind::Primitive(PrimitiveKind::Float));
    put("dateTime", TypeKind::Primitive(PrimitiveKind::DateTime));
    put("base64Binary", TypeKind::Primitive(PrimitiveKind::Binary));
    put("KeyValue", TypeKind::KeyValue);
    put("ManagedObject", TypeKind::ManagedObject);
    put("ManagedObjectReference", TypeKind::ManagedObjectReference);
    map
});

/// Resolve a wire type name, consulting the builtin table before the
/// registry. An `xsd:` namespace prefix is stripped first.
pub fn lookup(registry: &dyn TypeRegistry, name: &str) -> Result<Arc<TypeDescriptor>> {
    let name = name.strip_prefix("xsd:").unwrap_or(name);
    if let Some(desc) = BUILTINS.get(name) {
        return Ok(desc.clone());
    }
    registry.resolve(name)
}

/// Whether `sub` is an acceptable substitute for a slot declared as
/// `ancestor`: the same name, a managed kind against one of the generic
/// managed roots, or a type whose parent chain reaches `ancestor`.
pub fn is_subtype(registry: &dyn TypeRegistry, sub: &str, ancestor: &str) -> Result<bool> {
    let sub = sub.strip_prefix("xsd:").unwrap_or(sub);
    let ancestor = ancestor.strip_prefix("xsd:").unwrap_or(ancestor);
    if sub == ancestor || ancestor == "anyType" {
        return Ok(true);
    }
    let desc = lookup(registry, sub)?;
    if matches!(ancestor, "ManagedObject" | "ManagedObjectReference") {
        return Ok(matches!(
            desc.kind,
            TypeKind::ManagedObject | TypeKind::ManagedObjectReference
        ));
    }
    let mut current = desc;
    while let Some(parent) = current.parent.clone() {
        if parent == ancestor {
            return Ok(true);
        }
        current = lookup(registry, &parent)?;
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyRegistry;

    impl TypeRegistry for EmptyRegistry {
        fn resolve(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
            Err(WireError::UnknownType(name.to_string()))
        }

        fn has_type(&self, _name: &str) -> bool {
            false
        }
    }

    #[test]
    fn builtin_lookup_strips_xsd_prefix() {
        let desc = lookup(&EmptyRegistry, "xsd:string").unwrap();
        assert_eq!(desc.kind, TypeKind::Primitive(PrimitiveKind::Str));
        let desc = lookup(&EmptyRegistry, "boolean").unwrap();
        assert_eq!(desc.kind, TypeKind::Primitive(PrimitiveKind::Boolean));
    }

    #[test]
    fn integral_family_shares_a_kind() {
        for name in ["int", "long", "short", "byte"] {
            let desc = lookup(&EmptyRegistry, name).unwrap();
            assert_eq!(desc.kind, TypeKind::Primitive(PrimitiveKind::Int));
        }
    }

    #[test]
    fn unknown_type_is_fatal() {
        let err = lookup(&EmptyRegistry, "NoSuchThing").unwrap_err();
        assert!(matches!(err, WireError::UnknownType(name) if name == "NoSuchThing"));
    }

    #[test]
    fn a_type_is_its_own_subtype() {
        assert!(is_subtype(&EmptyRegistry, "string", "string").unwrap());
    }
}
