//! The typed value model: the domain representations the marshaling
//! pipeline reads from and writes into.
//!
//! Every kind of value that can cross the wire is one variant of the closed
//! [`Value`] enum; the serializer and deserializer dispatch by exhaustive
//! match, never by open-ended runtime inspection.

use ahash::AHashMap;
use chrono::{DateTime, Utc};

/// A property or parameter mapping, keyed by wire field name.
pub type PropertyMap = AHashMap<String, Value>;

/// Any value that can be sent or received over the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Opaque bytes; base64 text on the wire.
    Binary(Vec<u8>),
    DateTime(DateTime<Utc>),
    /// An enumeration tag; the literal string on the wire.
    Enum(String),
    KeyValue(KeyValue),
    Object(DataObject),
    Ref(ManagedObjectRef),
    Array(Vec<Value>),
    /// An untyped property literal. Accepted on the request side only where
    /// a data-object type is declared; it is materialized into that type
    /// before emission.
    Props(PropertyMap),
}

impl Value {
    /// A short human-readable name for the value's kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Binary(_) => "binary",
            Value::DateTime(_) => "dateTime",
            Value::Enum(_) => "enum",
            Value::KeyValue(_) => "KeyValue",
            Value::Object(_) => "data object",
            Value::Ref(_) => "managed object reference",
            Value::Array(_) => "array",
            Value::Props(_) => "property map",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&DataObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_moref(&self) -> Option<&ManagedObjectRef> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::DateTime(t)
    }
}

impl From<DataObject> for Value {
    fn from(o: DataObject) -> Self {
        Value::Object(o)
    }
}

impl From<ManagedObjectRef> for Value {
    fn from(r: ManagedObjectRef) -> Self {
        Value::Ref(r)
    }
}

impl From<KeyValue> for Value {
    fn from(kv: KeyValue) -> Self {
        Value::KeyValue(kv)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// A structured value type with named, typed fields.
///
/// `props` holds only the properties actually present; absent optional
/// fields are absent keys, not null sentinels. Array-declared fields are
/// always present as a (possibly empty) [`Value::Array`] after
/// deserialization.
#[derive(Debug, Clone, PartialEq)]
pub struct DataObject {
    /// The object's own wire type name.
    pub type_name: String,
    props: PropertyMap,
}

impl DataObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            props: PropertyMap::new(),
        }
    }

    pub fn from_props(type_name: impl Into<String>, props: PropertyMap) -> Self {
        Self {
            type_name: type_name.into(),
            props,
        }
    }

    /// Builder-style property assignment.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.props.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.props.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.props.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.props.contains_key(name)
    }

    pub fn props(&self) -> &PropertyMap {
        &self.props
    }
}

/// A non-owning client-side handle designating a remote managed object.
///
/// Equality is by `(type_name, id)`. The handle owns no server resource;
/// it is a plain value, and calls against it take the connection
/// explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManagedObjectRef {
    /// The concrete managed-object type name, e.g. `Folder`.
    pub type_name: String,
    /// The remote-side identifier string, e.g. `group-d1`.
    pub id: String,
}

impl ManagedObjectRef {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

/// A fixed two-field structural type with no polymorphism.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moref_equality_is_by_type_and_id() {
        let a = ManagedObjectRef::new("Folder", "group-d1");
        let b = ManagedObjectRef::new("Folder", "group-d1");
        let c = ManagedObjectRef::new("Datacenter", "group-d1");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn data_object_builder() {
        let obj = DataObject::new("VirtualMachineConfigSpec")
            .with("name", "web01")
            .with("numCPUs", 4i64);
        assert_eq!(obj.get("name"), Some(&Value::Str("web01".into())));
        assert_eq!(obj.get("numCPUs").and_then(Value::as_i64), Some(4));
        assert!(!obj.contains("memoryMB"));
    }
}
