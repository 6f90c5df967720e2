//! Bidirectional, type-driven marshaling between the value model and the
//! wire's XML representation.
//!
//! Serialization dispatches on the runtime kind of the value,
//! cross-checked against the resolved descriptor for the declared wire
//! type. Deserialization dispatches on the *effective* type of an element:
//! an explicit `xsi:type` annotation when present, the statically declared
//! type otherwise. The two directions are intentionally asymmetric for
//! arrays — requests emit one sibling element per item, responses arrive
//! inside `ArrayOf*` wrapper types.

use base64::prelude::*;
use chrono::{DateTime, Utc};

use crate::error::{Result, WireError};
use crate::registry::{self, PrimitiveKind, TypeKind, TypeRegistry};
use crate::types::{DataObject, KeyValue, ManagedObjectRef, Value};
use crate::xml::{self, Element};

// ============================================================================
// Request serialization
// ============================================================================

/// Render `value` into `out` as the XML element `name`, conforming to the
/// declared wire type.
///
/// `extra_attrs` are carried onto the emitted element; recursion uses them
/// to thread type-override annotations. Top-level callers pass `&[]`.
///
/// On error the buffer may hold a partially written element; the whole
/// emission attempt must be discarded, never sent.
pub fn serialize_value(
    out: &mut String,
    name: &str,
    declared_type: &str,
    is_array: bool,
    value: &Value,
    extra_attrs: &[(&str, &str)],
    registry: &dyn TypeRegistry,
) -> Result<()> {
    let declared = registry::lookup(registry, declared_type)?;

    // Array-declared slots take sequences only; scalars are never wrapped.
    if is_array && !matches!(value, Value::Array(_)) {
        return Err(WireError::TypeMismatch {
            field: name.to_string(),
            expected: format!("array of {}", declared.name),
            actual: value.kind_name().to_string(),
        });
    }

    match value {
        Value::Array(items) => {
            if declared.kind == TypeKind::KeyValue {
                return Err(WireError::TypeMismatch {
                    field: name.to_string(),
                    expected: declared.name.clone(),
                    actual: "array".to_string(),
                });
            }
            if !is_array {
                return Err(WireError::ArrayExpected {
                    field: name.to_string(),
                    type_name: declared.name.clone(),
                });
            }
            for item in items {
                serialize_value(out, name, declared_type, false, item, extra_attrs, registry)?;
            }
            Ok(())
        }
        Value::KeyValue(kv) => {
            if declared.kind != TypeKind::KeyValue {
                return Err(WireError::TypeMismatch {
                    field: name.to_string(),
                    expected: declared.name.clone(),
                    actual: "KeyValue".to_string(),
                });
            }
            open_tag(out, name, extra_attrs);
            text_tag(out, "key", &[], &kv.key);
            text_tag(out, "value", &[], &kv.value);
            close_tag(out, name);
            Ok(())
        }
        Value::Ref(moref) => {
            if !registry::is_subtype(registry, &moref.type_name, &declared.name)? {
                return Err(WireError::TypeMismatch {
                    field: name.to_string(),
                    expected: declared.name.clone(),
                    actual: moref.type_name.clone(),
                });
            }
            let mut attrs = extra_attrs.to_vec();
            attrs.push(("type", moref.type_name.as_str()));
            text_tag(out, name, &attrs, &moref.id);
            Ok(())
        }
        Value::Object(obj) => {
            if !registry::is_subtype(registry, &obj.type_name, &declared.name)? {
                return Err(WireError::TypeMismatch {
                    field: name.to_string(),
                    expected: declared.name.clone(),
                    actual: obj.type_name.clone(),
                });
            }
            let desc = registry::lookup(registry, &obj.type_name)?;
            let mut attrs = extra_attrs.to_vec();
            attrs.push(("xsi:type", obj.type_name.as_str()));
            open_tag(out, name, &attrs);
            // Full field list of the object's own type, in schema order;
            // absent properties are omitted.
            for field in &desc.fields {
                if let Some(v) = obj.get(&field.name) {
                    serialize_value(
                        out,
                        &field.name,
                        &field.wire_type,
                        field.is_array,
                        v,
                        &[],
                        registry,
                    )?;
                }
            }
            close_tag(out, name);
            Ok(())
        }
        Value::Props(props) => {
            if declared.kind != TypeKind::DataObject {
                return Err(WireError::TypeMismatch {
                    field: name.to_string(),
                    expected: declared.name.clone(),
                    actual: "property map".to_string(),
                });
            }
            let obj = DataObject::from_props(declared.name.clone(), props.clone());
            serialize_value(
                out,
                name,
                declared_type,
                false,
                &Value::Object(obj),
                extra_attrs,
                registry,
            )
        }
        Value::Enum(tag) => {
            text_tag(out, name, extra_attrs, tag);
            Ok(())
        }
        Value::Bool(b) => match declared.kind {
            TypeKind::Primitive(PrimitiveKind::Boolean) => {
                text_tag(out, name, extra_attrs, if *b { "1" } else { "0" });
                Ok(())
            }
            TypeKind::Any => {
                emit_annotated(out, name, extra_attrs, "xsd:boolean", if *b { "1" } else { "0" });
                Ok(())
            }
            _ => Err(WireError::TypeMismatch {
                field: name.to_string(),
                expected: declared.name.clone(),
                actual: "boolean".to_string(),
            }),
        },
        Value::Str(s) => match declared.kind {
            TypeKind::Primitive(PrimitiveKind::Binary) => {
                text_tag(out, name, extra_attrs, &BASE64_STANDARD.encode(s.as_bytes()));
                Ok(())
            }
            TypeKind::Any => {
                emit_annotated(out, name, extra_attrs, "xsd:string", s);
                Ok(())
            }
            _ => {
                text_tag(out, name, extra_attrs, s);
                Ok(())
            }
        },
        Value::Binary(bytes) => match declared.kind {
            TypeKind::Primitive(PrimitiveKind::Binary) => {
                text_tag(out, name, extra_attrs, &BASE64_STANDARD.encode(bytes));
                Ok(())
            }
            TypeKind::Any => {
                emit_annotated(
                    out,
                    name,
                    extra_attrs,
                    "xsd:base64Binary",
                    &BASE64_STANDARD.encode(bytes),
                );
                Ok(())
            }
            _ => Err(unsupported(name, &declared.name, value)),
        },
        Value::Int(n) => match declared.kind {
            TypeKind::Primitive(PrimitiveKind::Int) | TypeKind::Primitive(PrimitiveKind::Float) => {
                text_tag(out, name, extra_attrs, &n.to_string());
                Ok(())
            }
            TypeKind::Any => {
                emit_annotated(out, name, extra_attrs, "xsd:long", &n.to_string());
                Ok(())
            }
            _ => Err(unsupported(name, &declared.name, value)),
        },
        Value::Float(f) => match declared.kind {
            TypeKind::Primitive(PrimitiveKind::Float) => {
                text_tag(out, name, extra_attrs, &f.to_string());
                Ok(())
            }
            TypeKind::Any => {
                emit_annotated(out, name, extra_attrs, "xsd:double", &f.to_string());
                Ok(())
            }
            _ => Err(unsupported(name, &declared.name, value)),
        },
        Value::DateTime(t) => {
            let text = t.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true);
            match declared.kind {
                TypeKind::Primitive(PrimitiveKind::DateTime) => {
                    text_tag(out, name, extra_attrs, &text);
                    Ok(())
                }
                TypeKind::Any => {
                    emit_annotated(out, name, extra_attrs, "xsd:dateTime", &text);
                    Ok(())
                }
                _ => Err(unsupported(name, &declared.name, value)),
            }
        }
    }
}

fn unsupported(field: &str, type_name: &str, value: &Value) -> WireError {
    WireError::UnsupportedValue {
        field: field.to_string(),
        type_name: type_name.to_string(),
        actual: value.kind_name(),
    }
}

fn emit_annotated(out: &mut String, name: &str, extra: &[(&str, &str)], marker: &str, text: &str) {
    let mut attrs = extra.to_vec();
    attrs.push(("xsi:type", marker));
    text_tag(out, name, &attrs, text);
}

fn open_tag(out: &mut String, name: &str, attrs: &[(&str, &str)]) {
    out.push('<');
    out.push_str(name);
    for (k, v) in attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&xml::escape(v));
        out.push('"');
    }
    out.push('>');
}

fn close_tag(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn text_tag(out: &mut String, name: &str, attrs: &[(&str, &str)], text: &str) {
    open_tag(out, name, attrs);
    out.push_str(&xml::escape(text));
    close_tag(out, name);
}

// ============================================================================
// Response deserialization
// ============================================================================

/// Parse an element into a typed value, using the declared wire type
/// unless the element carries an explicit `xsi:type` override.
///
/// Every failure crossing this boundary is wrapped with the element's tag
/// and effective type name before propagating; a failed field is never
/// replaced with a default.
pub fn deserialize_value(
    elem: &Element,
    declared_type: &str,
    registry: &dyn TypeRegistry,
) -> Result<Value> {
    let effective = elem.attr("xsi:type").unwrap_or(declared_type).to_string();
    deserialize_typed(elem, &effective, registry).map_err(|source| WireError::Deserialize {
        element: elem.name.clone(),
        type_name: effective,
        source: Box::new(source),
    })
}

fn deserialize_typed(elem: &Element, effective: &str, registry: &dyn TypeRegistry) -> Result<Value> {
    if let Some(suffix) = effective.strip_prefix("ArrayOf") {
        let item_type = demangle_array_type(suffix);
        let mut items = Vec::with_capacity(elem.children.len());
        for child in &elem.children {
            items.push(deserialize_value(child, &item_type, registry)?);
        }
        return Ok(Value::Array(items));
    }

    let desc = registry::lookup(registry, effective)?;
    match desc.kind {
        TypeKind::DataObject => {
            let mut obj = DataObject::new(desc.name.clone());
            // Array-declared fields are present even when no elements arrived.
            for field in desc.fields.iter().filter(|f| f.is_array) {
                obj.set(field.name.clone(), Value::Array(Vec::new()));
            }
            for child in &elem.children {
                let Some(field) = desc.field(&child.name) else {
                    continue; // unknown elements are ignored, not stored
                };
                let value = deserialize_value(child, &field.wire_type, registry)?;
                if field.is_array {
                    if let Some(Value::Array(items)) = obj.get_mut(&child.name) {
                        items.push(value);
                        continue;
                    }
                }
                obj.set(child.name.clone(), value);
            }
            Ok(Value::Object(obj))
        }
        TypeKind::ManagedObjectReference => {
            let type_name = elem
                .attr("type")
                .ok_or_else(|| WireError::MissingTypeAttribute {
                    element: elem.name.clone(),
                })?;
            Ok(Value::Ref(ManagedObjectRef::new(type_name, elem.text.clone())))
        }
        TypeKind::ManagedObject => {
            let type_name = elem.attr("type").unwrap_or(&desc.name);
            Ok(Value::Ref(ManagedObjectRef::new(type_name, elem.text.clone())))
        }
        TypeKind::Enum => Ok(Value::Enum(elem.text.clone())),
        TypeKind::KeyValue => {
            let key = elem.child("key").map(|c| c.text.clone()).unwrap_or_default();
            let value = elem
                .child("value")
                .map(|c| c.text.clone())
                .unwrap_or_default();
            Ok(Value::KeyValue(KeyValue { key, value }))
        }
        TypeKind::Primitive(kind) => parse_primitive(kind, &desc.name, &elem.text),
        TypeKind::Any => Err(WireError::CannotDeserializeAny {
            element: elem.name.clone(),
        }),
    }
}

/// Demangle the suffix of an `ArrayOf*` wrapper name to the element type
/// name, applying the fixed primitive renames.
fn demangle_array_type(suffix: &str) -> String {
    match suffix {
        "AnyType" => "anyType".to_string(),
        "DateTime" => "dateTime".to_string(),
        "Boolean" | "String" | "Byte" | "Short" | "Int" | "Long" | "Float" | "Double" => {
            suffix.to_ascii_lowercase()
        }
        other => other.to_string(),
    }
}

fn parse_primitive(kind: PrimitiveKind, type_name: &str, text: &str) -> Result<Value> {
    match kind {
        PrimitiveKind::Boolean => Ok(Value::Bool(text == "true" || text == "1")),
        PrimitiveKind::Int => text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| invalid_scalar(type_name, text)),
        PrimitiveKind::Float => text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| invalid_scalar(type_name, text)),
        PrimitiveKind::Str => Ok(Value::Str(text.to_string())),
        PrimitiveKind::DateTime => DateTime::parse_from_rfc3339(text)
            .map(|t| Value::DateTime(t.with_timezone(&Utc)))
            .map_err(|_| invalid_scalar(type_name, text)),
        PrimitiveKind::Binary => {
            // Servers may wrap base64 bodies; the decoder does not.
            let compact: String = text.split_whitespace().collect();
            BASE64_STANDARD
                .decode(compact.as_bytes())
                .map(Value::Binary)
                .map_err(|_| invalid_scalar(type_name, text))
        }
    }
}

fn invalid_scalar(type_name: &str, text: &str) -> WireError {
    WireError::InvalidScalar {
        type_name: type_name.to_string(),
        text: text.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::registry::{FieldDescriptor, TypeDescriptor, TypeKind};
    use crate::types::PropertyMap;

    struct StaticRegistry {
        types: ahash::AHashMap<String, Arc<TypeDescriptor>>,
    }

    impl StaticRegistry {
        fn new(types: Vec<TypeDescriptor>) -> Self {
            Self {
                types: types
                    .into_iter()
                    .map(|t| (t.name.clone(), Arc::new(t)))
                    .collect(),
            }
        }
    }

    impl TypeRegistry for StaticRegistry {
        fn resolve(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
            self.types
                .get(name)
                .cloned()
                .ok_or_else(|| WireError::UnknownType(name.to_string()))
        }

        fn has_type(&self, name: &str) -> bool {
            self.types.contains_key(name)
        }
    }

    fn registry() -> StaticRegistry {
        let mut tag_spec = TypeDescriptor::new("TagSpec", TypeKind::DataObject);
        tag_spec.fields = vec![
            FieldDescriptor::new("name", "xsd:string"),
            FieldDescriptor::new("tags", "xsd:string").array().optional(),
        ];

        let mut option_value = TypeDescriptor::new("OptionValue", TypeKind::DataObject);
        option_value.fields = vec![
            FieldDescriptor::new("key", "xsd:string"),
            FieldDescriptor::new("value", "anyType").optional(),
        ];

        let mut snapshot_tree = TypeDescriptor::new("SnapshotTree", TypeKind::DataObject);
        snapshot_tree.fields = vec![
            FieldDescriptor::new("snapshot", "ManagedObjectReference"),
            FieldDescriptor::new("name", "xsd:string"),
            FieldDescriptor::new("createTime", "xsd:dateTime"),
            FieldDescriptor::new("childSnapshotList", "SnapshotTree")
                .array()
                .optional(),
        ];

        let managed_entity = {
            let mut d = TypeDescriptor::new("ManagedEntity", TypeKind::ManagedObject);
            d.parent = Some("ManagedObject".to_string());
            d
        };
        let folder = {
            let mut d = TypeDescriptor::new("Folder", TypeKind::ManagedObject);
            d.parent = Some("ManagedEntity".to_string());
            d
        };
        let datacenter = {
            let mut d = TypeDescriptor::new("Datacenter", TypeKind::ManagedObject);
            d.parent = Some("ManagedEntity".to_string());
            d
        };

        StaticRegistry::new(vec![
            tag_spec,
            option_value,
            snapshot_tree,
            managed_entity,
            folder,
            datacenter,
            TypeDescriptor::new("VirtualMachinePowerState", TypeKind::Enum),
        ])
    }

    fn serialize_one(name: &str, declared: &str, is_array: bool, value: &Value) -> Result<String> {
        let mut out = String::new();
        serialize_value(&mut out, name, declared, is_array, value, &[], &registry())?;
        Ok(out)
    }

    fn round_trip(declared: &str, value: &Value) -> Value {
        let doc = serialize_one("v", declared, false, value).unwrap();
        let elem = Element::parse(&doc).unwrap();
        deserialize_value(&elem, declared, &registry()).unwrap()
    }

    /// Walk the diagnostic-context chain down to the original failure.
    fn root_cause(err: WireError) -> WireError {
        match err {
            WireError::Deserialize { source, .. } => root_cause(*source),
            other => other,
        }
    }

    #[test]
    fn data_object_round_trip() {
        let obj = DataObject::new("TagSpec")
            .with("name", "x")
            .with("tags", Value::Array(vec!["a".into(), "b".into(), "c".into()]));
        assert_eq!(round_trip("TagSpec", &Value::Object(obj.clone())), Value::Object(obj));
    }

    #[test]
    fn empty_array_field_survives_a_round_trip() {
        // {name: "x", tags: []} serializes with no `tags` children and
        // comes back with tags = [], not absent.
        let obj = DataObject::new("TagSpec")
            .with("name", "x")
            .with("tags", Value::Array(Vec::new()));
        let doc = serialize_one("spec", "TagSpec", false, &Value::Object(obj.clone())).unwrap();
        assert!(!doc.contains("<tags"));
        let back = deserialize_value(&Element::parse(&doc).unwrap(), "TagSpec", &registry()).unwrap();
        assert_eq!(back, Value::Object(obj));
    }

    #[test]
    fn nested_recursive_objects_round_trip() {
        let child = DataObject::new("SnapshotTree")
            .with("snapshot", ManagedObjectRef::new("Folder", "snap-2"))
            .with("name", "before-upgrade")
            .with(
                "createTime",
                "2024-03-01T08:30:00Z".parse::<DateTime<Utc>>().unwrap(),
            )
            .with("childSnapshotList", Value::Array(Vec::new()));
        let parent = DataObject::new("SnapshotTree")
            .with("snapshot", ManagedObjectRef::new("Folder", "snap-1"))
            .with("name", "base")
            .with(
                "createTime",
                "2024-02-28T23:59:59Z".parse::<DateTime<Utc>>().unwrap(),
            )
            .with("childSnapshotList", Value::Array(vec![Value::Object(child)]));
        assert_eq!(
            round_trip("SnapshotTree", &Value::Object(parent.clone())),
            Value::Object(parent)
        );
    }

    #[test]
    fn moref_serializes_to_id_text_with_type_attr() {
        let moref = ManagedObjectRef::new("Folder", "group-d1");
        let doc = serialize_one("obj", "ManagedObject", false, &Value::Ref(moref.clone())).unwrap();
        assert_eq!(doc, r#"<obj type="Folder">group-d1</obj>"#);

        // Deserializing that exact element as a generic reference
        // reproduces the handle.
        let back = deserialize_value(
            &Element::parse(&doc).unwrap(),
            "ManagedObjectReference",
            &registry(),
        )
        .unwrap();
        assert_eq!(back, Value::Ref(moref));
    }

    #[test]
    fn moref_into_an_ancestor_slot_is_accepted() {
        let moref = ManagedObjectRef::new("Folder", "group-d1");
        assert!(serialize_one("obj", "ManagedEntity", false, &Value::Ref(moref)).is_ok());
    }

    #[test]
    fn moref_into_an_unrelated_slot_is_rejected() {
        let moref = ManagedObjectRef::new("Folder", "group-d1");
        let err = serialize_one("obj", "Datacenter", false, &Value::Ref(moref)).unwrap_err();
        assert!(matches!(err, WireError::TypeMismatch { field, .. } if field == "obj"));
    }

    #[test]
    fn moref_without_type_attr_fails_as_generic_reference() {
        let elem = Element::parse("<obj>group-d1</obj>").unwrap();
        let err = deserialize_value(&elem, "ManagedObjectReference", &registry()).unwrap_err();
        assert!(matches!(
            root_cause(err),
            WireError::MissingTypeAttribute { element } if element == "obj"
        ));
    }

    #[test]
    fn moref_falls_back_to_declared_type_when_concrete() {
        let elem = Element::parse("<obj>group-d1</obj>").unwrap();
        let back = deserialize_value(&elem, "Folder", &registry()).unwrap();
        assert_eq!(back, Value::Ref(ManagedObjectRef::new("Folder", "group-d1")));
    }

    #[test]
    fn any_without_annotation_is_a_hard_failure() {
        let elem = Element::parse("<value>42</value>").unwrap();
        let err = deserialize_value(&elem, "anyType", &registry()).unwrap_err();
        assert!(matches!(
            root_cause(err),
            WireError::CannotDeserializeAny { element } if element == "value"
        ));
    }

    #[test]
    fn any_with_annotation_deserializes_as_the_annotated_type() {
        let elem = Element::parse(r#"<value xsi:type="xsd:long">42</value>"#).unwrap();
        assert_eq!(
            deserialize_value(&elem, "anyType", &registry()).unwrap(),
            Value::Int(42)
        );
    }

    #[test]
    fn scalars_into_any_slots_carry_type_markers() {
        for (value, marker, text) in [
            (Value::Bool(true), "xsd:boolean", "1"),
            (Value::Str("hi".into()), "xsd:string", "hi"),
            (Value::Int(7), "xsd:long", "7"),
            (Value::Float(1.5), "xsd:double", "1.5"),
        ] {
            let doc = serialize_one("value", "anyType", false, &value).unwrap();
            assert_eq!(doc, format!(r#"<value xsi:type="{marker}">{text}</value>"#));
        }
    }

    #[test]
    fn bool_emits_numeric_form() {
        assert_eq!(serialize_one("b", "boolean", false, &Value::Bool(true)).unwrap(), "<b>1</b>");
        assert_eq!(serialize_one("b", "boolean", false, &Value::Bool(false)).unwrap(), "<b>0</b>");
    }

    #[test]
    fn bool_parses_both_literal_forms() {
        for (text, expected) in [("true", true), ("1", true), ("false", false), ("0", false)] {
            let elem = Element::parse(&format!("<b>{text}</b>")).unwrap();
            assert_eq!(
                deserialize_value(&elem, "boolean", &registry()).unwrap(),
                Value::Bool(expected)
            );
        }
    }

    #[test]
    fn bool_into_a_string_slot_is_rejected() {
        let err = serialize_one("b", "string", false, &Value::Bool(true)).unwrap_err();
        assert!(matches!(err, WireError::TypeMismatch { .. }));
    }

    #[test]
    fn scalar_into_an_array_slot_is_rejected() {
        let obj = DataObject::new("TagSpec").with("name", "x").with("tags", "solo");
        let err = serialize_one("spec", "TagSpec", false, &Value::Object(obj)).unwrap_err();
        assert!(matches!(err, WireError::TypeMismatch { field, .. } if field == "tags"));
    }

    #[test]
    fn sequence_into_a_scalar_slot_is_rejected() {
        let err = serialize_one(
            "name",
            "string",
            false,
            &Value::Array(vec!["a".into(), "b".into()]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            WireError::ArrayExpected { field, type_name } if field == "name" && type_name == "string"
        ));
    }

    #[test]
    fn unknown_response_elements_are_skipped() {
        let doc = "<spec><name>x</name><futureField><nested/></futureField><tags>a</tags></spec>";
        let back =
            deserialize_value(&Element::parse(doc).unwrap(), "TagSpec", &registry()).unwrap();
        let expected = DataObject::new("TagSpec")
            .with("name", "x")
            .with("tags", Value::Array(vec!["a".into()]));
        assert_eq!(back, Value::Object(expected));
    }

    #[test]
    fn array_wrapper_demangles_primitive_suffixes() {
        let doc = "<returnval><e>a</e><e>b</e></returnval>";
        let elem = Element::parse(doc).unwrap();
        assert_eq!(
            deserialize_value(&elem, "ArrayOfString", &registry()).unwrap(),
            Value::Array(vec!["a".into(), "b".into()])
        );

        let doc = "<returnval><e>3</e><e>5</e></returnval>";
        let elem = Element::parse(doc).unwrap();
        assert_eq!(
            deserialize_value(&elem, "ArrayOfInt", &registry()).unwrap(),
            Value::Array(vec![Value::Int(3), Value::Int(5)])
        );
    }

    #[test]
    fn empty_array_wrapper_is_an_empty_sequence() {
        let elem = Element::parse("<returnval></returnval>").unwrap();
        assert_eq!(
            deserialize_value(&elem, "ArrayOfString", &registry()).unwrap(),
            Value::Array(Vec::new())
        );
    }

    #[test]
    fn array_wrapper_of_any_requires_per_item_annotations() {
        let doc = r#"<vals><v xsi:type="xsd:string">hi</v><v xsi:type="xsd:boolean">true</v></vals>"#;
        let elem = Element::parse(doc).unwrap();
        assert_eq!(
            deserialize_value(&elem, "ArrayOfAnyType", &registry()).unwrap(),
            Value::Array(vec![Value::Str("hi".into()), Value::Bool(true)])
        );

        let bare = Element::parse("<vals><v>hi</v></vals>").unwrap();
        let err = deserialize_value(&bare, "ArrayOfAnyType", &registry()).unwrap_err();
        assert!(matches!(root_cause(err), WireError::CannotDeserializeAny { .. }));
    }

    #[test]
    fn array_wrapper_of_data_objects() {
        let doc = "<returnval><e><name>x</name></e><e><name>y</name></e></returnval>";
        let elem = Element::parse(doc).unwrap();
        let back = deserialize_value(&elem, "ArrayOfTagSpec", &registry()).unwrap();
        let items = back.as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[1].as_object().unwrap().get("name"),
            Some(&Value::Str("y".into()))
        );
    }

    #[test]
    fn enum_round_trip() {
        let doc = serialize_one(
            "state",
            "VirtualMachinePowerState",
            false,
            &Value::Enum("poweredOn".into()),
        )
        .unwrap();
        assert_eq!(doc, "<state>poweredOn</state>");
        let back =
            deserialize_value(&Element::parse(&doc).unwrap(), "VirtualMachinePowerState", &registry())
                .unwrap();
        assert_eq!(back, Value::Enum("poweredOn".into()));
    }

    #[test]
    fn key_value_round_trip() {
        let kv = KeyValue::new("guestinfo.ip", "10.0.0.5");
        let doc = serialize_one("entry", "KeyValue", false, &Value::KeyValue(kv.clone())).unwrap();
        assert_eq!(
            doc,
            "<entry><key>guestinfo.ip</key><value>10.0.0.5</value></entry>"
        );
        let back = deserialize_value(&Element::parse(&doc).unwrap(), "KeyValue", &registry()).unwrap();
        assert_eq!(back, Value::KeyValue(kv));
    }

    #[test]
    fn key_value_with_a_missing_side_defaults_to_empty() {
        let elem = Element::parse("<entry><key>k</key></entry>").unwrap();
        assert_eq!(
            deserialize_value(&elem, "KeyValue", &registry()).unwrap(),
            Value::KeyValue(KeyValue::new("k", ""))
        );
    }

    #[test]
    fn key_value_into_another_slot_is_rejected() {
        let kv = Value::KeyValue(KeyValue::new("k", "v"));
        let err = serialize_one("entry", "string", false, &kv).unwrap_err();
        assert!(matches!(err, WireError::TypeMismatch { .. }));
    }

    #[test]
    fn sequence_into_a_key_value_slot_is_rejected() {
        let err = serialize_one(
            "entry",
            "KeyValue",
            true,
            &Value::Array(vec!["k".into(), "v".into()]),
        )
        .unwrap_err();
        assert!(matches!(err, WireError::TypeMismatch { .. }));
    }

    #[test]
    fn property_literal_materializes_into_the_declared_type() {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), "x".into());
        let from_props = serialize_one("spec", "TagSpec", false, &Value::Props(props)).unwrap();
        let from_object = serialize_one(
            "spec",
            "TagSpec",
            false,
            &Value::Object(DataObject::new("TagSpec").with("name", "x")),
        )
        .unwrap();
        assert_eq!(from_props, from_object);
    }

    #[test]
    fn property_literal_for_a_non_object_slot_is_rejected() {
        let err = serialize_one("spec", "string", false, &Value::Props(PropertyMap::new()))
            .unwrap_err();
        assert!(matches!(
            err,
            WireError::TypeMismatch { actual, .. } if actual == "property map"
        ));
    }

    #[test]
    fn binary_round_trips_as_base64() {
        let bytes = vec![0u8, 1, 2, 250, 255];
        let doc = serialize_one("data", "base64Binary", false, &Value::Binary(bytes.clone()))
            .unwrap();
        assert!(!doc.contains('\n'));
        let back =
            deserialize_value(&Element::parse(&doc).unwrap(), "base64Binary", &registry()).unwrap();
        assert_eq!(back, Value::Binary(bytes));
    }

    #[test]
    fn string_into_a_binary_slot_is_encoded() {
        let doc = serialize_one("data", "base64Binary", false, &"hi".into()).unwrap();
        assert_eq!(doc, "<data>aGk=</data>");
    }

    #[test]
    fn wrapped_base64_text_still_decodes() {
        let elem = Element::parse("<data>aGVsbG8g\n        d29ybGQ=</data>").unwrap();
        assert_eq!(
            deserialize_value(&elem, "base64Binary", &registry()).unwrap(),
            Value::Binary(b"hello world".to_vec())
        );
    }

    #[test]
    fn date_time_round_trip() {
        let t = "2011-11-16T13:43:46Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(round_trip("dateTime", &Value::DateTime(t)), Value::DateTime(t));
    }

    #[test]
    fn garbage_scalar_text_is_diagnosed_with_the_type() {
        let elem = Element::parse("<n>not-a-number</n>").unwrap();
        let err = deserialize_value(&elem, "int", &registry()).unwrap_err();
        assert!(matches!(
            root_cause(err),
            WireError::InvalidScalar { type_name, text } if type_name == "int" && text == "not-a-number"
        ));
    }

    #[test]
    fn failure_context_names_element_and_type() {
        let doc = "<spec><name>x</name><tags>ok</tags></spec>";
        // Declared type is unknown to the registry.
        let err = deserialize_value(&Element::parse(doc).unwrap(), "NoSuchSpec", &registry())
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("spec"), "missing element name: {text}");
        assert!(text.contains("NoSuchSpec"), "missing type name: {text}");
    }

    #[test]
    fn nested_failure_context_accumulates() {
        let doc = "<spec><name>x</name><createTime>garbage</createTime>\
                   <snapshot type=\"Folder\">s</snapshot></spec>";
        let err = deserialize_value(&Element::parse(doc).unwrap(), "SnapshotTree", &registry())
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("createTime"), "{text}");
        assert!(text.contains("dateTime"), "{text}");
        assert!(matches!(root_cause(err), WireError::InvalidScalar { .. }));
    }

    #[test]
    fn text_content_is_escaped_on_emission() {
        let doc = serialize_one("name", "string", false, &r#"a<b&"c""#.into()).unwrap();
        assert_eq!(doc, "<name>a&lt;b&amp;&quot;c&quot;</name>");
    }

    #[test]
    fn xsd_prefix_is_accepted_on_declared_types() {
        let elem = Element::parse("<n>12</n>").unwrap();
        assert_eq!(
            deserialize_value(&elem, "xsd:int", &registry()).unwrap(),
            Value::Int(12)
        );
    }
}
