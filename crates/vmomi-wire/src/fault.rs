//! Detection and translation of server-reported faults.
//!
//! A response carrying a fault-code marker is always a fault, even when a
//! result body is present alongside it. A typed detail payload, when
//! supplied, is deserialized against the generic fault base type; without
//! one the call fails with the lower-fidelity code + message form.

use crate::error::{Result, WireError};
use crate::marshal;
use crate::registry::TypeRegistry;
use crate::types::Value;
use crate::xml::Element;

/// Declared wire type for fault detail payloads.
const FAULT_BASE_TYPE: &str = "MethodFault";

/// Fail if `root` is a fault response; otherwise return `Ok(())`.
pub fn check_fault(root: &Element, registry: &dyn TypeRegistry) -> Result<()> {
    let Some(code) = root.descendant("faultcode") else {
        return Ok(());
    };
    let message = root
        .descendant("faultstring")
        .map(|e| e.text.clone())
        .unwrap_or_default();

    if let Some(detail) = root.descendant("detail") {
        if let Some(payload) = detail.children.first() {
            tracing::debug!(element = %payload.name, "translating typed fault detail");
            return match marshal::deserialize_value(payload, FAULT_BASE_TYPE, registry)? {
                Value::Object(obj) => Err(WireError::Fault {
                    message,
                    detail: Box::new(obj),
                }),
                other => Err(WireError::UnexpectedType {
                    element: payload.name.clone(),
                    type_name: other.kind_name().to_string(),
                }),
            };
        }
    }

    tracing::debug!(code = %code.text, "fault response carried no typed detail");
    Err(WireError::UntypedFault {
        code: code.text.clone(),
        message,
    })
}
