//! Error types for the VIM wire protocol.

use thiserror::Error;

use crate::types::DataObject;

/// Result type alias using [`WireError`]
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors that can occur while marshaling, invoking, or unmarshaling a call.
///
/// All marshaling-side variants are deterministic caller/schema mismatches
/// and are not retryable. Only [`WireError::Fault`], [`WireError::UntypedFault`]
/// and [`WireError::Transport`] can reflect a condition a caller might
/// reasonably retry; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum WireError {
    /// Malformed call inputs, rejected before any network activity
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A required (non-optional) parameter was absent from the parameter map
    #[error("missing required parameter `{param}` for {method}")]
    MissingParameter { method: String, param: String },

    /// A value's runtime kind is incompatible with the declared wire type
    #[error("field `{field}`: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    /// A sequence value was supplied for a slot not declared as an array
    #[error("field `{field}`: got an array for non-array type {type_name}")]
    ArrayExpected { field: String, type_name: String },

    /// A value kind that can never be emitted into the declared slot
    #[error("field `{field}`: cannot serialize {actual} as {type_name}")]
    UnsupportedValue {
        field: String,
        type_name: String,
        actual: &'static str,
    },

    /// A wire type name not present in the loaded schema
    #[error("no such type `{0}`")]
    UnknownType(String),

    /// A resolved type kind that is invalid in the position it appeared
    #[error("element `{element}`: unexpected type {type_name}")]
    UnexpectedType { element: String, type_name: String },

    /// An element declared as anyType carried no explicit type annotation
    #[error("element `{element}`: attempted to deserialize an anyType value with no type annotation")]
    CannotDeserializeAny { element: String },

    /// A managed-object reference element without the mandatory type attribute
    #[error("element `{element}`: managed object reference is missing its type attribute")]
    MissingTypeAttribute { element: String },

    /// Element text that does not parse as the declared primitive
    #[error("cannot parse `{text}` as {type_name}")]
    InvalidScalar { type_name: String, text: String },

    /// Diagnostic context attached at a recursive deserialization boundary
    #[error("while deserializing `{element}` ({type_name}): {source}")]
    Deserialize {
        element: String,
        type_name: String,
        #[source]
        source: Box<WireError>,
    },

    /// A server-reported fault carrying a typed detail payload
    #[error("server fault: {message}")]
    Fault {
        message: String,
        detail: Box<DataObject>,
    },

    /// A server-reported fault with no typed detail payload; only the fault
    /// code and message text are available
    #[error("{code}: {message}")]
    UntypedFault { code: String, message: String },

    /// Opaque failure from the transport collaborator
    #[error("transport error: {0}")]
    Transport(String),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}
