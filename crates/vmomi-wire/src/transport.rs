//! The transport collaborator boundary.

use crate::error::Result;

/// A blocking request/response exchange for complete XML envelopes.
///
/// The marshaling core hands over the rendered request body (the method
/// element — not the outer SOAP envelope) together with the
/// `namespace/revision` action string bound at connection construction,
/// and expects back the response document plus its byte size. The returned
/// document's root must be the method-response or fault element, with the
/// envelope already removed.
///
/// Session management, TLS, cookies, envelope framing, timeouts and retry
/// policy all live behind this boundary; the core never retries.
pub trait Transport {
    fn send(&mut self, ns_and_rev: &str, body: &str) -> Result<(String, usize)>;
}
