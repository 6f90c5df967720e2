//! Call orchestration: one synchronous request/response round trip per
//! invocation, with optional per-call profiling.
//!
//! A `Connection` owns the transport and the registry handle, and is bound
//! to one API namespace and revision. It has no internal locking:
//! concurrent calls sharing a connection with profiling enabled require
//! external mutual exclusion, or one connection per caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::AHashMap;

use crate::error::{Result, WireError};
use crate::fault;
use crate::marshal;
use crate::registry::{CallDescriptor, TypeRegistry};
use crate::transport::Transport;
use crate::types::{ManagedObjectRef, PropertyMap, Value};
use crate::xml::{self, Element};

/// One profiled invocation.
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub network_latency: Duration,
    pub request_emit: Duration,
    pub response_parse: Duration,
    pub request_size: usize,
    pub response_size: usize,
    /// The `_this` handle the call was made against.
    pub target: ManagedObjectRef,
    pub params: PropertyMap,
    /// Call-site trace captured at invocation time.
    pub backtrace: String,
}

/// Running totals across all profiled invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileSummary {
    pub network_latency: Duration,
    pub request_emit: Duration,
    pub response_parse: Duration,
    pub num_calls: u64,
}

/// A connection to a remote object-management endpoint, bound to one API
/// namespace and revision.
pub struct Connection<T: Transport> {
    transport: T,
    registry: Arc<dyn TypeRegistry>,
    ns: String,
    rev: String,
    /// Enables per-call profiling records. Off by default.
    pub profiling: bool,
    profile: AHashMap<String, Vec<ProfileRecord>>,
    profile_summary: ProfileSummary,
}

impl<T: Transport> Connection<T> {
    pub fn new(
        transport: T,
        registry: Arc<dyn TypeRegistry>,
        ns: impl Into<String>,
        rev: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            registry,
            ns: ns.into(),
            rev: rev.into(),
            profiling: false,
            profile: AHashMap::new(),
            profile_summary: ProfileSummary::default(),
        }
    }

    pub fn rev(&self) -> &str {
        &self.rev
    }

    /// Get a reference to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consume the connection and return the inner transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Rebind the API revision, e.g. after discovering the server's
    /// supported version.
    pub fn set_rev(&mut self, rev: impl Into<String>) {
        self.rev = rev.into();
    }

    /// Per-method profiling records, keyed by method name.
    pub fn profile(&self) -> &AHashMap<String, Vec<ProfileRecord>> {
        &self.profile
    }

    pub fn profile_summary(&self) -> &ProfileSummary {
        &self.profile_summary
    }

    pub fn reset_profiling(&mut self) {
        self.profile.clear();
        self.profile_summary = ProfileSummary::default();
    }

    /// Invoke `method` against `this`, marshaling `params` per the call
    /// descriptor and unmarshaling the declared result.
    ///
    /// Returns `Ok(None)` for void methods and for calls whose server
    /// response carried no return value.
    pub fn invoke(
        &mut self,
        method: &str,
        desc: &CallDescriptor,
        this: &ManagedObjectRef,
        params: &PropertyMap,
    ) -> Result<Option<Value>> {
        if !valid_method_name(method) {
            return Err(WireError::InvalidArgument(format!(
                "`{method}` is not a valid method name"
            )));
        }

        let emit_start = Instant::now();
        let body = self.emit_request(method, desc, this, params)?;
        let request_emit = emit_start.elapsed();

        tracing::trace!(method, target = %this.id, request_size = body.len(), "sending request");
        let send_start = Instant::now();
        let (doc, response_size) = self
            .transport
            .send(&format!("{}/{}", self.ns, self.rev), &body)?;
        let network_latency = send_start.elapsed();

        let parse_start = Instant::now();
        let root = Element::parse(&doc)?;
        fault::check_fault(&root, self.registry.as_ref())?;

        let result = match &desc.result {
            Some(result_desc) => {
                let type_name = if result_desc.is_task {
                    "Task"
                } else {
                    result_desc.wire_type.as_str()
                };
                let mut values = Vec::with_capacity(root.children.len());
                for child in &root.children {
                    values.push(marshal::deserialize_value(
                        child,
                        type_name,
                        self.registry.as_ref(),
                    )?);
                }
                // A task-returning call yields a single handle even when the
                // descriptor declares an array result.
                if result_desc.is_array && !result_desc.is_task {
                    Some(Value::Array(values))
                } else {
                    values.into_iter().next()
                }
            }
            None => None,
        };
        let response_parse = parse_start.elapsed();

        if self.profiling {
            self.record_profile(
                method,
                ProfileRecord {
                    network_latency,
                    request_emit,
                    response_parse,
                    request_size: body.len(),
                    response_size,
                    target: this.clone(),
                    params: params.clone(),
                    backtrace: std::backtrace::Backtrace::force_capture().to_string(),
                },
            );
        }

        tracing::trace!(method, "call completed");
        Ok(result)
    }

    fn emit_request(
        &self,
        method: &str,
        desc: &CallDescriptor,
        this: &ManagedObjectRef,
        params: &PropertyMap,
    ) -> Result<String> {
        let mut out = String::with_capacity(256);
        out.push('<');
        out.push_str(method);
        out.push_str(" xmlns=\"");
        out.push_str(&xml::escape(&self.ns));
        out.push_str("\">");

        marshal::serialize_value(
            &mut out,
            "_this",
            "ManagedObject",
            false,
            &Value::Ref(this.clone()),
            &[],
            self.registry.as_ref(),
        )?;

        for param in &desc.params {
            let value = params
                .get(&param.name)
                .or_else(|| params.get(&snake_case(&param.name)));
            match value {
                Some(value) => marshal::serialize_value(
                    &mut out,
                    &param.name,
                    &param.wire_type,
                    param.is_array,
                    value,
                    &[],
                    self.registry.as_ref(),
                )?,
                None if param.is_optional => {}
                None => {
                    return Err(WireError::MissingParameter {
                        method: method.to_string(),
                        param: param.name.clone(),
                    })
                }
            }
        }

        out.push_str("</");
        out.push_str(method);
        out.push('>');
        Ok(out)
    }

    fn record_profile(&mut self, method: &str, record: ProfileRecord) {
        self.profile_summary.network_latency += record.network_latency;
        self.profile_summary.request_emit += record.request_emit;
        self.profile_summary.response_parse += record.response_parse;
        self.profile_summary.num_calls += 1;
        self.profile
            .entry(method.to_string())
            .or_default()
            .push(record);
    }
}

fn valid_method_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The snake_case alias under which a parameter may also be supplied,
/// e.g. `numCPUs` → `num_cpus`.
fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_aliases() {
        assert_eq!(snake_case("numCPUs"), "num_cpus");
        assert_eq!(snake_case("entityName"), "entity_name");
        assert_eq!(snake_case("spec"), "spec");
        assert_eq!(snake_case("powerOn"), "power_on");
    }

    #[test]
    fn method_name_validation() {
        assert!(valid_method_name("PowerOnVM_Task"));
        assert!(valid_method_name("CurrentTime"));
        assert!(!valid_method_name(""));
        assert!(!valid_method_name("bad name"));
        assert!(!valid_method_name("inject<xml"));
    }
}
