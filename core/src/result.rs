//! The immutable record of one API call.

use std::collections::HashMap;

use serde_json::Value;

use crate::transport::TransportInfo;

/// The decoded JSON response body: a mapping carrying at least `status`,
/// usually `message`, plus arbitrary domain fields.
pub type Envelope = serde_json::Map<String, Value>;

/// Everything one call produced: classification, message/status, raw and
/// parsed body, captured headers and transport diagnostics.
///
/// A value of this type is returned from every call and never mutated
/// afterwards; the consumer itself keeps no per-call state. Success versus
/// failure is read from [`is_success`](Self::is_success) (or the `Result`
/// shape of the field wrappers) — never inferred from the status number by
/// callers.
#[derive(Debug, Clone)]
pub struct ApiResult {
    pub(crate) success: bool,
    pub(crate) status: i64,
    pub(crate) message: String,
    pub(crate) raw_output: String,
    pub(crate) output: Option<Envelope>,
    pub(crate) raw_headers: Vec<String>,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) iheaders: HashMap<String, String>,
    pub(crate) info: TransportInfo,
}

impl ApiResult {
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Numeric status: the envelope's own on application-level outcomes,
    /// 500 on transport and protocol failures.
    pub fn status(&self) -> i64 {
        self.status
    }

    /// Human-readable outcome: the envelope's `message` when one was
    /// decoded, a fixed diagnostic otherwise.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The decoded envelope, only when the call succeeded.
    pub fn envelope(&self) -> Option<&Envelope> {
        if self.success {
            self.output.as_ref()
        } else {
            None
        }
    }

    /// The `records` field of a successful envelope.
    pub fn records(&self) -> Option<&Value> {
        self.envelope().and_then(|env| env.get("records"))
    }

    /// The `details` field of a successful envelope.
    pub fn details(&self) -> Option<&Value> {
        self.envelope().and_then(|env| env.get("details"))
    }

    /// The parsed body regardless of classification — also populated when
    /// the envelope was readable but the call failed (bad status, missing
    /// field).
    pub fn output(&self) -> Option<&Envelope> {
        self.output.as_ref()
    }

    /// The response body text, untouched.
    pub fn raw_output(&self) -> &str {
        &self.raw_output
    }

    /// Look up a response header by exact case first, then case
    /// insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.headers.get(name) {
            return Some(value);
        }
        self.iheaders.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Parsed headers under their original-case names.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Every raw header line in receive order, including the status line
    /// and the blank terminator.
    pub fn raw_headers(&self) -> &[String] {
        &self.raw_headers
    }

    /// Transport diagnostics for this round trip.
    pub fn info(&self) -> &TransportInfo {
        &self.info
    }

    /// Demote a successful result to a failure because an expected envelope
    /// field was absent. Status and everything else stay as recorded.
    pub(crate) fn missing_field(mut self, field: &str) -> Self {
        self.success = false;
        self.message = format!("API did not return a {field} field");
        self
    }
}
