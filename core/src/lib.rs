//! Synchronous consumer library for envelope-speaking JSON HTTP APIs.
//!
//! # Overview
//! Builds request URLs and bodies from structured parameters, runs the HTTP
//! round trip, and normalizes whatever comes back — transport failures, bad
//! HTTP statuses, malformed envelopes, application errors — into one
//! immutable [`ApiResult`] per call.
//!
//! # Design
//! - `ApiConsumer` is immutable after construction: base URI, forwarded
//!   cookie header and the transport agent are resolved once in `new`.
//! - Call state is a returned value, never instance state — a consumer
//!   carries nothing between calls.
//! - The wire protocol is `{base_uri}/{path}?outputFormat=json` with raw
//!   percent-encoded parameters, answered by a JSON mapping carrying a
//!   numeric `status` (success iff ≤ 299), a `message`, and domain fields
//!   such as `records` and `details`.
//! - The network sits behind the [`HttpTransport`] trait; [`UreqTransport`]
//!   is the default implementation, and tests substitute their own.

pub mod client;
pub mod config;
pub mod encode;
pub mod error;
pub mod headers;
pub mod request;
pub mod result;
pub mod transport;

pub use client::ApiConsumer;
pub use config::{AmbientContext, BaseLocation, Config};
pub use encode::{raw_url_encode, ParamValue, Params};
pub use error::ConfigError;
pub use headers::HeaderCapture;
pub use request::{PostBody, RequestSpec};
pub use result::{ApiResult, Envelope};
pub use transport::{
    HeaderSink, HttpTransport, RequestBody, TransportError, TransportInfo, TransportOptions,
    TransportRequest, TransportResponse, UreqTransport, DEFAULT_USER_AGENT,
};
