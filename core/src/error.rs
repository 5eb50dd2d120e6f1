//! Construction-time errors.
//!
//! # Design
//! The only fatal error surface is construction: without a usable base URI
//! the consumer cannot address anything. Every per-call condition (transport
//! failure, bad HTTP status, malformed envelope, application error) is
//! recovered into the returned [`ApiResult`](crate::ApiResult) instead of
//! being raised.

use thiserror::Error;

/// Errors raised while building an [`ApiConsumer`](crate::ApiConsumer).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither an explicit `base_url`/`base_uri` nor an ambient host was
    /// available, so no request URI can be derived.
    #[error("no base URI available: set base_url or base_uri, or provide an ambient host")]
    MissingBaseUrl,
}
