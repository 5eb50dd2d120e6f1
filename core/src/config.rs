//! Consumer configuration and base-URI composition.
//!
//! # Design
//! Configuration is a typed struct with named optional fields; anything the
//! struct doesn't model goes through `TransportOptions::extra` as raw
//! pass-through. Ambient request context (host, scheme, port, cookie jar)
//! is injected as a value rather than read from process state, so the
//! composer is pure: the same inputs always resolve to the same
//! [`BaseLocation`], and resolution happens exactly once, at construction.

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::transport::TransportOptions;

/// Construction options for an [`ApiConsumer`](crate::ApiConsumer).
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Absolute scheme+host(+port) root. Inferred from the ambient context
    /// when absent.
    pub base_url: Option<String>,
    /// Path segment mounted under the base URL. Defaults to `/`.
    pub base_urn: Option<String>,
    /// Full override: when set, used verbatim as the request prefix.
    pub base_uri: Option<String>,
    /// Comma-separated names of ambient cookies to forward as one `Cookie`
    /// header value.
    pub cookies: Option<String>,
    pub transport: TransportOptions,
}

/// Request context available outside explicit configuration, read only at
/// construction time to derive defaults.
#[derive(Debug, Clone, Default)]
pub struct AmbientContext {
    pub http_host: Option<String>,
    pub server_name: Option<String>,
    pub https: bool,
    pub server_port: Option<u16>,
    pub cookies: HashMap<String, String>,
}

/// The finalized base-URL/URN/URI triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseLocation {
    /// Scheme+host root with trailing slash; `None` when only an explicit
    /// `base_uri` was available.
    pub url: Option<String>,
    /// Normalized path segment, always starting and ending with `/`.
    pub urn: String,
    /// Prefix for every request path.
    pub uri: String,
}

impl BaseLocation {
    /// Compute the triple from configuration and ambient context.
    ///
    /// Fails only when no URI can be derived at all: no explicit `base_uri`,
    /// no explicit `base_url`, and no ambient host to infer one from.
    pub fn resolve(config: &Config, ambient: &AmbientContext) -> Result<Self, ConfigError> {
        let url = match &config.base_url {
            Some(url) => Some(url.clone()),
            None => ambient_base_url(ambient),
        };

        let urn = normalize_urn(config.base_urn.as_deref());

        let uri = match &config.base_uri {
            Some(uri) => uri.clone(),
            None => {
                let url = url.as_deref().ok_or(ConfigError::MissingBaseUrl)?;
                format!("{}/{}/", url.trim_end_matches('/'), urn.trim_matches('/'))
            }
        };

        log::debug!("resolved base uri {uri}");
        Ok(Self { url, urn, uri })
    }
}

/// Base URL pointing back at the ambient host: `http_host` wins over
/// `server_name`, scheme follows the TLS flag, and the port is appended
/// only when it is neither 80 nor 443.
fn ambient_base_url(ambient: &AmbientContext) -> Option<String> {
    let host = ambient
        .http_host
        .as_deref()
        .or(ambient.server_name.as_deref())?;
    let scheme = if ambient.https { "https" } else { "http" };
    let port = match ambient.server_port {
        Some(p) if p != 80 && p != 443 => format!(":{p}"),
        _ => String::new(),
    };
    Some(format!("{scheme}://{host}{port}/"))
}

fn normalize_urn(urn: Option<&str>) -> String {
    let trimmed = urn.unwrap_or("/").trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Join the ambient cookies named in the comma-separated allowlist into a
/// single `Cookie` header value. `None` when nothing matched.
pub(crate) fn cookie_header(allowlist: &str, ambient: &AmbientContext) -> Option<String> {
    let mut pairs = Vec::new();
    for name in allowlist.split(',') {
        if let Some(value) = ambient.cookies.get(name) {
            pairs.push(format!("{name}={value}"));
        }
    }

    if pairs.is_empty() {
        None
    } else {
        Some(pairs.join(","))
    }
}
