//! HTTP transport capability.
//!
//! # Design
//! The consumer core never talks to the network directly; it hands a
//! [`TransportRequest`] to an [`HttpTransport`] and gets back a buffered
//! [`TransportResponse`]. Response headers are streamed through a
//! [`HeaderSink`] *during* the transfer, one raw line at a time, which is
//! the protocol the classifier and header accessors are built on.
//!
//! [`UreqTransport`] is the default implementation: one `ureq::Agent`
//! configured up front from [`TransportOptions`], with status-as-error
//! disabled so non-2xx responses come back as data for the consumer to
//! classify.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

/// Receiver for raw response header lines.
///
/// The transport calls [`on_header_line`](Self::on_header_line) once per
/// header line, in the order received, with the line terminator stripped:
/// first the status line, then one call per header, then the empty line
/// ending the header block. The implementation must return the number of
/// bytes it consumed, which is always `line.len()`; returning anything else
/// tells the transport to abort the transfer.
pub trait HeaderSink {
    fn on_header_line(&mut self, line: &str) -> usize;
}

/// A request ready for the wire: full URL, extra headers, optional body.
///
/// The method is implied: requests carry a `GET`, requests with a body carry
/// a `POST`.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

/// A non-empty POST payload with its content type.
#[derive(Debug, Clone)]
pub struct RequestBody {
    pub content_type: String,
    pub payload: String,
}

/// A fully buffered response: final status code and body text. Headers have
/// already been delivered through the [`HeaderSink`].
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// A connection, TLS or I/O level failure, described by the transport.
///
/// The message carries the transport's own error class and description
/// (e.g. `io: connection refused`).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Transport tuning applied once when the consumer is built.
///
/// Named fields cover the options this library models; `extra` passes raw
/// key/value options through to the transport, which honors the keys it
/// understands and logs the rest.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub extra: HashMap<String, String>,
}

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("api-consumer/", env!("CARGO_PKG_VERSION"));

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            connect_timeout: None,
            extra: HashMap::new(),
        }
    }
}

/// Diagnostics recorded for the most recent round trip.
#[derive(Debug, Clone, Default)]
pub struct TransportInfo {
    /// The composed URL the request was sent to.
    pub url: String,
    /// Final HTTP status code; `None` when the transfer itself failed.
    pub http_status: Option<u16>,
    /// Wall-clock duration of the round trip.
    pub elapsed: Duration,
}

/// A blocking HTTP transport.
///
/// Implementations perform exactly one synchronous round trip per call, feed
/// every response header line through `headers` (see the [`HeaderSink`]
/// contract), and return the buffered body. They must not retry and must
/// not treat non-2xx statuses as errors — status interpretation belongs to
/// the consumer.
pub trait HttpTransport {
    fn send(
        &self,
        request: &TransportRequest,
        headers: &mut dyn HeaderSink,
    ) -> Result<TransportResponse, TransportError>;
}

/// Default transport backed by a preconfigured [`ureq::Agent`].
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(options: &TransportOptions) -> Self {
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .user_agent(options.user_agent.as_str());

        if let Some(timeout) = options.timeout {
            builder = builder.timeout_global(Some(timeout));
        }
        if let Some(timeout) = options.connect_timeout {
            builder = builder.timeout_connect(Some(timeout));
        }

        for (key, value) in &options.extra {
            match key.as_str() {
                "max_redirects" => match value.parse() {
                    Ok(n) => builder = builder.max_redirects(n),
                    Err(_) => log::warn!("transport option max_redirects={value} is not a number"),
                },
                other => log::warn!("ignoring unsupported transport option {other}"),
            }
        }

        Self {
            agent: builder.build().new_agent(),
        }
    }
}

impl HttpTransport for UreqTransport {
    fn send(
        &self,
        request: &TransportRequest,
        headers: &mut dyn HeaderSink,
    ) -> Result<TransportResponse, TransportError> {
        log::debug!(
            "{} {}",
            if request.body.is_some() { "POST" } else { "GET" },
            request.url
        );

        let mut response = match &request.body {
            None => {
                let mut req = self.agent.get(&request.url);
                for (name, value) in &request.headers {
                    req = req.header(name.as_str(), value.as_str());
                }
                req.call()
            }
            Some(body) => {
                let mut req = self
                    .agent
                    .post(&request.url)
                    .content_type(body.content_type.as_str());
                for (name, value) in &request.headers {
                    req = req.header(name.as_str(), value.as_str());
                }
                req.send(body.payload.as_bytes())
            }
        }
        .map_err(|e| TransportError(e.to_string()))?;

        feed_header_block(
            headers,
            &format!("{:?} {}", response.version(), response.status()),
            response
                .headers()
                .iter()
                .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes()))),
        )?;

        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}

/// Replay a buffered header block through a [`HeaderSink`]: status line,
/// one line per header, then the empty terminator line.
///
/// Shared by transports that only see headers after the fact. Enforces the
/// sink contract: a short return aborts with a [`TransportError`].
pub fn feed_header_block<'a>(
    sink: &mut dyn HeaderSink,
    status_line: &str,
    headers: impl Iterator<Item = (&'a str, std::borrow::Cow<'a, str>)>,
) -> Result<(), TransportError> {
    let mut push = |line: &str| {
        if sink.on_header_line(line) != line.len() {
            return Err(TransportError(
                "header callback aborted the transfer".to_string(),
            ));
        }
        Ok(())
    };

    push(status_line)?;
    for (name, value) in headers {
        push(&format!("{name}: {value}"))?;
    }
    push("")
}
