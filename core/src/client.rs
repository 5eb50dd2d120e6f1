//! The API consumer: one call in, one normalized result out.
//!
//! # Design
//! `ApiConsumer` is immutable after construction — the base location,
//! forwarded cookie header and transport agent are all resolved in `new`.
//! `execute` owns the whole round trip: compose the URL, encode the body,
//! run the transport with a fresh header capture, then walk the outcome
//! ladder (transport failure, bad HTTP status, unparseable body, missing
//! status field, application status) and fold whatever happened into an
//! [`ApiResult`]. Nothing is stored on the consumer between calls, so a
//! failure is never observable anywhere except the returned value.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::{cookie_header, AmbientContext, BaseLocation, Config};
use crate::encode::raw_url_encode;
use crate::error::ConfigError;
use crate::headers::HeaderCapture;
use crate::request::{PostBody, RequestSpec};
use crate::result::{ApiResult, Envelope};
use crate::transport::{
    HttpTransport, RequestBody, TransportInfo, TransportRequest, UreqTransport,
};

const CONTENT_TYPE_JSON: &str = "application/json";
const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";

/// Synchronous client for envelope-speaking JSON APIs.
///
/// One instance runs one call at a time; separate instances are fully
/// independent and may be used concurrently.
pub struct ApiConsumer {
    base: BaseLocation,
    cookie: Option<String>,
    transport: Box<dyn HttpTransport>,
}

impl ApiConsumer {
    /// Build a consumer over the default `ureq` transport.
    pub fn new(config: Config, ambient: &AmbientContext) -> Result<Self, ConfigError> {
        let transport = UreqTransport::new(&config.transport);
        Self::with_transport(config, ambient, transport)
    }

    /// Build a consumer over a caller-supplied transport.
    pub fn with_transport(
        config: Config,
        ambient: &AmbientContext,
        transport: impl HttpTransport + 'static,
    ) -> Result<Self, ConfigError> {
        let base = BaseLocation::resolve(&config, ambient)?;
        let cookie = config
            .cookies
            .as_deref()
            .and_then(|allowlist| cookie_header(allowlist, ambient));

        Ok(Self {
            base,
            cookie,
            transport: Box::new(transport),
        })
    }

    /// The prefix every request path is joined onto.
    pub fn base_uri(&self) -> &str {
        &self.base.uri
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base.url.as_deref()
    }

    pub fn base_urn(&self) -> &str {
        &self.base.urn
    }

    /// Perform one call and normalize whatever happened into an
    /// [`ApiResult`].
    ///
    /// Failures of every kind — transport, HTTP status, malformed envelope,
    /// application status above 299 — come back as a failed result with a
    /// populated message and status; this method never panics and never
    /// returns a Rust error.
    pub fn execute(&self, path: &str, spec: &RequestSpec) -> ApiResult {
        let mut url = format!(
            "{}/{}?outputFormat=json",
            self.base.uri.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        if let Some(get) = &spec.get {
            url.push('&');
            url.push_str(&raw_url_encode(get).join("&"));
        }

        let body = match &spec.post {
            Some(PostBody::Json(payload)) => match serde_json::to_string(payload) {
                Ok(payload) => Some(RequestBody {
                    content_type: CONTENT_TYPE_JSON.to_string(),
                    payload,
                }),
                Err(e) => {
                    return ApiResult {
                        success: false,
                        status: 500,
                        message: format!("failed to encode JSON body: {e}"),
                        raw_output: String::new(),
                        output: None,
                        raw_headers: Vec::new(),
                        headers: HashMap::new(),
                        iheaders: HashMap::new(),
                        info: TransportInfo {
                            url,
                            http_status: None,
                            elapsed: Duration::ZERO,
                        },
                    };
                }
            },
            Some(PostBody::Form(params)) => Some(RequestBody {
                content_type: CONTENT_TYPE_FORM.to_string(),
                payload: raw_url_encode(params).join("&"),
            }),
            None => None,
        }
        // An empty encoded body is not sent; the request degrades to a GET.
        .filter(|body| !body.payload.is_empty());

        let request = TransportRequest {
            url: url.clone(),
            headers: self
                .cookie
                .iter()
                .map(|value| ("Cookie".to_string(), value.clone()))
                .collect(),
            body,
        };

        let mut capture = HeaderCapture::new();
        let started = Instant::now();
        let outcome = self.transport.send(&request, &mut capture);
        let elapsed = started.elapsed();
        let (raw_headers, headers, iheaders) = capture.into_parts();

        // Start from the failure shape and promote step by step.
        let mut result = ApiResult {
            success: false,
            status: 500,
            message: String::new(),
            raw_output: String::new(),
            output: None,
            raw_headers,
            headers,
            iheaders,
            info: TransportInfo {
                url,
                http_status: None,
                elapsed,
            },
        };

        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                log::debug!("transport failure: {err}");
                result.message = err.to_string();
                return result;
            }
        };
        result.info.http_status = Some(response.status);

        if response.status != 200 {
            result.message = format!("API returned HTTP code: {}", response.status);
            return result;
        }

        result.raw_output = response.body;

        let envelope = match serde_json::from_str::<Value>(&result.raw_output) {
            Ok(Value::Object(map)) => map,
            _ => {
                result.message = "API returned invalid JSON".to_string();
                return result;
            }
        };

        let status = envelope_status(&envelope);
        let message = envelope_message(&envelope);
        result.output = Some(envelope);

        let Some(status) = status else {
            result.message = "API did not return a status field".to_string();
            return result;
        };

        result.status = status;
        result.message = message;
        result.success = status <= 299;
        log::debug!("call finished: status {status}");
        result
    }

    /// Execute and project the `records` field out of the envelope.
    ///
    /// `Ok` carries the field's value, which may be an empty collection; a
    /// successful envelope without the field is demoted to a failure.
    pub fn get_records(&self, path: &str, spec: &RequestSpec) -> Result<Value, ApiResult> {
        self.get_field(path, spec, "records")
    }

    /// Execute and project the `details` field out of the envelope.
    pub fn get_details(&self, path: &str, spec: &RequestSpec) -> Result<Value, ApiResult> {
        self.get_field(path, spec, "details")
    }

    fn get_field(&self, path: &str, spec: &RequestSpec, field: &str) -> Result<Value, ApiResult> {
        let result = self.execute(path, spec);
        if !result.is_success() {
            return Err(result);
        }

        let value = result.envelope().and_then(|env| env.get(field)).cloned();
        match value {
            Some(value) => Ok(value),
            None => Err(result.missing_field(field)),
        }
    }
}

/// Read the envelope's numeric-like `status`: a JSON integer or a string
/// holding one. Anything else counts as missing.
fn envelope_status(envelope: &Envelope) -> Option<i64> {
    match envelope.get("status")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read the envelope's `message`; absent or null becomes the empty string,
/// non-string scalars keep their JSON rendering.
fn envelope_message(envelope: &Envelope) -> String {
    match envelope.get("message") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::Params;
    use crate::transport::{HeaderSink, TransportError, TransportResponse};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Seen = Rc<RefCell<Vec<TransportRequest>>>;

    /// Canned transport: records every request, replays a fixed header
    /// block, answers with a fixed status and body.
    struct FakeTransport {
        status: u16,
        body: String,
        header_lines: Vec<String>,
        fail: Option<String>,
        seen: Seen,
    }

    impl FakeTransport {
        fn new(status: u16, body: &str) -> Self {
            Self {
                status,
                body: body.to_string(),
                header_lines: vec![
                    "HTTP/1.1 200 OK".to_string(),
                    "X-Api-Version: 2.0".to_string(),
                    String::new(),
                ],
                fail: None,
                seen: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn failing(message: &str) -> Self {
            let mut t = Self::new(200, "");
            t.fail = Some(message.to_string());
            t.header_lines.clear();
            t
        }

        fn seen(&self) -> Seen {
            Rc::clone(&self.seen)
        }
    }

    impl HttpTransport for FakeTransport {
        fn send(
            &self,
            request: &TransportRequest,
            headers: &mut dyn HeaderSink,
        ) -> Result<TransportResponse, TransportError> {
            self.seen.borrow_mut().push(request.clone());
            if let Some(message) = &self.fail {
                return Err(TransportError(message.clone()));
            }
            for line in &self.header_lines {
                headers.on_header_line(line);
            }
            Ok(TransportResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    fn consumer(transport: FakeTransport) -> ApiConsumer {
        let config = Config {
            base_url: Some("http://x.test/".to_string()),
            base_urn: Some("v1".to_string()),
            ..Config::default()
        };
        ApiConsumer::with_transport(config, &AmbientContext::default(), transport).unwrap()
    }

    const OK_BODY: &str = r#"{"status":200,"message":"OK","records":[]}"#;

    #[test]
    fn url_carries_marker_and_joins_the_path() {
        let transport = FakeTransport::new(200, OK_BODY);
        let seen = transport.seen();
        let c = consumer(transport);

        c.execute("/r/hosts", &RequestSpec::new());

        let requests = seen.borrow();
        assert_eq!(
            requests[0].url,
            "http://x.test/v1/r/hosts?outputFormat=json"
        );
        assert!(requests[0].body.is_none());
    }

    #[test]
    fn get_params_are_appended_after_the_marker() {
        let transport = FakeTransport::new(200, OK_BODY);
        let seen = transport.seen();
        let c = consumer(transport);

        let spec = RequestSpec::new().with_get(
            Params::new()
                .with("q", "two words")
                .with("node", vec!["a", "b"]),
        );
        c.execute("r/hosts", &spec);

        assert_eq!(
            seen.borrow()[0].url,
            "http://x.test/v1/r/hosts?outputFormat=json&q=two%20words&node[]=a&node[]=b"
        );
    }

    #[test]
    fn form_body_is_url_encoded() {
        let transport = FakeTransport::new(200, OK_BODY);
        let seen = transport.seen();
        let c = consumer(transport);

        let spec = RequestSpec::new().with_form(Params::new().with("name", "web 01"));
        c.execute("w/add", &spec);

        let requests = seen.borrow();
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body.content_type, CONTENT_TYPE_FORM);
        assert_eq!(body.payload, "name=web%2001");
    }

    #[test]
    fn json_body_is_serialized_with_json_content_type() {
        let transport = FakeTransport::new(200, OK_BODY);
        let seen = transport.seen();
        let c = consumer(transport);

        let spec = RequestSpec::new().with_json(json!({"nodes": ["a", "b"]}));
        c.execute("w/import", &spec);

        let requests = seen.borrow();
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body.content_type, CONTENT_TYPE_JSON);
        assert_eq!(
            serde_json::from_str::<Value>(&body.payload).unwrap(),
            json!({"nodes": ["a", "b"]})
        );
    }

    #[test]
    fn empty_form_sends_no_body() {
        let transport = FakeTransport::new(200, OK_BODY);
        let seen = transport.seen();
        let c = consumer(transport);

        c.execute("r/hosts", &RequestSpec::new().with_form(Params::new()));

        assert!(seen.borrow()[0].body.is_none());
    }

    #[test]
    fn configured_cookies_are_forwarded_as_one_header() {
        let transport = FakeTransport::new(200, OK_BODY);
        let seen = transport.seen();
        let config = Config {
            base_url: Some("http://x.test/".to_string()),
            cookies: Some("session,theme".to_string()),
            ..Config::default()
        };
        let ambient = AmbientContext {
            cookies: HashMap::from([("session".to_string(), "abc".to_string())]),
            ..AmbientContext::default()
        };
        let c = ApiConsumer::with_transport(config, &ambient, transport).unwrap();

        c.execute("r/hosts", &RequestSpec::new());

        assert_eq!(
            seen.borrow()[0].headers,
            vec![("Cookie".to_string(), "session=abc".to_string())]
        );
    }

    #[test]
    fn transport_failure_becomes_status_500() {
        let c = consumer(FakeTransport::failing("io: connection refused"));

        let result = c.execute("r/hosts", &RequestSpec::new());

        assert!(!result.is_success());
        assert_eq!(result.status(), 500);
        assert_eq!(result.message(), "io: connection refused");
        assert!(result.envelope().is_none());
        assert!(result.info().http_status.is_none());
    }

    #[test]
    fn non_200_http_code_becomes_status_500() {
        let c = consumer(FakeTransport::new(503, "upstream down"));

        let result = c.execute("r/hosts", &RequestSpec::new());

        assert!(!result.is_success());
        assert_eq!(result.status(), 500);
        assert_eq!(result.message(), "API returned HTTP code: 503");
        assert_eq!(result.raw_output(), "");
        assert_eq!(result.info().http_status, Some(503));
    }

    #[test]
    fn unparseable_body_is_invalid_json() {
        let c = consumer(FakeTransport::new(200, "not json"));

        let result = c.execute("r/hosts", &RequestSpec::new());

        assert_eq!(result.message(), "API returned invalid JSON");
        assert_eq!(result.status(), 500);
        assert_eq!(result.raw_output(), "not json");
        assert!(result.output().is_none());
    }

    #[test]
    fn non_mapping_json_is_invalid_json() {
        let c = consumer(FakeTransport::new(200, "[1,2,3]"));

        let result = c.execute("r/hosts", &RequestSpec::new());

        assert_eq!(result.message(), "API returned invalid JSON");
    }

    #[test]
    fn envelope_without_status_is_a_protocol_error() {
        let c = consumer(FakeTransport::new(200, r#"{"message":"hi"}"#));

        let result = c.execute("r/hosts", &RequestSpec::new());

        assert!(!result.is_success());
        assert_eq!(result.status(), 500);
        assert_eq!(result.message(), "API did not return a status field");
        // The parsed body is still available for inspection.
        assert!(result.output().is_some());
    }

    #[test]
    fn non_numeric_status_counts_as_missing() {
        let c = consumer(FakeTransport::new(200, r#"{"status":"broken"}"#));

        let result = c.execute("r/hosts", &RequestSpec::new());

        assert_eq!(result.message(), "API did not return a status field");
    }

    #[test]
    fn success_returns_the_envelope_verbatim() {
        let body = r#"{"status":200,"message":"OK","records":[{"node":"a"}],"extra":42}"#;
        let c = consumer(FakeTransport::new(200, body));

        let result = c.execute("r/hosts", &RequestSpec::new());

        assert!(result.is_success());
        assert_eq!(result.status(), 200);
        assert_eq!(result.message(), "OK");
        let expected = serde_json::from_str::<Value>(body).unwrap();
        assert_eq!(Value::Object(result.envelope().cloned().unwrap()), expected);
    }

    #[test]
    fn string_status_is_accepted() {
        let c = consumer(FakeTransport::new(200, r#"{"status":"200","message":"OK"}"#));

        let result = c.execute("r/hosts", &RequestSpec::new());

        assert!(result.is_success());
        assert_eq!(result.status(), 200);
    }

    #[test]
    fn classification_boundary_is_299() {
        let c = consumer(FakeTransport::new(200, r#"{"status":299}"#));
        assert!(c.execute("r/hosts", &RequestSpec::new()).is_success());

        let c = consumer(FakeTransport::new(200, r#"{"status":300}"#));
        assert!(!c.execute("r/hosts", &RequestSpec::new()).is_success());
    }

    #[test]
    fn application_failure_preserves_the_envelope_values() {
        let c = consumer(FakeTransport::new(
            200,
            r#"{"status":404,"message":"No hosts matched"}"#,
        ));

        let result = c.execute("r/hosts", &RequestSpec::new());

        assert!(!result.is_success());
        assert_eq!(result.status(), 404);
        assert_eq!(result.message(), "No hosts matched");
        assert!(result.envelope().is_none());
        assert!(result.output().is_some());
    }

    #[test]
    fn absent_message_normalizes_to_empty() {
        let c = consumer(FakeTransport::new(200, r#"{"status":200}"#));
        assert_eq!(c.execute("r/hosts", &RequestSpec::new()).message(), "");
    }

    #[test]
    fn captured_headers_are_queryable_case_insensitively() {
        let c = consumer(FakeTransport::new(200, OK_BODY));

        let result = c.execute("r/hosts", &RequestSpec::new());

        assert_eq!(result.header("X-Api-Version"), Some("2.0"));
        assert_eq!(result.header("x-api-version"), Some("2.0"));
        assert_eq!(result.raw_headers()[0], "HTTP/1.1 200 OK");
    }

    #[test]
    fn get_records_returns_an_empty_collection_as_success() {
        let c = consumer(FakeTransport::new(200, OK_BODY));

        let records = c.get_records("r/hosts", &RequestSpec::new()).unwrap();

        assert_eq!(records, json!([]));
    }

    #[test]
    fn get_records_without_the_field_is_a_failure() {
        let c = consumer(FakeTransport::new(200, r#"{"status":200,"message":"OK"}"#));

        let err = c.get_records("r/hosts", &RequestSpec::new()).unwrap_err();

        assert!(!err.is_success());
        assert_eq!(err.message(), "API did not return a records field");
        assert_eq!(err.status(), 200);
    }

    #[test]
    fn get_details_projects_the_field() {
        let c = consumer(FakeTransport::new(
            200,
            r#"{"status":200,"details":{"node":"web01"}}"#,
        ));

        let details = c.get_details("r/host", &RequestSpec::new()).unwrap();

        assert_eq!(details, json!({"node": "web01"}));
    }

    #[test]
    fn get_details_propagates_call_failures() {
        let c = consumer(FakeTransport::failing("io: connection refused"));

        let err = c.get_details("r/host", &RequestSpec::new()).unwrap_err();

        assert_eq!(err.status(), 500);
        assert_eq!(err.message(), "io: connection refused");
    }
}
