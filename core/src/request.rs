//! Per-call request shape.

use serde_json::Value;

use crate::encode::Params;

/// The body of a POST request. The two encodings are mutually exclusive by
/// construction.
#[derive(Debug, Clone)]
pub enum PostBody {
    /// Url-encoded `key=value` pairs, encoded with the same rules as GET
    /// parameters.
    Form(Params),
    /// A JSON payload, serialized as-is.
    Json(Value),
}

/// Everything one call carries besides its path: optional GET parameters
/// and an optional POST body. The default spec carries neither, producing a
/// bare GET.
#[derive(Debug, Clone, Default)]
pub struct RequestSpec {
    pub get: Option<Params>,
    pub post: Option<PostBody>,
}

impl RequestSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_get(mut self, params: Params) -> Self {
        self.get = Some(params);
        self
    }

    pub fn with_form(mut self, params: Params) -> Self {
        self.post = Some(PostBody::Form(params));
        self
    }

    pub fn with_json(mut self, payload: Value) -> Self {
        self.post = Some(PostBody::Json(payload));
        self
    }
}
