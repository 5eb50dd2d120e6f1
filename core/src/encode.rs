//! Request parameter encoding.
//!
//! # Design
//! `Params` preserves insertion order — the encoder's output order is the
//! caller's input order, and repeated keys are emitted repeatedly rather
//! than collapsed. Values use the raw percent-encoding rule (space becomes
//! `%20`, never `+`); keys are emitted verbatim. The same encoding serves
//! both the GET query suffix and url-encoded POST bodies.

/// A single parameter value: one scalar, or a list expanded to `key[]=`
/// entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<String>),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Scalar(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::List(values)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::List(values.into_iter().map(str::to_string).collect())
    }
}

/// An ordered mapping of request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, ParamValue)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.push((key.into(), value.into()));
    }

    /// Chaining form of [`push`](Self::push).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.push(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, ParamValue)> + '_ {
        self.0.iter()
    }
}

impl FromIterator<(String, ParamValue)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Encode `params` into `key=value` / `key[]=value` entries, in input order.
///
/// A list value of length n contributes n `key[]=` entries; a zero-length
/// list contributes nothing. Empty input yields an empty vector.
pub fn raw_url_encode(params: &Params) -> Vec<String> {
    let mut out = Vec::new();

    for (key, value) in params.iter() {
        match value {
            ParamValue::Scalar(v) => {
                out.push(format!("{key}={}", urlencoding::encode(v)));
            }
            ParamValue::List(vs) => {
                for v in vs {
                    out.push(format!("{key}[]={}", urlencoding::encode(v)));
                }
            }
        }
    }

    out
}
