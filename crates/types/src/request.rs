use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::HttpMethod;

/// Framework-neutral view of an incoming HTTP request.
///
/// The API adapter fills this from the server's native request type; the
/// schema projector reads parameters from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    /// Decoded query string pairs; the last occurrence of a key wins.
    #[serde(default)]
    pub query: IndexMap<String, String>,
    /// Parsed JSON body, if any.
    #[serde(default)]
    pub body: Option<Value>,
    /// Route parameters captured from the matched path.
    #[serde(default)]
    pub path_params: IndexMap<String, String>,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(key.into(), value.into());
        self
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
