use bytes::Bytes;
use std::borrow::Cow;
use std::collections::HashMap;
use std::time::SystemTime;

/// Immutable view of one inbound request, built by the hosting framework
/// before the pipeline runs and discarded when the request completes.
///
/// Header keys are lowercased on insertion so lookups are case-insensitive.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    pub client_addr: String,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    pub body: Bytes,
    pub received_at: SystemTime,
}

impl RequestSnapshot {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            client_addr: String::new(),
            headers: HashMap::new(),
            query: HashMap::new(),
            body: Bytes::new(),
            received_at: SystemTime::now(),
        }
    }

    pub fn with_client_addr(mut self, addr: &str) -> Self {
        self.client_addr = addr.to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Body as text. Lossy, so it is total even for non-UTF-8 payloads.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Query parameters as a single `k=v&k=v` string.
    pub fn query_text(&self) -> String {
        let mut parts: Vec<String> = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        parts.sort();
        parts.join("&")
    }

    /// Client identity used for rate admission and audit events.
    ///
    /// Prefers the first `X-Forwarded-For` entry, then the socket address.
    pub fn client_identity(&self) -> String {
        if let Some(xff) = self.header("x-forwarded-for") {
            if let Some(first) = xff.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }

        if !self.client_addr.is_empty() {
            return self.client_addr.clone();
        }

        "unknown".to_string()
    }
}
