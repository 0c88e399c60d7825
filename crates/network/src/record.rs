//! Captured request records.

use crate::headers::HeaderMap;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Status shown for a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RequestStatus {
    /// Final HTTP status.
    Code(u16),
    /// Unsent or opened.
    Pending,
    /// Headers received or body loading.
    Loading,
    /// No known ready state.
    #[default]
    Unknown,
}

impl RequestStatus {
    /// Derive the status from a ready state and the raw HTTP status.
    pub fn from_ready_state(ready_state: Option<u8>, http_status: u16) -> Self {
        match ready_state {
            Some(0) | Some(1) => RequestStatus::Pending,
            Some(2) | Some(3) => RequestStatus::Loading,
            Some(4) => RequestStatus::Code(http_status),
            _ => RequestStatus::Unknown,
        }
    }

    /// HTTP status, once the request is done.
    pub fn code(&self) -> Option<u16> {
        match self {
            RequestStatus::Code(code) => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Code(code) => write!(f, "{}", code),
            RequestStatus::Pending => f.write_str("Pending"),
            RequestStatus::Loading => f.write_str("Loading"),
            RequestStatus::Unknown => f.write_str("Unknown"),
        }
    }
}

impl Serialize for RequestStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RequestStatus::Code(code) => serializer.serialize_u16(*code),
            other => serializer.collect_str(other),
        }
    }
}

/// How the transport exposes its response body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    #[default]
    Text,
    Json,
    Blob,
    Document,
    ArrayBuffer,
    Unknown,
}

impl ResponseKind {
    /// Whether the body is rendered synchronously.
    pub fn is_textual(&self) -> bool {
        matches!(self, ResponseKind::Text | ResponseKind::Json)
    }
}

impl FromStr for ResponseKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "" | "text" => ResponseKind::Text,
            "json" => ResponseKind::Json,
            "blob" => ResponseKind::Blob,
            "document" => ResponseKind::Document,
            "arraybuffer" => ResponseKind::ArrayBuffer,
            _ => ResponseKind::Unknown,
        })
    }
}

/// Raw response body as handed out by the transport.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Text(String),
    Json(Value),
    Binary(Vec<u8>),
}

impl ResponseBody {
    /// Tag shown for bodies that cannot be rendered as text in place.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ResponseBody::Text(_) => "[object String]",
            ResponseBody::Json(Value::Array(_)) => "[object Array]",
            ResponseBody::Json(Value::Object(_)) => "[object Object]",
            ResponseBody::Json(Value::Null) => "[object Null]",
            ResponseBody::Json(_) => "[object Value]",
            ResponseBody::Binary(_) => "[object ArrayBuffer]",
        }
    }
}

/// One captured request. Updated in place over the request's lifetime.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub id: String,
    /// Insertion sequence number, starting at 1.
    pub index: u64,
    /// URL without its query string.
    pub host: String,
    pub url: String,
    /// Uppercased method.
    pub method: String,
    pub status: RequestStatus,
    /// Raw HTTP status as last reported by the transport.
    pub http_status: u16,
    pub ready_state: Option<u8>,
    pub cost_time_ms: Option<u64>,
    pub request_headers: HeaderMap,
    pub response_headers: HeaderMap,
    pub query_params: IndexMap<String, String>,
    pub post_body: Option<String>,
    pub response: Option<ResponseBody>,
    pub response_kind: ResponseKind,
    /// Response rendered for display.
    pub decoded_response: String,
    /// Epoch ms when the request was opened.
    pub start_time: Option<u64>,
    /// Epoch ms when the request finished.
    pub end_time: Option<u64>,
}

impl RequestRecord {
    /// Record carrying only `id`, as returned for unknown ids.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Elapsed time as shown in the request list: `"<n> ms"`, or `"-"` while unknown.
    pub fn cost_time_label(&self) -> String {
        match self.cost_time_ms {
            Some(ms) if ms > 0 => format!("{} ms", ms),
            _ => "-".to_string(),
        }
    }

    /// Whether the request finished with a client or server error.
    pub fn is_error(&self) -> bool {
        self.status.code().map(|code| code >= 400).unwrap_or(false)
    }

    /// Equivalent cURL command line.
    pub fn to_curl(&self) -> String {
        let method = if self.method.is_empty() { "GET" } else { &self.method };
        let mut command = format!("curl -X {} '{}'", method, self.url);

        for (name, value) in self.request_headers.iter() {
            if !value.is_empty() {
                command.push_str(&format!(" -H '{}: {}'", name, value));
            }
        }

        if method == "POST" {
            if let Some(body) = self.post_body.as_deref().filter(|b| !b.is_empty()) {
                command.push_str(&format!(" --data-binary '{}'", body));
            }
        }

        command
    }
}

/// Partial update merged into a [`RequestRecord`]. `None` fields are left alone.
#[derive(Clone, Debug, Default)]
pub struct RequestUpdate {
    pub host: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub ready_state: Option<u8>,
    pub http_status: Option<u16>,
    pub request_headers: Option<HeaderMap>,
    pub response_headers: Option<HeaderMap>,
    pub query_params: Option<IndexMap<String, String>>,
    pub post_body: Option<String>,
    pub response: Option<ResponseBody>,
    pub response_kind: Option<ResponseKind>,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
    pub cost_time_ms: Option<u64>,
}

impl RequestUpdate {
    pub fn ready_state(mut self, ready_state: u8) -> Self {
        self.ready_state = Some(ready_state);
        self
    }

    pub fn http_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn response(mut self, kind: ResponseKind, body: ResponseBody) -> Self {
        self.response_kind = Some(kind);
        self.response = Some(body);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Copy every set field onto `record`.
    pub fn apply_to(self, record: &mut RequestRecord) {
        fn merge<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        merge(&mut record.host, self.host);
        merge(&mut record.url, self.url);
        merge(&mut record.method, self.method);
        merge(&mut record.http_status, self.http_status);
        merge(&mut record.request_headers, self.request_headers);
        merge(&mut record.response_headers, self.response_headers);
        merge(&mut record.query_params, self.query_params);
        merge(&mut record.response_kind, self.response_kind);

        if self.ready_state.is_some() {
            record.ready_state = self.ready_state;
        }
        if self.post_body.is_some() {
            record.post_body = self.post_body;
        }
        if self.response.is_some() {
            record.response = self.response;
        }
        if self.start_time.is_some() {
            record.start_time = self.start_time;
        }
        if self.end_time.is_some() {
            record.end_time = self.end_time;
        }
        if self.cost_time_ms.is_some() {
            record.cost_time_ms = self.cost_time_ms;
        }
    }
}
