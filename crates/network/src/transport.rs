//! Request transport abstraction.
//!
//! A [`Transport`] follows the request object model of an HTTP client with a
//! ready-state machine: `open`, optional request headers, `send`, then a
//! handler called on every ready-state change.

use crate::headers::HeaderMap;
use crate::record::{ResponseBody, ResponseKind};
use common::DevToolsResult;
use serde_json::Value;
use std::sync::Arc;

/// Ready states of a transport.
pub mod ready_state {
    pub const UNSENT: u8 = 0;
    pub const OPENED: u8 = 1;
    pub const HEADERS_RECEIVED: u8 = 2;
    pub const LOADING: u8 = 3;
    pub const DONE: u8 = 4;
}

/// Callback run when a transport's ready state changes.
pub type ReadyStateHandler = Arc<dyn Fn() + Send + Sync>;

/// Extra arguments to [`Transport::open`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenOptions {
    /// Credentials for HTTP authentication.
    pub user: Option<String>,
    pub password: Option<String>,
    /// Opt this request out of capture.
    pub no_capture: bool,
}

impl OpenOptions {
    /// Options for a request that must not be recorded.
    pub fn uncaptured() -> Self {
        Self {
            no_capture: true,
            ..Self::default()
        }
    }
}

/// Request body passed to [`Transport::send`].
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    Text(String),
    Json(Value),
    Bytes(Vec<u8>),
}

impl RequestBody {
    /// Body as stored on the request record. Structured bodies are serialized.
    pub fn to_post_string(&self) -> Option<String> {
        match self {
            RequestBody::Text(text) => Some(text.clone()),
            RequestBody::Json(value) => serde_json::to_string(value).ok(),
            RequestBody::Bytes(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// One HTTP request.
pub trait Transport: Send + Sync {
    /// Initialize the request.
    fn open(&self, method: &str, url: &str, options: OpenOptions) -> DevToolsResult<()>;

    /// Add a request header. Only valid between `open` and `send`.
    fn set_request_header(&self, name: &str, value: &str) -> DevToolsResult<()>;

    /// Start the request.
    fn send(&self, body: Option<RequestBody>) -> DevToolsResult<()>;

    /// Headers set so far.
    fn request_headers(&self) -> HeaderMap;

    /// Current ready state, see [`ready_state`].
    fn ready_state(&self) -> u8;

    /// HTTP status, `0` until headers arrive.
    fn status(&self) -> u16;

    /// How [`Transport::response`] is exposed.
    fn response_kind(&self) -> ResponseKind;

    /// Response body, once loaded.
    fn response(&self) -> Option<ResponseBody>;

    /// Raw response header block, `name: value` per line.
    fn all_response_headers(&self) -> String;

    /// Replace the ready-state handler.
    fn set_ready_state_handler(&self, handler: Option<ReadyStateHandler>);

    /// Current ready-state handler.
    fn ready_state_handler(&self) -> Option<ReadyStateHandler>;
}

/// Produces fresh transports.
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Transport>;
}

impl<F> TransportFactory for F
where
    F: Fn() -> Arc<dyn Transport> + Send + Sync,
{
    fn create(&self) -> Arc<dyn Transport> {
        self()
    }
}
