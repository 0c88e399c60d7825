//! In-process transport with scripted responses.
//!
//! Ready-state transitions are driven by the runtime's timers: after `send`,
//! the transport reaches HEADERS_RECEIVED at a third of the scripted latency,
//! LOADING at two thirds and DONE at the full latency.

use crate::headers::HeaderMap;
use crate::record::{ResponseBody, ResponseKind};
use crate::transport::{ready_state, OpenOptions, ReadyStateHandler, RequestBody, Transport, TransportFactory};
use common::{DevToolsError, DevToolsResult};
use devtools_runtime::{Scheduler, TimerId};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::trace;

/// Response a [`SimulatedTransport`] plays back.
#[derive(Clone, Debug)]
pub struct ScriptedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub kind: ResponseKind,
    pub body: ResponseBody,
    pub latency: Duration,
}

impl ScriptedResponse {
    /// JSON response exposed as a parsed value.
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            kind: ResponseKind::Json,
            body: ResponseBody::Json(body),
            latency: Duration::from_millis(30),
        }
    }

    /// Plain text response.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "text/plain; charset=utf-8".to_string())],
            kind: ResponseKind::Text,
            body: ResponseBody::Text(body.into()),
            latency: Duration::from_millis(30),
        }
    }

    /// Binary response.
    pub fn bytes(status: u16, kind: ResponseKind, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "application/octet-stream".to_string())],
            kind,
            body: ResponseBody::Binary(body),
            latency: Duration::from_millis(30),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn raw_headers(&self) -> String {
        self.headers
            .iter()
            .map(|(name, value)| format!("{}: {}\r\n", name, value))
            .collect()
    }
}

/// Picks the response for a request from its method and URL.
pub type Responder = Arc<dyn Fn(&str, &str) -> ScriptedResponse + Send + Sync>;

#[derive(Default)]
struct SimState {
    ready_state: u8,
    method: String,
    url: String,
    request_headers: HeaderMap,
    sent: bool,
    status: u16,
    raw_headers: String,
    response: Option<ResponseBody>,
    kind: ResponseKind,
    script: Option<ScriptedResponse>,
    handler: Option<ReadyStateHandler>,
    timers: Vec<TimerId>,
}

struct SimShared {
    scheduler: Scheduler,
    responder: Responder,
    state: Mutex<SimState>,
}

/// Transport playing back a [`ScriptedResponse`] on the runtime's timers.
pub struct SimulatedTransport {
    shared: Arc<SimShared>,
}

impl SimulatedTransport {
    /// Create a transport answering every request with `responder`.
    pub fn new(scheduler: Scheduler, responder: Responder) -> Self {
        Self {
            shared: Arc::new(SimShared {
                scheduler,
                responder,
                state: Mutex::new(SimState::default()),
            }),
        }
    }

    /// Transport that always answers with `response`.
    pub fn answering(scheduler: Scheduler, response: ScriptedResponse) -> Self {
        Self::new(scheduler, Arc::new(move |_: &str, _: &str| response.clone()))
    }

    /// Method and URL passed to the last `open`.
    pub fn target(&self) -> (String, String) {
        let state = self.shared.state.lock();
        (state.method.clone(), state.url.clone())
    }

    /// Abort the request: pending transitions are dropped and the transport
    /// goes back to UNSENT.
    pub fn abort(&self) {
        let timers = {
            let mut state = self.shared.state.lock();
            state.sent = false;
            std::mem::take(&mut state.timers)
        };
        for id in timers {
            self.shared.scheduler.clear_timer(id);
        }
        enter_state(&self.shared, ready_state::UNSENT);
    }
}

/// Move to `next` and run the handler outside the lock.
fn enter_state(shared: &SimShared, next: u8) {
    let handler = {
        let mut state = shared.state.lock();
        state.ready_state = next;

        if let Some(script) = state.script.clone() {
            if next >= ready_state::HEADERS_RECEIVED {
                state.status = script.status;
                state.raw_headers = script.raw_headers();
                state.kind = script.kind;
            }
            if next == ready_state::DONE {
                state.response = Some(script.body);
                state.timers.clear();
                state.sent = false;
            }
        }

        trace!(url = %state.url, ready_state = next, "simulated transition");
        state.handler.clone()
    };

    if let Some(handler) = handler {
        handler();
    }
}

fn schedule_state(shared: &Arc<SimShared>, delay: Duration, next: u8) -> TimerId {
    let weak: Weak<SimShared> = Arc::downgrade(shared);
    shared.scheduler.set_timeout(delay, move || {
        if let Some(shared) = weak.upgrade() {
            enter_state(&shared, next);
        }
    })
}

impl Transport for SimulatedTransport {
    fn open(&self, method: &str, url: &str, _options: OpenOptions) -> DevToolsResult<()> {
        {
            let mut state = self.shared.state.lock();
            if state.sent {
                return Err(DevToolsError::invalid_state("open called while a request is in flight"));
            }
            let handler = state.handler.take();
            *state = SimState {
                method: method.to_string(),
                url: url.to_string(),
                handler,
                ..SimState::default()
            };
        }

        enter_state(&self.shared, ready_state::OPENED);
        Ok(())
    }

    fn set_request_header(&self, name: &str, value: &str) -> DevToolsResult<()> {
        let mut state = self.shared.state.lock();
        if state.ready_state != ready_state::OPENED || state.sent {
            return Err(DevToolsError::invalid_state("headers can only be set after open and before send"));
        }
        state.request_headers.insert(name, value);
        Ok(())
    }

    fn send(&self, _body: Option<RequestBody>) -> DevToolsResult<()> {
        let latency = {
            let mut state = self.shared.state.lock();
            if state.ready_state != ready_state::OPENED || state.sent {
                return Err(DevToolsError::invalid_state("send requires an opened, unsent request"));
            }

            let script = (self.shared.responder)(&state.method, &state.url);
            let latency = script.latency;
            state.sent = true;
            state.script = Some(script);
            latency
        };

        let timers = vec![
            schedule_state(&self.shared, latency / 3, ready_state::HEADERS_RECEIVED),
            schedule_state(&self.shared, latency * 2 / 3, ready_state::LOADING),
            schedule_state(&self.shared, latency, ready_state::DONE),
        ];
        self.shared.state.lock().timers = timers;
        Ok(())
    }

    fn request_headers(&self) -> HeaderMap {
        self.shared.state.lock().request_headers.clone()
    }

    fn ready_state(&self) -> u8 {
        self.shared.state.lock().ready_state
    }

    fn status(&self) -> u16 {
        self.shared.state.lock().status
    }

    fn response_kind(&self) -> ResponseKind {
        self.shared.state.lock().kind
    }

    fn response(&self) -> Option<ResponseBody> {
        self.shared.state.lock().response.clone()
    }

    fn all_response_headers(&self) -> String {
        self.shared.state.lock().raw_headers.clone()
    }

    fn set_ready_state_handler(&self, handler: Option<ReadyStateHandler>) {
        self.shared.state.lock().handler = handler;
    }

    fn ready_state_handler(&self) -> Option<ReadyStateHandler> {
        self.shared.state.lock().handler.clone()
    }
}

/// Factory handing out [`SimulatedTransport`]s that share one responder.
#[derive(Clone)]
pub struct SimulatedFactory {
    scheduler: Scheduler,
    responder: Responder,
}

impl SimulatedFactory {
    pub fn new<F>(scheduler: Scheduler, responder: F) -> Self
    where
        F: Fn(&str, &str) -> ScriptedResponse + Send + Sync + 'static,
    {
        Self {
            scheduler,
            responder: Arc::new(responder),
        }
    }
}

impl TransportFactory for SimulatedFactory {
    fn create(&self) -> Arc<dyn Transport> {
        Arc::new(SimulatedTransport::new(self.scheduler.clone(), self.responder.clone()))
    }
}
