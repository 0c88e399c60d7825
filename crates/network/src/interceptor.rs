//! Transport decoration.
//!
//! [`InterceptingFactory`] wraps a [`TransportFactory`]; each transport it
//! creates records its request into a [`RequestStore`] and forwards every call
//! to the real transport with the same arguments and result.
//!
//! Recording hooks into the transport's ready-state handler. Code that swaps
//! the handler after `open` would silently cut capture off, so every open also
//! starts a poller that replays the hook whenever the ready state moved without
//! it being observed. The poller stops once the request is done.

use crate::headers::{parse_response_headers, HeaderMap};
use crate::query::parse_send_url;
use crate::record::{RequestRecord, RequestUpdate, ResponseBody, ResponseKind};
use crate::request_store::RequestStore;
use crate::transport::{ready_state, OpenOptions, ReadyStateHandler, RequestBody, Transport, TransportFactory};
use common::DevToolsResult;
use devtools_runtime::{Scheduler, TimerId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Default poll period for missed ready-state changes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Factory whose transports are recorded into a [`RequestStore`].
pub struct InterceptingFactory<F> {
    inner: F,
    store: RequestStore,
    scheduler: Scheduler,
    poll_interval: Duration,
}

impl<F: TransportFactory> InterceptingFactory<F> {
    /// Decorate `inner`. Pollers run on `scheduler`.
    pub fn new(inner: F, store: RequestStore, scheduler: Scheduler) -> Self {
        Self {
            inner,
            store,
            scheduler,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Use a different poll period.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The decorated factory.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Store receiving the recorded requests.
    pub fn store(&self) -> &RequestStore {
        &self.store
    }

    /// Create an [`InterceptedTransport`] with its concrete type.
    pub fn create_intercepted(&self) -> InterceptedTransport {
        InterceptedTransport::new(
            self.inner.create(),
            self.store.clone(),
            self.scheduler.clone(),
            self.poll_interval,
        )
    }

    /// Issue the request captured in `record` again on a fresh transport.
    pub fn replay(&self, record: &RequestRecord) -> DevToolsResult<Arc<dyn Transport>> {
        let transport = self.create();
        let method = if record.method.is_empty() { "GET" } else { record.method.as_str() };

        transport.open(method, &record.url, OpenOptions::default())?;
        for (name, value) in record.request_headers.iter() {
            transport.set_request_header(name, value)?;
        }

        let body = match (method, &record.post_body) {
            ("POST", Some(body)) => Some(RequestBody::Text(body.clone())),
            _ => None,
        };
        transport.send(body)?;

        debug!(url = %record.url, "request replayed");
        Ok(transport)
    }
}

impl<F: TransportFactory> TransportFactory for InterceptingFactory<F> {
    fn create(&self) -> Arc<dyn Transport> {
        Arc::new(self.create_intercepted())
    }
}

/// Per-request capture state.
#[derive(Default)]
struct CaptureState {
    id: Option<String>,
    method: String,
    url: String,
    /// Opted out through this open's options.
    no_capture: bool,
    start_time: Option<u64>,
    /// Last ready state the hook ran for.
    observed: Option<u8>,
    poll_timer: Option<TimerId>,
    /// Hook installed on the inner transport, with the handler it wraps.
    hook: Option<(ReadyStateHandler, Option<ReadyStateHandler>)>,
}

struct Shared {
    inner: Arc<dyn Transport>,
    store: RequestStore,
    scheduler: Scheduler,
    poll_interval: Duration,
    /// Set through [`InterceptedTransport::set_no_capture`]; outlives reopens.
    no_capture: AtomicBool,
    state: Mutex<CaptureState>,
}

/// Transport that records its request before delegating.
pub struct InterceptedTransport {
    shared: Arc<Shared>,
}

impl InterceptedTransport {
    /// Wrap `inner`, recording into `store`.
    pub fn new(inner: Arc<dyn Transport>, store: RequestStore, scheduler: Scheduler, poll_interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner,
                store,
                scheduler,
                poll_interval,
                no_capture: AtomicBool::new(false),
                state: Mutex::new(CaptureState::default()),
            }),
        }
    }

    /// Id of the current request, once opened.
    pub fn request_id(&self) -> Option<String> {
        self.shared.state.lock().id.clone()
    }

    /// Opt this transport out of capture. Calls still reach the inner transport.
    pub fn set_no_capture(&self, no_capture: bool) {
        self.shared.no_capture.store(no_capture, Ordering::Relaxed);
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &Arc<dyn Transport> {
        &self.shared.inner
    }

    /// Whether a poller is running for the current request.
    pub fn is_polling(&self) -> bool {
        self.shared.state.lock().poll_timer.is_some()
    }
}

impl Shared {
    /// Record the transport's current ready state.
    fn record_transition(&self) {
        let current = self.inner.ready_state();
        let now = self.scheduler.now_ms();

        let (id, captured, start_time) = {
            let mut state = self.state.lock();
            state.observed = Some(current);
            if current <= ready_state::OPENED && state.start_time.is_none() {
                state.start_time = Some(now);
            }
            (state.id.clone(), self.is_captured(&state), state.start_time)
        };
        let Some(id) = id else {
            return;
        };

        let http_status = if current > ready_state::OPENED {
            self.inner.status()
        } else {
            0
        };
        let mut update = RequestUpdate {
            ready_state: Some(current),
            http_status: Some(http_status),
            response_kind: Some(self.inner.response_kind()),
            ..RequestUpdate::default()
        };

        match current {
            ready_state::UNSENT | ready_state::OPENED => {
                update.start_time = start_time;
            }
            ready_state::HEADERS_RECEIVED => {
                update.response_headers = Some(parse_response_headers(&self.inner.all_response_headers()));
            }
            ready_state::LOADING => {}
            ready_state::DONE => {
                self.stop_polling();
                let start = start_time.unwrap_or(now);
                update.end_time = Some(now);
                update.cost_time_ms = Some(now.saturating_sub(start));
                update.response = self.inner.response();
            }
            _ => self.stop_polling(),
        }

        trace!(id = %id, ready_state = current, "transport transition");
        if captured {
            self.store.update_request(&id, update);
        }
    }

    fn stop_polling(&self) {
        let timer = self.state.lock().poll_timer.take();
        if let Some(timer) = timer {
            self.scheduler.clear_timer(timer);
        }
    }

    fn is_captured(&self, state: &CaptureState) -> bool {
        !state.no_capture && !self.no_capture.load(Ordering::Relaxed)
    }

    /// Replay `hook` when the ready state changed behind its back.
    fn poll(&self, hook: &ReadyStateHandler) {
        let current = self.inner.ready_state();
        let observed = self.state.lock().observed;
        if observed != Some(current) {
            trace!(ready_state = current, "poller caught missed transition");
            hook();
        }
    }
}

/// Build the hook installed on the inner transport. It records, then runs the
/// handler it replaced.
fn make_hook(shared: &Arc<Shared>, previous: Option<ReadyStateHandler>) -> ReadyStateHandler {
    let weak = Arc::downgrade(shared);
    Arc::new(move || {
        if let Some(shared) = weak.upgrade() {
            shared.record_transition();
        }
        if let Some(previous) = &previous {
            previous();
        }
    })
}

fn start_polling(shared: &Arc<Shared>, hook: ReadyStateHandler) {
    let weak = Arc::downgrade(shared);
    let own_id: Arc<Mutex<Option<TimerId>>> = Arc::new(Mutex::new(None));
    let slot = own_id.clone();
    let scheduler = shared.scheduler.clone();

    let id = shared.scheduler.set_interval(shared.poll_interval, move || match weak.upgrade() {
        Some(shared) => shared.poll(&hook),
        None => {
            // Transport dropped mid-flight.
            if let Some(id) = *slot.lock() {
                scheduler.clear_timer(id);
            }
        }
    });

    *own_id.lock() = Some(id);
    shared.state.lock().poll_timer = Some(id);
}

impl Transport for InterceptedTransport {
    fn open(&self, method: &str, url: &str, options: OpenOptions) -> DevToolsResult<()> {
        let shared = &self.shared;

        // On reopen, wrap the handler our previous hook wrapped, not the hook.
        let installed = shared.inner.ready_state_handler();
        let (previous, prior) = {
            let mut state = shared.state.lock();
            let previous = match (&state.hook, &installed) {
                (Some((hook, wrapped)), Some(current)) if Arc::ptr_eq(hook, current) => wrapped.clone(),
                _ => installed.clone(),
            };

            // The new request must be current while the inner open reports OPENED.
            let prior = std::mem::replace(
                &mut *state,
                CaptureState {
                    id: Some(common::unique_id()),
                    method: method.to_string(),
                    url: url.to_string(),
                    no_capture: options.no_capture,
                    ..CaptureState::default()
                },
            );
            (previous, prior)
        };

        let hook = make_hook(shared, previous.clone());
        shared.state.lock().hook = Some((hook.clone(), previous));
        shared.inner.set_ready_state_handler(Some(hook.clone()));
        start_polling(shared, hook);

        match shared.inner.open(method, url, options) {
            Ok(()) => {
                if let Some(timer) = prior.poll_timer {
                    shared.scheduler.clear_timer(timer);
                }
                Ok(())
            }
            Err(err) => {
                // The request in flight keeps its id, hook and poller.
                shared.stop_polling();
                shared.inner.set_ready_state_handler(installed);
                *shared.state.lock() = prior;
                debug!(error = %err, "open rejected, previous request kept");
                Err(err)
            }
        }
    }

    fn set_request_header(&self, name: &str, value: &str) -> DevToolsResult<()> {
        self.shared.inner.set_request_header(name, value)
    }

    fn send(&self, body: Option<RequestBody>) -> DevToolsResult<()> {
        let shared = &self.shared;
        let (id, method, url, captured) = {
            let state = shared.state.lock();
            (state.id.clone(), state.method.clone(), state.url.clone(), shared.is_captured(&state))
        };

        if let (Some(id), true) = (id, captured) {
            let method = method.to_uppercase();
            let (host, query) = parse_send_url(&url);
            let post_body = if method == "POST" {
                body.as_ref().and_then(RequestBody::to_post_string)
            } else {
                None
            };

            shared.store.update_request(
                &id,
                RequestUpdate {
                    method: Some(method),
                    url: Some(url),
                    host: Some(host),
                    query_params: Some(query),
                    request_headers: Some(shared.inner.request_headers()),
                    post_body,
                    ..RequestUpdate::default()
                },
            );
        }

        shared.inner.send(body)
    }

    fn request_headers(&self) -> HeaderMap {
        self.shared.inner.request_headers()
    }

    fn ready_state(&self) -> u8 {
        self.shared.inner.ready_state()
    }

    fn status(&self) -> u16 {
        self.shared.inner.status()
    }

    fn response_kind(&self) -> ResponseKind {
        self.shared.inner.response_kind()
    }

    fn response(&self) -> Option<ResponseBody> {
        self.shared.inner.response()
    }

    fn all_response_headers(&self) -> String {
        self.shared.inner.all_response_headers()
    }

    fn set_ready_state_handler(&self, handler: Option<ReadyStateHandler>) {
        self.shared.inner.set_ready_state_handler(handler);
    }

    fn ready_state_handler(&self) -> Option<ReadyStateHandler> {
        self.shared.inner.ready_state_handler()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RequestStatus;
    use crate::sim::{ScriptedResponse, SimulatedFactory};
    use common::DevToolsError;
    use devtools_runtime::EventLoop;
    use serde_json::json;

    struct Fixture {
        event_loop: EventLoop,
        store: RequestStore,
        factory: InterceptingFactory<SimulatedFactory>,
    }

    fn fixture() -> Fixture {
        let event_loop = EventLoop::manual(1_000);
        let scheduler = event_loop.scheduler();
        let store = RequestStore::with_defaults(scheduler.clone());
        let sim = SimulatedFactory::new(scheduler.clone(), |method: &str, url: &str| {
            if url.contains("missing") {
                ScriptedResponse::text(404, "not found")
            } else if method.eq_ignore_ascii_case("POST") {
                ScriptedResponse::json(201, json!({"created": true}))
            } else {
                ScriptedResponse::json(200, json!({"items": [1, 2]})).with_header("X-Note", "a: b")
            }
        });
        let factory = InterceptingFactory::new(sim, store.clone(), scheduler);
        Fixture {
            event_loop,
            store,
            factory,
        }
    }

    #[test]
    fn test_request_lifecycle_is_recorded() {
        let mut fx = fixture();
        let transport = fx.factory.create_intercepted();

        transport.open("get", "http://h/a.php?b=c&d=e", OpenOptions::default()).unwrap();
        transport.set_request_header("Accept", "application/json").unwrap();
        transport.send(None).unwrap();

        let id = transport.request_id().unwrap();
        let pending = fx.store.get_request(&id);
        assert_eq!(pending.status, RequestStatus::Pending);
        assert_eq!(pending.method, "GET");
        assert_eq!(pending.host, "http://h/a.php");
        assert_eq!(pending.query_params["b"], "c");
        assert_eq!(pending.query_params["d"], "e");
        assert_eq!(pending.request_headers.get("accept"), Some("application/json"));
        assert_eq!(pending.start_time, Some(1_000));

        fx.event_loop.advance_by(Duration::from_millis(10)).unwrap();
        let loading = fx.store.get_request(&id);
        assert_eq!(loading.status, RequestStatus::Loading);
        assert_eq!(loading.response_headers.get("x-note"), Some("a: b"));

        fx.event_loop.advance_by(Duration::from_millis(20)).unwrap();
        let done = fx.store.get_request(&id);
        assert_eq!(done.status, RequestStatus::Code(200));
        assert_eq!(done.end_time, Some(1_030));
        assert_eq!(done.cost_time_ms, Some(30));
        assert_eq!(done.cost_time_label(), "30 ms");
        assert_eq!(done.response, Some(ResponseBody::Json(json!({"items": [1, 2]}))));
        assert!(done.decoded_response.contains("\"items\""));
        assert!(!transport.is_polling());
    }

    #[test]
    fn test_original_handler_runs_once_per_transition() {
        let mut fx = fixture();
        let transport = fx.factory.create_intercepted();
        let calls = Arc::new(Mutex::new(0));

        let c = calls.clone();
        transport.set_ready_state_handler(Some(Arc::new(move || *c.lock() += 1)));
        transport.open("GET", "/list", OpenOptions::default()).unwrap();
        transport.send(None).unwrap();
        fx.event_loop.advance_by(Duration::from_millis(100)).unwrap();

        assert_eq!(*calls.lock(), 4);
    }

    #[test]
    fn test_poller_recovers_replaced_handler() {
        let mut fx = fixture();
        let transport = fx.factory.create_intercepted();

        transport.open("GET", "/list", OpenOptions::default()).unwrap();
        // Third-party code replaces the handler after open.
        transport.set_ready_state_handler(Some(Arc::new(|| {})));
        transport.send(None).unwrap();

        let id = transport.request_id().unwrap();
        fx.event_loop.advance_by(Duration::from_millis(50)).unwrap();

        let record = fx.store.get_request(&id);
        assert_eq!(record.status, RequestStatus::Code(200));
        assert!(record.response.is_some());
        assert!(!transport.is_polling());
    }

    #[test]
    fn test_poller_is_cancelled_when_done() {
        let mut fx = fixture();
        let transport = fx.factory.create_intercepted();

        transport.open("GET", "/list", OpenOptions::default()).unwrap();
        assert!(transport.is_polling());
        transport.send(None).unwrap();
        fx.event_loop.advance_by(Duration::from_millis(100)).unwrap();

        assert!(!transport.is_polling());
        assert!(!fx.event_loop.has_pending_work());
    }

    #[test]
    fn test_post_body_is_serialized() {
        let mut fx = fixture();
        let transport = fx.factory.create();

        transport.open("post", "/items", OpenOptions::default()).unwrap();
        transport.send(Some(RequestBody::Json(json!({"name": "pen"})))).unwrap();
        fx.event_loop.advance_by(Duration::from_millis(30)).unwrap();

        let record = &fx.store.get_requests()[0];
        assert_eq!(record.method, "POST");
        assert_eq!(record.post_body.as_deref(), Some("{\"name\":\"pen\"}"));
        assert_eq!(record.status, RequestStatus::Code(201));
    }

    #[test]
    fn test_get_body_is_not_stored() {
        let fx = fixture();
        let transport = fx.factory.create();

        transport.open("GET", "/items", OpenOptions::default()).unwrap();
        transport.send(Some(RequestBody::Text("ignored".into()))).unwrap();
        assert_eq!(fx.store.get_requests()[0].post_body, None);
    }

    #[test]
    fn test_no_capture_requests_are_not_recorded() {
        let mut fx = fixture();

        let by_option = fx.factory.create();
        by_option.open("GET", "/quiet", OpenOptions::uncaptured()).unwrap();
        by_option.send(None).unwrap();

        let by_flag = fx.factory.create_intercepted();
        by_flag.set_no_capture(true);
        by_flag.open("GET", "/quiet", OpenOptions::default()).unwrap();
        by_flag.send(None).unwrap();

        fx.event_loop.advance_by(Duration::from_millis(50)).unwrap();
        assert!(fx.store.is_empty());
        assert_eq!(by_option.status(), 200);
        assert!(by_flag.response().is_some());
    }

    #[test]
    fn test_inner_errors_propagate() {
        let fx = fixture();
        let transport = fx.factory.create();

        assert!(matches!(transport.send(None), Err(DevToolsError::InvalidState(_))));
        assert!(fx.store.is_empty());
    }

    #[test]
    fn test_error_status_is_flagged() {
        let mut fx = fixture();
        let transport = fx.factory.create();

        transport.open("GET", "/missing", OpenOptions::default()).unwrap();
        transport.send(None).unwrap();
        fx.event_loop.advance_by(Duration::from_millis(30)).unwrap();

        let record = &fx.store.get_requests()[0];
        assert_eq!(record.status, RequestStatus::Code(404));
        assert!(record.is_error());
        assert_eq!(record.decoded_response, "not found");
    }

    #[test]
    fn test_reopen_does_not_stack_hooks() {
        let mut fx = fixture();
        let transport = fx.factory.create_intercepted();
        let calls = Arc::new(Mutex::new(0));

        let c = calls.clone();
        transport.set_ready_state_handler(Some(Arc::new(move || *c.lock() += 1)));
        transport.open("GET", "/one", OpenOptions::default()).unwrap();
        transport.send(None).unwrap();
        fx.event_loop.advance_by(Duration::from_millis(50)).unwrap();

        transport.open("GET", "/two", OpenOptions::default()).unwrap();
        transport.send(None).unwrap();
        fx.event_loop.advance_by(Duration::from_millis(50)).unwrap();

        assert_eq!(*calls.lock(), 8);
        assert_eq!(fx.store.len(), 2);
    }

    #[test]
    fn test_rejected_reopen_keeps_request_in_flight() {
        let mut fx = fixture();
        let transport = fx.factory.create_intercepted();
        let calls = Arc::new(Mutex::new(0));

        let c = calls.clone();
        transport.set_ready_state_handler(Some(Arc::new(move || *c.lock() += 1)));
        transport.open("GET", "/first", OpenOptions::default()).unwrap();
        transport.send(None).unwrap();
        let id = transport.request_id().unwrap();
        fx.event_loop.advance_by(Duration::from_millis(5)).unwrap();

        let reopened = transport.open("GET", "/second", OpenOptions::default());
        assert!(matches!(reopened, Err(DevToolsError::InvalidState(_))));
        assert_eq!(transport.request_id().as_deref(), Some(id.as_str()));
        assert!(transport.is_polling());

        fx.event_loop.advance_by(Duration::from_millis(100)).unwrap();

        assert_eq!(fx.store.len(), 1);
        let record = fx.store.get_request(&id);
        assert_eq!(record.url, "/first");
        assert_eq!(record.status, RequestStatus::Code(200));
        assert!(record.response.is_some());
        assert_eq!(*calls.lock(), 4);
        assert!(!transport.is_polling());
        assert!(!fx.event_loop.has_pending_work());
    }

    #[test]
    fn test_rejected_send_leaves_record_intact() {
        let mut fx = fixture();
        let transport = fx.factory.create_intercepted();

        transport.open("GET", "/items?page=1", OpenOptions::default()).unwrap();
        transport.send(None).unwrap();
        assert!(matches!(transport.send(None), Err(DevToolsError::InvalidState(_))));

        fx.event_loop.advance_by(Duration::from_millis(50)).unwrap();

        let requests = fx.store.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query_params["page"], "1");
        assert_eq!(requests[0].status, RequestStatus::Code(200));
    }

    #[test]
    fn test_uncaptured_option_applies_to_one_open_only() {
        let mut fx = fixture();
        let transport = fx.factory.create_intercepted();

        transport.open("GET", "/quiet", OpenOptions::uncaptured()).unwrap();
        transport.send(None).unwrap();
        fx.event_loop.advance_by(Duration::from_millis(50)).unwrap();
        assert!(fx.store.is_empty());

        transport.open("GET", "/loud", OpenOptions::default()).unwrap();
        transport.send(None).unwrap();
        fx.event_loop.advance_by(Duration::from_millis(50)).unwrap();

        let requests = fx.store.get_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "/loud");
        assert_eq!(requests[0].status, RequestStatus::Code(200));
    }

    #[test]
    fn test_no_capture_flag_survives_reopen() {
        let mut fx = fixture();
        let transport = fx.factory.create_intercepted();
        transport.set_no_capture(true);

        for url in ["/a", "/b"] {
            transport.open("GET", url, OpenOptions::default()).unwrap();
            transport.send(None).unwrap();
            fx.event_loop.advance_by(Duration::from_millis(50)).unwrap();
        }
        assert!(fx.store.is_empty());

        transport.set_no_capture(false);
        transport.open("GET", "/c", OpenOptions::default()).unwrap();
        transport.send(None).unwrap();
        fx.event_loop.advance_by(Duration::from_millis(50)).unwrap();
        assert_eq!(fx.store.len(), 1);
    }

    #[test]
    fn test_replay_issues_new_request() {
        let mut fx = fixture();
        let transport = fx.factory.create();
        transport.open("POST", "/items", OpenOptions::default()).unwrap();
        transport.set_request_header("X-Token", "t").unwrap();
        transport.send(Some(RequestBody::Text("a=1".into()))).unwrap();
        fx.event_loop.advance_by(Duration::from_millis(50)).unwrap();

        let original = fx.store.get_requests()[0].clone();
        fx.factory.replay(&original).unwrap();
        fx.event_loop.advance_by(Duration::from_millis(50)).unwrap();

        let requests = fx.store.get_requests();
        assert_eq!(requests.len(), 2);
        assert_ne!(requests[0].id, original.id);
        assert_eq!(requests[0].post_body.as_deref(), Some("a=1"));
        assert_eq!(requests[0].request_headers.get("x-token"), Some("t"));
    }
}
