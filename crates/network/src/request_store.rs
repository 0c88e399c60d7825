//! Bounded store of captured requests.
//!
//! Records live in a map keyed by request id. A separate id index keeps the
//! most recent request first and bounds the store: when a new id arrives at
//! capacity, the oldest id is dropped from the index and the map.

use crate::reader::{EncodingTextReader, TextReader};
use crate::record::{RequestRecord, RequestStatus, RequestUpdate, ResponseBody, ResponseKind};
use common::{DevToolsError, DevToolsResult};
use devtools_runtime::{debounce, ListenerSet, RateLimiter, Scheduler};
use parking_lot::RwLock;
use regex::RegexBuilder;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Request store settings.
#[derive(Clone, Debug)]
pub struct RequestStoreConfig {
    /// Maximum number of retained requests.
    pub capacity: usize,
    /// Debounce window for change notifications.
    pub notify_interval: Duration,
    /// Keep notifying remaining subscribers when one panics.
    pub isolate_subscriber_panics: bool,
}

impl Default for RequestStoreConfig {
    fn default() -> Self {
        Self {
            capacity: 200,
            notify_interval: Duration::from_millis(10),
            isolate_subscriber_panics: true,
        }
    }
}

#[derive(Default)]
struct StoreState {
    /// Most recent first.
    ids: Vec<String>,
    records: HashMap<String, RequestRecord>,
    next_index: u64,
}

struct StoreInner {
    state: RwLock<StoreState>,
    capacity: usize,
    scheduler: Scheduler,
    reader: Arc<dyn TextReader>,
    listeners: Arc<ListenerSet<Option<RequestRecord>>>,
    notifier: RateLimiter<Option<RequestRecord>>,
}

/// Request store. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct RequestStore {
    inner: Arc<StoreInner>,
}

impl RequestStore {
    /// Create a store decoding binary bodies as UTF-8.
    pub fn new(scheduler: Scheduler, config: RequestStoreConfig) -> Self {
        Self::with_reader(scheduler, config, Arc::new(EncodingTextReader::utf8()))
    }

    /// Store with default capacity and notification window.
    pub fn with_defaults(scheduler: Scheduler) -> Self {
        Self::new(scheduler, RequestStoreConfig::default())
    }

    /// Create a store with a custom body reader.
    pub fn with_reader(scheduler: Scheduler, config: RequestStoreConfig, reader: Arc<dyn TextReader>) -> Self {
        let listeners = Arc::new(ListenerSet::new());
        listeners.set_isolation(config.isolate_subscriber_panics);

        let fan_out = listeners.clone();
        let notifier = debounce(
            scheduler.clone(),
            config.notify_interval,
            false,
            move |record: Option<RequestRecord>| fan_out.notify(&record),
        );

        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(StoreState::default()),
                capacity: config.capacity,
                scheduler,
                reader,
                listeners,
                notifier,
            }),
        }
    }

    /// Record for `id`, or an empty record carrying `id` when unknown.
    pub fn get_request(&self, id: &str) -> RequestRecord {
        self.inner
            .state
            .read()
            .records
            .get(id)
            .cloned()
            .unwrap_or_else(|| RequestRecord::empty(id))
    }

    /// Whether `id` is stored.
    pub fn contains(&self, id: &str) -> bool {
        self.inner.state.read().records.contains_key(id)
    }

    /// Request ids, most recent first.
    pub fn get_request_ids(&self) -> Vec<String> {
        self.inner.state.read().ids.clone()
    }

    /// Records, most recent first.
    pub fn get_requests(&self) -> Vec<RequestRecord> {
        let state = self.inner.state.read();
        state.ids.iter().filter_map(|id| state.records.get(id).cloned()).collect()
    }

    /// Records whose URL matches `pattern`, ignoring case. Most recent first.
    pub fn filter_by_url(&self, pattern: &str) -> DevToolsResult<Vec<RequestRecord>> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| DevToolsError::pattern(e.to_string()))?;

        Ok(self
            .get_requests()
            .into_iter()
            .filter(|record| regex.is_match(&record.url))
            .collect())
    }

    /// Merge `update` into the record for `id`, creating it when new.
    pub fn update_request(&self, id: &str, update: RequestUpdate) {
        let (record, pending_decode) = {
            let mut state = self.inner.state.write();

            if !state.records.contains_key(id) {
                if self.inner.capacity == 0 {
                    trace!(id, "request store has no capacity, update dropped");
                    return;
                }
                if state.ids.len() >= self.inner.capacity {
                    if let Some(oldest) = state.ids.pop() {
                        state.records.remove(&oldest);
                        debug!(id = %oldest, "evicted oldest request");
                    }
                }
                state.next_index += 1;
                let index = state.next_index;
                state.ids.insert(0, id.to_string());
                state.records.insert(
                    id.to_string(),
                    RequestRecord {
                        index,
                        ..RequestRecord::empty(id)
                    },
                );
            }

            let Some(record) = state.records.get_mut(id) else {
                return;
            };
            update.apply_to(record);
            record.status = RequestStatus::from_ready_state(record.ready_state, record.http_status);

            let pending_decode = match render_response(record.response_kind, record.response.as_ref()) {
                Rendered::Now(text) => {
                    record.decoded_response = text;
                    None
                }
                Rendered::Later(body) => Some(body),
            };

            trace!(id, status = %record.status, "request updated");
            (record.clone(), pending_decode)
        };

        if let Some(body) = pending_decode {
            self.decode_later(id.to_string(), body);
        }
        self.inner.notifier.call(Some(record));
    }

    /// Drop every request.
    pub fn clear_requests(&self) {
        {
            let mut state = self.inner.state.write();
            state.ids.clear();
            state.records.clear();
            state.next_index = 0;
        }
        self.inner.notifier.call(None);
    }

    /// Subscribe to change notifications. The argument is the updated record,
    /// or `None` after a clear.
    pub fn attach<F>(&self, listener: F)
    where
        F: Fn(Option<&RequestRecord>) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .attach(move |record: &Option<RequestRecord>| listener(record.as_ref()));
    }

    /// Number of stored requests.
    pub fn len(&self) -> usize {
        self.inner.state.read().ids.len()
    }

    /// Whether the store holds no requests.
    pub fn is_empty(&self) -> bool {
        self.inner.state.read().ids.is_empty()
    }

    /// Maximum number of retained requests.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Decode `body` on the next microtask checkpoint and patch the record.
    fn decode_later(&self, id: String, body: ResponseBody) {
        let weak: Weak<StoreInner> = Arc::downgrade(&self.inner);

        self.inner.scheduler.queue_microtask(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };

            let text = match inner.reader.read_text(&body) {
                Ok(text) => text,
                Err(e) => {
                    debug!(id = %id, error = %e, "dropping response decode");
                    return;
                }
            };

            let record = {
                let mut state = inner.state.write();
                let Some(record) = state.records.get_mut(&id) else {
                    return;
                };
                record.decoded_response = format_response(&text);
                record.clone()
            };
            inner.notifier.call(Some(record));
        });
    }
}

enum Rendered {
    Now(String),
    Later(ResponseBody),
}

/// Render a body for display according to the transport's response kind.
fn render_response(kind: ResponseKind, body: Option<&ResponseBody>) -> Rendered {
    let Some(body) = body else {
        return Rendered::Now(String::new());
    };

    match (kind, body) {
        (ResponseKind::Text, ResponseBody::Text(text)) => Rendered::Now(format_response(text)),
        (ResponseKind::Text, other) => Rendered::Now(other.type_tag().to_string()),
        (ResponseKind::Json, ResponseBody::Json(value)) => {
            Rendered::Now(serde_json::to_string_pretty(value).unwrap_or_else(|_| "Invalid value".to_string()))
        }
        (ResponseKind::Json, ResponseBody::Text(text)) => Rendered::Now(format_response(text)),
        (ResponseKind::Json, ResponseBody::Binary(bytes)) => {
            Rendered::Now(format_response(&String::from_utf8_lossy(bytes)))
        }
        (_, body) => Rendered::Later(body.clone()),
    }
}

/// Pretty-print `text` as JSON with two-space indentation, or keep it as is.
fn format_response(text: &str) -> String {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_else(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devtools_runtime::EventLoop;
    use parking_lot::Mutex;
    use serde_json::json;

    fn store_on(event_loop: &EventLoop, capacity: usize) -> RequestStore {
        RequestStore::new(
            event_loop.scheduler(),
            RequestStoreConfig {
                capacity,
                ..RequestStoreConfig::default()
            },
        )
    }

    #[test]
    fn test_get_unknown_request_is_empty() {
        let event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);

        let record = store.get_request("nope");
        assert_eq!(record.id, "nope");
        assert_eq!(record.url, "");
        assert!(store.is_empty());
    }

    #[test]
    fn test_new_ids_are_prepended() {
        let event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);

        store.update_request("a", RequestUpdate::default().url("/a"));
        store.update_request("b", RequestUpdate::default().url("/b"));

        assert_eq!(store.get_request_ids(), vec!["b", "a"]);
        assert_eq!(store.get_request("a").index, 1);
        assert_eq!(store.get_request("b").index, 2);
    }

    #[test]
    fn test_repeated_updates_merge_without_duplicating() {
        let event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);

        store.update_request("a", RequestUpdate::default().url("/a").ready_state(1));
        store.update_request("a", RequestUpdate::default().method("GET"));
        store.update_request("a", RequestUpdate::default().ready_state(4).http_status(200));

        assert_eq!(store.get_request_ids(), vec!["a"]);
        let record = store.get_request("a");
        assert_eq!(record.url, "/a");
        assert_eq!(record.method, "GET");
        assert_eq!(record.status, RequestStatus::Code(200));
    }

    #[test]
    fn test_insert_at_capacity_evicts_oldest() {
        let event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);

        for n in 0..200 {
            store.update_request(&format!("r{}", n), RequestUpdate::default());
        }
        assert_eq!(store.len(), 200);

        store.update_request("fresh", RequestUpdate::default());
        assert_eq!(store.len(), 200);
        assert_eq!(store.get_request_ids()[0], "fresh");
        assert!(!store.contains("r0"));
        assert!(!store.get_request_ids().contains(&"r0".to_string()));
        assert!(store.contains("r1"));

        // Updating a stored id never evicts.
        store.update_request("r1", RequestUpdate::default().url("/again"));
        assert_eq!(store.len(), 200);
        assert!(store.contains("r2"));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 0);
        let calls = Arc::new(Mutex::new(0));

        let c = calls.clone();
        store.attach(move |_| *c.lock() += 1);
        store.update_request("a", RequestUpdate::default().url("/a"));
        store.update_request("a", RequestUpdate::default().ready_state(4).http_status(200));
        event_loop.advance_by(Duration::from_millis(50)).unwrap();

        assert!(store.is_empty());
        assert!(store.get_request_ids().is_empty());
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn test_status_mapping() {
        let event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);

        store.update_request("a", RequestUpdate::default().ready_state(1));
        assert_eq!(store.get_request("a").status, RequestStatus::Pending);

        store.update_request("a", RequestUpdate::default().ready_state(3).http_status(200));
        assert_eq!(store.get_request("a").status, RequestStatus::Loading);

        store.update_request("a", RequestUpdate::default().ready_state(4).http_status(404));
        let record = store.get_request("a");
        assert_eq!(record.status, RequestStatus::Code(404));
        assert!(record.is_error());

        store.update_request("b", RequestUpdate::default().url("/b"));
        assert_eq!(store.get_request("b").status, RequestStatus::Unknown);
    }

    #[test]
    fn test_text_response_is_pretty_printed_when_json() {
        let event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);

        store.update_request(
            "a",
            RequestUpdate::default().response(ResponseKind::Text, ResponseBody::Text("{\"a\":1}".into())),
        );
        assert_eq!(store.get_request("a").decoded_response, "{\n  \"a\": 1\n}");

        store.update_request(
            "b",
            RequestUpdate::default().response(ResponseKind::Text, ResponseBody::Text("plain <b>".into())),
        );
        assert_eq!(store.get_request("b").decoded_response, "plain <b>");

        store.update_request(
            "c",
            RequestUpdate::default().response(ResponseKind::Text, ResponseBody::Json(json!({"x": 1}))),
        );
        assert_eq!(store.get_request("c").decoded_response, "[object Object]");
    }

    #[test]
    fn test_json_response_is_pretty_printed() {
        let event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);

        store.update_request(
            "a",
            RequestUpdate::default().response(ResponseKind::Json, ResponseBody::Json(json!({"list": [1, 2]}))),
        );
        assert_eq!(
            store.get_request("a").decoded_response,
            "{\n  \"list\": [\n    1,\n    2\n  ]\n}"
        );
    }

    #[test]
    fn test_binary_response_decodes_on_microtask() {
        let mut event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);
        let updates = Arc::new(Mutex::new(Vec::new()));

        let u = updates.clone();
        store.attach(move |record| u.lock().push(record.map(|r| r.decoded_response.clone())));

        store.update_request(
            "a",
            RequestUpdate::default()
                .response(ResponseKind::ArrayBuffer, ResponseBody::Binary(b"{\"ok\":true}".to_vec())),
        );
        assert_eq!(store.get_request("a").decoded_response, "");

        event_loop.run_until_idle();
        assert_eq!(store.get_request("a").decoded_response, "{\n  \"ok\": true\n}");

        event_loop.advance_by(Duration::from_millis(10)).unwrap();
        assert_eq!(*updates.lock(), vec![Some("{\n  \"ok\": true\n}".to_string())]);
    }

    #[test]
    fn test_failed_decode_is_dropped() {
        let mut event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);

        store.update_request(
            "a",
            RequestUpdate::default().response(ResponseKind::Blob, ResponseBody::Binary(vec![0xc3, 0x28])),
        );
        event_loop.run_until_idle();
        assert_eq!(store.get_request("a").decoded_response, "");
    }

    #[test]
    fn test_decode_after_clear_is_discarded() {
        let mut event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);

        store.update_request(
            "a",
            RequestUpdate::default().response(ResponseKind::Blob, ResponseBody::Binary(b"late".to_vec())),
        );
        store.clear_requests();
        event_loop.run_until_idle();
        assert!(!store.contains("a"));
    }

    #[test]
    fn test_notifications_are_debounced_with_last_record() {
        let mut event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        store.attach(move |record| s.lock().push(record.map(|r| r.url.clone())));

        store.update_request("a", RequestUpdate::default().url("/1"));
        store.update_request("a", RequestUpdate::default().url("/2"));
        store.update_request("a", RequestUpdate::default().url("/3"));
        event_loop.advance_by(Duration::from_millis(9)).unwrap();
        assert!(seen.lock().is_empty());

        event_loop.advance_by(Duration::from_millis(1)).unwrap();
        assert_eq!(*seen.lock(), vec![Some("/3".to_string())]);
    }

    #[test]
    fn test_clear_notifies_without_record() {
        let mut event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        store.attach(move |record| s.lock().push(record.is_some()));

        store.update_request("a", RequestUpdate::default());
        store.clear_requests();
        event_loop.advance_by(Duration::from_millis(10)).unwrap();

        assert!(store.is_empty());
        assert_eq!(*seen.lock(), vec![false]);

        store.update_request("b", RequestUpdate::default());
        assert_eq!(store.get_request("b").index, 1);
    }

    #[test]
    fn test_filter_by_url() {
        let event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);

        store.update_request("a", RequestUpdate::default().url("https://api.test/Users/1"));
        store.update_request("b", RequestUpdate::default().url("https://cdn.test/logo.png"));
        store.update_request("c", RequestUpdate::default().url("https://api.test/users/2"));

        let hits = store.filter_by_url("/users/").unwrap();
        assert_eq!(hits.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["c", "a"]);
        assert!(store.filter_by_url("[").is_err());
    }

    #[test]
    fn test_get_requests_in_index_order() {
        let event_loop = EventLoop::manual(0);
        let store = store_on(&event_loop, 200);

        store.update_request("a", RequestUpdate::default());
        store.update_request("b", RequestUpdate::default());
        let ids: Vec<_> = store.get_requests().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }
}
