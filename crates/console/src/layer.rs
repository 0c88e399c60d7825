//! `tracing` layer mirroring Rust-side events into a [`LogStore`].

use crate::entry::LogLevel;
use crate::log_store::LogStore;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Crates making up the capture machinery itself.
const OWN_CRATES: [&str; 4] = ["devtools", "devtools_runtime", "devtools_console", "devtools_network"];

fn is_own_target(target: &str) -> bool {
    let krate = target.split("::").next().unwrap_or(target);
    OWN_CRATES.contains(&krate)
}

/// A `tracing` layer that records events as console entries.
///
/// The entry payload is the event message followed by an object holding the
/// remaining fields and the event target.
pub struct CaptureLayer {
    store: LogStore,
}

impl CaptureLayer {
    /// Creates a layer feeding `store`.
    pub fn new(store: LogStore) -> Self {
        Self { store }
    }
}

fn level_of(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warn,
        Level::INFO => LogLevel::Info,
        _ => LogLevel::Log,
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();

        // Recording our own events would feed the store from inside itself.
        if is_own_target(target) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut payload = vec![Value::String(visitor.message)];
        visitor.fields.insert("target".to_string(), Value::String(target.to_string()));
        payload.push(Value::Object(visitor.fields));

        self.store.add_log(level_of(metadata.level()), payload);
    }
}

/// Collects the message and the typed fields of an event.
#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Map<String, Value>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields
                .insert(field.name().to_string(), Value::String(format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::Bool(value));
    }
}
