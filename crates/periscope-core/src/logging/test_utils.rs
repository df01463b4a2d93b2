//! In-memory capture of tracing events for assertions in tests.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// One recorded event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// Severity.
    pub level: Level,
    /// Module path of the call site.
    pub target: String,
    /// Rendered `message` field.
    pub message: String,
    /// Structured fields other than `message`, rendered as text.
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    fn from_event(event: &Event<'_>) -> Self {
        let meta = event.metadata();
        let mut record = Self {
            level: *meta.level(),
            target: meta.target().to_owned(),
            message: String::new(),
            fields: BTreeMap::new(),
        };
        event.record(&mut record);
        record
    }

    fn put(&mut self, field: &Field, rendered: String) {
        match field.name() {
            "message" => self.message = rendered,
            name => {
                let _ = self.fields.insert(name.to_owned(), rendered);
            }
        }
    }
}

impl Visit for CapturedEvent {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_owned());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}"));
    }
}

/// Shared buffer of events; clones see the same buffer.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    fn any(&self, pred: impl Fn(&CapturedEvent) -> bool) -> bool {
        self.buffer.lock().iter().any(pred)
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.buffer.lock().clone()
    }

    /// Any event whose message contains `needle`.
    pub fn has_message(&self, needle: &str) -> bool {
        self.any(|e| e.message.contains(needle))
    }

    /// Message substring match restricted to `level`.
    pub fn has_event(&self, level: Level, needle: &str) -> bool {
        self.any(|e| e.level == level && e.message.contains(needle))
    }

    /// Any event carrying `name` rendered exactly as `value`.
    pub fn has_field(&self, name: &str, value: &str) -> bool {
        self.any(|e| e.fields.get(name).is_some_and(|v| v == value))
    }

    /// Number of events at exactly `level`.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.buffer.lock().iter().filter(|e| e.level == level).count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.buffer.lock().push(CapturedEvent::from_event(event));
    }
}

/// Record every event on the current thread until the guard drops.
///
/// Events emitted from other runtime worker threads are missed, so tests
/// that rely on this should run on a current-thread runtime.
pub fn capture_logs() -> (CapturedLogs, DefaultGuard) {
    let logs = CapturedLogs::default();
    let guard = tracing_subscriber::registry()
        .with(logs.clone())
        .with(LevelFilter::TRACE)
        .set_default();
    (logs, guard)
}
