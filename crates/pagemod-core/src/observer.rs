//! Observer fan-out
//!
//! Every pipeline message goes to `tracing` and to each registered
//! [`ObserverSink`], tagged with the page run's correlation id.

use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Receiver of pipeline messages
pub trait ObserverSink: Send + Sync {
    fn on_info(&self, correlation_id: Uuid, message: &str);
    fn on_warning(&self, correlation_id: Uuid, message: &str);
    fn on_error(&self, correlation_id: Uuid, message: &str);
    fn on_debug(&self, _correlation_id: Uuid, _message: &str) {}
}

/// Registered observers
#[derive(Default)]
pub struct Diagnostics {
    sinks: RwLock<Vec<Arc<dyn ObserverSink>>>,
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("sinks", &self.sinks.read().len())
            .finish()
    }
}

impl Diagnostics {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sink: Arc<dyn ObserverSink>) {
        self.sinks.write().push(sink);
    }

    /// Whether anyone besides `tracing` is listening
    #[must_use]
    pub fn has_observers(&self) -> bool {
        !self.sinks.read().is_empty()
    }

    pub fn info(&self, correlation_id: Uuid, message: &str) {
        tracing::info!(%correlation_id, "{message}");
        self.each(|s| s.on_info(correlation_id, message));
    }

    pub fn warning(&self, correlation_id: Uuid, message: &str) {
        tracing::warn!(%correlation_id, "{message}");
        self.each(|s| s.on_warning(correlation_id, message));
    }

    pub fn error(&self, correlation_id: Uuid, message: &str) {
        tracing::error!(%correlation_id, "{message}");
        self.each(|s| s.on_error(correlation_id, message));
    }

    pub fn debug(&self, correlation_id: Uuid, message: &str) {
        tracing::debug!(%correlation_id, "{message}");
        self.each(|s| s.on_debug(correlation_id, message));
    }

    fn each(&self, f: impl Fn(&dyn ObserverSink)) {
        // clone out so sinks may register others without deadlocking
        let sinks = self.sinks.read().clone();
        for sink in &sinks {
            f(sink.as_ref());
        }
    }
}
