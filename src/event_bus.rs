use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::config::ConfigurationView;
use crate::ids::HostId;

/// Mapping host id → mapping metric name → real, the sole `SampleEvent` payload shape.
pub type SampleBatch = HashMap<HostId, HashMap<String, f64>>;

/// Closed sum type over every payload this crate's topics ever carry.
///
/// A type-erased `Any` payload would require every subscriber to downcast
/// (and handle a mismatch); a closed enum instead lets each topic's handler
/// pattern-match its expected variant infallibly.
#[derive(Debug, Clone)]
pub enum EventPayload {
    Samples(Arc<SampleBatch>),
    Config(Arc<ConfigurationView>),
    Host(HostId),
}

pub type Handler = Arc<dyn Fn(&EventPayload) + Send + Sync>;

/// Process-wide named-topic pub/sub with synchronous fan-out under a single mutex.
///
/// One instance is expected per process: a lifecycle singleton held behind
/// an `Arc` and shared with collaborators, constructed explicitly at process
/// init rather than enforced by the type system.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<String, Vec<Handler>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics: Vec<String> = self.subscribers.lock().keys().cloned().collect();
        f.debug_struct("EventBus").field("topics", &topics).finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `topic`. Subscribing the same handler twice
    /// is allowed and produces two invocations per `emit`.
    pub fn on(&self, topic: impl Into<String>, handler: Handler) {
        self.subscribers
            .lock()
            .entry(topic.into())
            .or_default()
            .push(handler);
    }

    /// Invokes every subscriber of `topic`, in registration order, with `payload`.
    ///
    /// The subscriber list is cloned (cheap `Arc` clones) under the lock and
    /// invoked after releasing it, so a handler that calls back into `on`/
    /// `emit` on this same bus does not deadlock.
    pub fn emit(&self, topic: &str, payload: EventPayload) {
        let handlers = {
            let guard = self.subscribers.lock();
            match guard.get(topic) {
                Some(handlers) => handlers.clone(),
                None => return,
            }
        };

        for handler in handlers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| handler(&payload)));
            if let Err(panic) = result {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(topic, message, "event bus subscriber panicked; swallowing");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscribing_twice_invokes_twice() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let count = count.clone();
            bus.on(
                "topic",
                Arc::new(move |_: &EventPayload| {
                    count.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        bus.emit("topic", EventPayload::Host(HostId::from("h")));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn emit_to_unknown_topic_is_a_no_op() {
        let bus = EventBus::new();
        bus.emit("nobody-home", EventPayload::Host(HostId::from("h")));
    }

    #[test]
    fn a_panicking_subscriber_does_not_stop_the_others() {
        let bus = EventBus::new();
        let ran = Arc::new(AtomicUsize::new(0));

        bus.on(
            "topic",
            Arc::new(|_: &EventPayload| {
                panic!("boom");
            }),
        );
        let ran2 = ran.clone();
        bus.on(
            "topic",
            Arc::new(move |_: &EventPayload| {
                ran2.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let prev_hook = panic::take_hook();
        panic::set_hook(Box::new(|_| {}));
        bus.emit("topic", EventPayload::Host(HostId::from("h")));
        panic::set_hook(prev_hook);

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reentrant_emit_from_within_a_handler_does_not_deadlock() {
        let bus = Arc::new(EventBus::new());
        let inner = bus.clone();
        bus.on(
            "outer",
            Arc::new(move |_: &EventPayload| {
                inner.emit("inner", EventPayload::Host(HostId::from("h")));
            }),
        );
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        bus.on(
            "inner",
            Arc::new(move |_: &EventPayload| {
                fired2.fetch_add(1, Ordering::SeqCst);
            }),
        );
        bus.emit("outer", EventPayload::Host(HostId::from("h")));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
