pub mod host_metrics;
mod state;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::config::ConfigurationView;
use crate::event_bus::{EventBus, EventPayload, SampleBatch};
use crate::ids::HostId;

pub use state::DetectorState;

/// Subscribes to sample and reload events; owns all per-host state.
///
/// Singleton per process, constructed once with the initial configuration
/// view and an event bus handle: construction subscribes the reload handler
/// to the configured reload topic and the sample handler to the configured
/// sample topic. The topics subscribed are fixed at construction time from
/// the initial view's `EventNames` and do not change if a later reload
/// renames them.
pub struct CoResidencyDetector {
    state: Mutex<DetectorState>,
    event_bus: Arc<EventBus>,
}

impl std::fmt::Debug for CoResidencyDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoResidencyDetector").finish_non_exhaustive()
    }
}

impl CoResidencyDetector {
    pub fn new(initial_config: Arc<ConfigurationView>, event_bus: Arc<EventBus>) -> Arc<Self> {
        let sample_topic = initial_config.event_names.sample_event.clone();
        let reload_topic = initial_config.event_names.configuration_reloaded.clone();

        let detector = Arc::new(Self {
            state: Mutex::new(DetectorState::new(initial_config)),
            event_bus: event_bus.clone(),
        });

        let sample_handler = detector.clone();
        event_bus.on(
            sample_topic,
            Arc::new(move |payload: &EventPayload| sample_handler.handle_sample_event(payload)),
        );

        let reload_handler = detector.clone();
        event_bus.on(
            reload_topic,
            Arc::new(move |payload: &EventPayload| reload_handler.handle_config_reload(payload)),
        );

        detector
    }

    fn handle_sample_event(&self, payload: &EventPayload) {
        let EventPayload::Samples(batch) = payload else {
            return;
        };
        self.process_batch(batch);
    }

    /// The single ingest path, also reachable directly by callers that hold
    /// the batch already (tests, or a producer wired without going through
    /// the bus). A missing-`Activity`-metric error is fatal: unlike a
    /// subscriber panic, it is not swallowed — it terminates the process.
    pub fn process_batch(&self, batch: &SampleBatch) {
        let mut state = self.state.lock();
        if let Err(err) = state.process_batch(batch, &self.event_bus) {
            error!(error = %err, "fatal configuration error while ingesting sample batch");
            std::process::exit(1);
        }
    }

    fn handle_config_reload(&self, payload: &EventPayload) {
        let EventPayload::Config(view) = payload else {
            return;
        };
        self.state.lock().reconfigure(view.clone());
    }

    pub fn current_config(&self) -> Arc<ConfigurationView> {
        self.state.lock().config().clone()
    }

    pub fn mitigated_hosts(&self) -> HashSet<HostId> {
        self.state.lock().mitigated_host_ids().clone()
    }

    pub fn host_flags(&self, host: &HostId) -> u64 {
        self.state.lock().host_flags(host)
    }

    pub fn host_deflags(&self, host: &HostId) -> u64 {
        self.state.lock().host_deflags(host)
    }

    pub fn is_host_active(&self, host: &HostId) -> bool {
        self.state.lock().is_host_active(host)
    }

    pub fn host_current_samples(&self, host: &HostId) -> Option<usize> {
        self.state.lock().host_current_samples(host)
    }
}
