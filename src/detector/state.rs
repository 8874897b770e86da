use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::config::ConfigurationView;
use crate::detector::host_metrics::HostMetrics;
use crate::error::Result;
use crate::event_bus::{EventBus, EventPayload, SampleBatch};
use crate::ids::HostId;

/// Owns all per-host state and the current configuration view. Guarded by a
/// single mutex in [`crate::detector::CoResidencyDetector`]; every method
/// here assumes exclusive access for the duration of one sample batch or
/// one reconfiguration, so two concurrent batches serialize instead of
/// racing on partially-updated host state.
#[derive(Debug)]
pub struct DetectorState {
    host_metrics: HashMap<HostId, HostMetrics>,
    host_flags: HashMap<HostId, u64>,
    host_deflags: HashMap<HostId, u64>,
    global_metrics: HashMap<String, f64>,
    mitigated_host_ids: HashSet<HostId>,
    config: Arc<ConfigurationView>,
}

impl DetectorState {
    pub fn new(config: Arc<ConfigurationView>) -> Self {
        Self {
            host_metrics: HashMap::new(),
            host_flags: HashMap::new(),
            host_deflags: HashMap::new(),
            global_metrics: HashMap::new(),
            mitigated_host_ids: HashSet::new(),
            config,
        }
    }

    /// Records this batch's samples, recomputes the global baseline and
    /// per-host deltas against it, advances each host's flag/deflag
    /// counters, and dispatches any resulting mitigation start/stop events.
    pub fn process_batch(&mut self, batch: &SampleBatch, event_bus: &EventBus) -> Result<()> {
        self.record_samples(batch)?;
        self.recompute_global_baseline();
        self.recompute_deltas();
        self.update_flags_and_deflags();
        self.dispatch_mitigation(event_bus);
        Ok(())
    }

    // (a) Per-host sample recording.
    fn record_samples(&mut self, batch: &SampleBatch) -> Result<()> {
        for (host, sample) in batch {
            match self.host_metrics.get_mut(host) {
                Some(metrics) => metrics.record_sample(sample),
                None => {
                    let metrics = HostMetrics::new(
                        host,
                        sample,
                        self.config.max_samples,
                        self.config.samples_before_inclusion,
                        self.config.samples_before_exclusion,
                        self.config.normalize_samples,
                    )?;
                    self.host_metrics.insert(host.clone(), metrics);
                }
            }
        }
        Ok(())
    }

    // (b) Global baseline recomputation.
    fn recompute_global_baseline(&mut self) {
        self.global_metrics.clear();
        let mut benign_count = 0u32;

        for (host, metrics) in &self.host_metrics {
            if !metrics.is_active() || self.mitigated_host_ids.contains(host) {
                continue;
            }
            benign_count += 1;
            for (metric, value) in metrics.report() {
                *self.global_metrics.entry(metric).or_insert(0.0) += value;
            }
        }

        if benign_count > 0 {
            for value in self.global_metrics.values_mut() {
                *value /= benign_count as f64;
            }
        }
        // benign_count == 0: globalMetrics stays empty; phases (c)/(d) become no-ops.
    }

    // (c) Per-host deltas.
    fn recompute_deltas(&mut self) {
        let global = self.global_metrics.clone();
        for metrics in self.host_metrics.values_mut() {
            if !metrics.is_active() {
                continue;
            }
            let report = metrics.report();
            let mut deltas = HashMap::with_capacity(report.len());
            for (metric, value) in report {
                match global.get(&metric) {
                    Some(&baseline) if baseline != 0.0 => {
                        deltas.insert(metric, (1.0 - value / baseline).abs());
                    }
                    // Zero or absent baseline: skip the metric rather than
                    // divide by zero.
                    _ => {}
                }
            }
            metrics.set_deltas(deltas);
        }
    }

    // (d) Flag/deflag update.
    fn update_flags_and_deflags(&mut self) {
        for (host, metrics) in &self.host_metrics {
            if !metrics.is_active() {
                continue;
            }
            let deltas = metrics.deltas();
            // An empty deltas map means no benign baseline existed this batch;
            // that is a no-op, not a vacuous "all thresholds exceeded".
            let all_exceed = !deltas.is_empty()
                && deltas.iter().all(|(metric, delta)| match self.config.thresholds.get(metric) {
                    Some(&threshold) => *delta > threshold,
                    // A metric with no configured threshold does not block flagging.
                    None => true,
                });

            if all_exceed {
                if self.mitigated_host_ids.contains(host) {
                    self.host_deflags.insert(host.clone(), 0);
                } else {
                    *self.host_flags.entry(host.clone()).or_insert(0) += 1;
                }
            } else if self.mitigated_host_ids.contains(host) {
                *self.host_deflags.entry(host.clone()).or_insert(0) += 1;
            }
        }
    }

    // (e) Mitigation dispatch.
    fn dispatch_mitigation(&mut self, event_bus: &EventBus) {
        let Some(mitigation) = self.config.mitigation.clone() else {
            return;
        };

        let to_start: Vec<HostId> = self
            .host_flags
            .iter()
            .filter(|(_, &v)| v > mitigation.flags_before_activation as u64)
            .map(|(h, _)| h.clone())
            .collect();
        for host in to_start {
            self.mitigated_host_ids.insert(host.clone());
            self.host_flags.insert(host.clone(), 0);
            debug!(host = %host, "starting mitigation");
            event_bus.emit(
                &self.config.event_names.start_mitigation,
                EventPayload::Host(host),
            );
        }

        let to_stop: Vec<HostId> = self
            .host_deflags
            .iter()
            .filter(|(_, &v)| v > mitigation.deflags_before_deactivation as u64)
            .map(|(h, _)| h.clone())
            .collect();
        for host in to_stop {
            self.mitigated_host_ids.remove(&host);
            self.host_deflags.insert(host.clone(), 0);
            debug!(host = %host, "stopping mitigation");
            event_bus.emit(
                &self.config.event_names.stop_mitigation,
                EventPayload::Host(host),
            );
        }
    }

    /// Reshapes every tracked host's windows to match a newly reloaded
    /// configuration, then swaps in the new configuration view.
    pub fn reconfigure(&mut self, new_config: Arc<ConfigurationView>) {
        for metrics in self.host_metrics.values_mut() {
            metrics.reconfigure(
                new_config.max_samples,
                new_config.samples_before_inclusion,
                new_config.samples_before_exclusion,
                new_config.normalize_samples,
            );
        }
        self.config = new_config;
    }

    pub fn config(&self) -> &Arc<ConfigurationView> {
        &self.config
    }

    pub fn mitigated_host_ids(&self) -> &HashSet<HostId> {
        &self.mitigated_host_ids
    }

    pub fn host_flags(&self, host: &HostId) -> u64 {
        self.host_flags.get(host).copied().unwrap_or(0)
    }

    pub fn host_deflags(&self, host: &HostId) -> u64 {
        self.host_deflags.get(host).copied().unwrap_or(0)
    }

    pub fn is_host_active(&self, host: &HostId) -> bool {
        self.host_metrics.get(host).map(HostMetrics::is_active).unwrap_or(false)
    }

    pub fn host_current_samples(&self, host: &HostId) -> Option<usize> {
        self.host_metrics.get(host).map(HostMetrics::current_samples)
    }
}
