use std::collections::HashMap;

use crate::error::{Result, SentinelError};
use crate::ids::HostId;
use crate::ring_buffer::RingBuffer;

/// The activity metric name every sample must carry. Its absence on a
/// host's first observed sample is a fatal configuration error for the
/// process, since activity is what drives the hysteresis rule below.
pub const ACTIVITY_METRIC: &str = "Activity";

fn hysteresis_thresholds(max_samples: usize, before_inclusion: i64, before_exclusion: i64) -> (i64, i64) {
    let activity = if before_inclusion > 0 {
        before_inclusion
    } else {
        max_samples.saturating_sub(1) as i64
    };
    let inactivity = if before_exclusion > 0 { before_exclusion } else { 1 };
    (activity, inactivity)
}

/// Rolling multi-metric state for a single host.
#[derive(Debug)]
pub struct HostMetrics {
    raw: HashMap<String, RingBuffer>,
    normalized: HashMap<String, RingBuffer>,
    current_samples: usize,
    max_samples: usize,
    activity_threshold: i64,
    inactivity_threshold: i64,
    pref_normalized: bool,
    deltas: HashMap<String, f64>,
    active: bool,
}

impl HostMetrics {
    /// Seeds both sequences from a host's first observed sample.
    pub fn new(
        host: &HostId,
        sample: &HashMap<String, f64>,
        max_samples: usize,
        samples_before_inclusion: i64,
        samples_before_exclusion: i64,
        pref_normalized: bool,
    ) -> Result<Self> {
        if !sample.contains_key(ACTIVITY_METRIC) {
            return Err(SentinelError::MissingActivityMetric(host.clone()));
        }

        let mut raw = HashMap::with_capacity(sample.len());
        let mut normalized = HashMap::with_capacity(sample.len());
        for (metric, &value) in sample {
            raw.insert(metric.clone(), RingBuffer::seeded(max_samples, value));
            normalized.insert(metric.clone(), RingBuffer::seeded(max_samples, value));
        }

        let (activity_threshold, inactivity_threshold) =
            hysteresis_thresholds(max_samples, samples_before_inclusion, samples_before_exclusion);

        let mut metrics = Self {
            raw,
            normalized,
            current_samples: 1,
            max_samples,
            activity_threshold,
            inactivity_threshold,
            pref_normalized,
            deltas: HashMap::new(),
            active: false,
        };
        metrics.update_active();
        Ok(metrics)
    }

    /// Appends a subsequent sample for an already-known host (phase (a),
    /// the non-first-seen branch).
    pub fn record_sample(&mut self, sample: &HashMap<String, f64>) {
        if self.current_samples < self.max_samples {
            self.current_samples += 1;
        }
        // When the window is already full, `RingBuffer::push` below evicts the
        // oldest raw/normalized entry for every metric itself.

        let metrics: Vec<String> = self.raw.keys().cloned().collect();
        for metric in metrics {
            let new_value = sample.get(&metric).copied().unwrap_or(0.0);
            let raw_buf = self.raw.get_mut(&metric).expect("tracked metric");
            let prior = raw_buf.last();
            raw_buf.push(new_value);

            let diff = match prior {
                Some(prior) => new_value - prior,
                None => new_value,
            };
            self.normalized
                .get_mut(&metric)
                .expect("tracked metric")
                .push(diff);
        }

        // Activity's normalized sequence always mirrors its raw sequence.
        if let Some(raw_activity) = self.raw.get(ACTIVITY_METRIC).cloned() {
            self.normalized.insert(ACTIVITY_METRIC.to_string(), raw_activity);
        }

        self.update_active();
    }

    fn update_active(&mut self) {
        let Some(activity) = self.raw.get(ACTIVITY_METRIC) else {
            return;
        };
        let sum = activity.sum();
        if sum > self.activity_threshold as f64 {
            self.active = true;
        } else if sum < self.inactivity_threshold as f64 {
            self.active = false;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current_samples(&self) -> usize {
        self.current_samples
    }

    pub fn tracked_metrics(&self) -> impl Iterator<Item = &str> {
        self.raw.keys().map(String::as_str)
    }

    /// Per-metric averaged report used by the global baseline (phase (b)):
    /// `round(sum(chosenSeq[m]) / currentSamples)`.
    pub fn report(&self) -> HashMap<String, f64> {
        let source = if self.pref_normalized {
            &self.normalized
        } else {
            &self.raw
        };
        source
            .iter()
            .map(|(metric, buf)| (metric.clone(), (buf.sum() / self.current_samples as f64).round()))
            .collect()
    }

    pub fn deltas(&self) -> &HashMap<String, f64> {
        &self.deltas
    }

    pub fn set_deltas(&mut self, deltas: HashMap<String, f64>) {
        self.deltas = deltas;
    }

    /// Reshapes this host's windows and thresholds after a configuration reload.
    pub fn reconfigure(
        &mut self,
        max_samples: usize,
        samples_before_inclusion: i64,
        samples_before_exclusion: i64,
        pref_normalized: bool,
    ) {
        for buf in self.raw.values_mut() {
            buf.set_capacity(max_samples);
        }
        for buf in self.normalized.values_mut() {
            buf.set_capacity(max_samples);
        }
        self.max_samples = max_samples;
        // Clamp rather than leave stale: otherwise a later average would
        // divide by a sample count larger than the (now-shrunk) sequence.
        self.current_samples = self.current_samples.min(max_samples);

        let (activity_threshold, inactivity_threshold) =
            hysteresis_thresholds(max_samples, samples_before_inclusion, samples_before_exclusion);
        self.activity_threshold = activity_threshold;
        self.inactivity_threshold = inactivity_threshold;
        self.pref_normalized = pref_normalized;
    }

    #[cfg(test)]
    pub fn raw_sequence(&self, metric: &str) -> Vec<f64> {
        self.raw.get(metric).map(|b| b.iter().collect()).unwrap_or_default()
    }

    #[cfg(test)]
    pub fn normalized_sequence(&self, metric: &str) -> Vec<f64> {
        self.normalized
            .get(metric)
            .map(|b| b.iter().collect())
            .unwrap_or_default()
    }
}
