use std::collections::HashMap;
use std::sync::{Arc, Once};

use coresidency_detector::{ConfigurationView, EventNames, HostId, MitigationSettings, SampleBatch};

static TRACING_INIT: Once = Once::new();

/// Enables `RUST_LOG`-driven output for tests run with `--nocapture`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn config(
    mitigation: Option<(u32, u32)>,
    thresholds: &[(&str, f64)],
    max_samples: usize,
    samples_before_inclusion: i64,
    samples_before_exclusion: i64,
    normalize_samples: bool,
) -> Arc<ConfigurationView> {
    Arc::new(ConfigurationView {
        mitigation: mitigation.map(|(flags, deflags)| MitigationSettings {
            flags_before_activation: flags,
            deflags_before_deactivation: deflags,
        }),
        thresholds: thresholds.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        max_samples,
        samples_before_inclusion,
        samples_before_exclusion,
        normalize_samples,
        event_names: EventNames {
            configuration_reloaded: "config.reloaded".to_string(),
            sample_event: "sample.event".to_string(),
            start_mitigation: "mitigation.start".to_string(),
            stop_mitigation: "mitigation.stop".to_string(),
        },
    })
}

pub fn batch(entries: &[(&str, f64, f64)]) -> SampleBatch {
    entries
        .iter()
        .map(|(host, activity, cpu)| {
            (
                HostId::from(*host),
                HashMap::from([("Activity".to_string(), *activity), ("Cpu".to_string(), *cpu)]),
            )
        })
        .collect()
}
