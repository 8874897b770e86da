use std::collections::HashMap;

use crate::config::raw::RawConfig;
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub struct MitigationSettings {
    pub flags_before_activation: u32,
    pub deflags_before_deactivation: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventNames {
    pub configuration_reloaded: String,
    pub sample_event: String,
    pub start_mitigation: String,
    pub stop_mitigation: String,
}

/// The flat, already-extracted runtime configuration view handed to the
/// detector: `Performance.*` keys are flattened to the top level, and every
/// `{"Value": ...}` envelope from the wire format has already been stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationView {
    pub mitigation: Option<MitigationSettings>,
    pub thresholds: HashMap<String, f64>,
    pub max_samples: usize,
    pub samples_before_inclusion: i64,
    pub samples_before_exclusion: i64,
    pub normalize_samples: bool,
    pub event_names: EventNames,
}

impl ConfigurationView {
    /// Strips the `{"Value": ...}` envelope and flattens `Performance.*`
    /// into the top-level view, validating that every required section is
    /// present.
    pub fn extract(raw: RawConfig) -> Result<Self, ConfigError> {
        let enable_mitigation = raw
            .enable_mitigation
            .ok_or_else(|| ConfigError::MissingKey("EnableMitigation".into()))?;
        let mitigation_configuration = raw
            .mitigation_configuration
            .ok_or_else(|| ConfigError::MissingKey("MitigationConfiguration".into()))?;
        let thresholds_raw = raw
            .thresholds
            .ok_or_else(|| ConfigError::MissingKey("Thresholds".into()))?;
        let performance = raw
            .performance
            .ok_or_else(|| ConfigError::MissingKey("Performance".into()))?;
        let event_names_raw = raw
            .event_names
            .ok_or_else(|| ConfigError::MissingKey("EventNames".into()))?;

        let mitigation = if enable_mitigation {
            let flags_before_activation = mitigation_configuration.flags_before_activation.value;
            if flags_before_activation == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "MitigationConfiguration.FlagsBeforeActivation".into(),
                    value: 0,
                });
            }
            let deflags_before_deactivation =
                mitigation_configuration.deflags_before_deactivation.value;
            if deflags_before_deactivation == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "MitigationConfiguration.DeflagsBeforeDeactivation".into(),
                    value: 0,
                });
            }
            Some(MitigationSettings {
                flags_before_activation,
                deflags_before_deactivation,
            })
        } else {
            None
        };

        let max_samples = performance.max_samples.value;
        if max_samples == 0 {
            return Err(ConfigError::InvalidValue {
                key: "Performance.MaxSamples".into(),
                value: 0,
            });
        }

        let thresholds = thresholds_raw
            .into_iter()
            .map(|(k, v)| (k, v.value))
            .collect();

        Ok(Self {
            mitigation,
            thresholds,
            max_samples,
            samples_before_inclusion: performance.samples_before_inclusion.value,
            samples_before_exclusion: performance.samples_before_exclusion.value,
            normalize_samples: performance.normalize_samples.value,
            event_names: EventNames {
                configuration_reloaded: event_names_raw.configuration_reloaded.value,
                sample_event: event_names_raw.sample_event.value,
                start_mitigation: event_names_raw.start_mitigation.value,
                stop_mitigation: event_names_raw.stop_mitigation.value,
            },
        })
    }
}
