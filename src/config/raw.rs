use std::collections::HashMap;

use serde::Deserialize;

/// The `{"Value": ...}` envelope every leaf in the configuration file is wrapped in.
#[derive(Debug, Deserialize)]
pub struct ValueWrapper<T> {
    #[serde(rename = "Value")]
    pub value: T,
}

#[derive(Debug, Deserialize)]
pub struct RawMitigationConfiguration {
    #[serde(rename = "FlagsBeforeActivation")]
    pub flags_before_activation: ValueWrapper<u32>,
    #[serde(rename = "DeflagsBeforeDeactivation")]
    pub deflags_before_deactivation: ValueWrapper<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RawPerformance {
    #[serde(rename = "MaxSamples")]
    pub max_samples: ValueWrapper<usize>,
    #[serde(rename = "SamplesBeforeInclusion")]
    pub samples_before_inclusion: ValueWrapper<i64>,
    #[serde(rename = "SamplesBeforeExclusion")]
    pub samples_before_exclusion: ValueWrapper<i64>,
    #[serde(rename = "NormalizeSamples")]
    pub normalize_samples: ValueWrapper<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RawEventNames {
    #[serde(rename = "ConfigurationReloaded")]
    pub configuration_reloaded: ValueWrapper<String>,
    #[serde(rename = "SampleEvent")]
    pub sample_event: ValueWrapper<String>,
    #[serde(rename = "StartMitigation")]
    pub start_mitigation: ValueWrapper<String>,
    #[serde(rename = "StopMitigation")]
    pub stop_mitigation: ValueWrapper<String>,
}

/// Top-level keys are `Option` rather than required-by-serde so that a
/// missing key surfaces as [`crate::error::ConfigError::MissingKey`] (a
/// fatal configuration error) rather than being indistinguishable from a
/// malformed-JSON parse failure (non-fatal).
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    #[serde(rename = "EnableMitigation")]
    pub enable_mitigation: Option<bool>,
    #[serde(rename = "MitigationConfiguration")]
    pub mitigation_configuration: Option<RawMitigationConfiguration>,
    #[serde(rename = "Thresholds")]
    pub thresholds: Option<HashMap<String, ValueWrapper<f64>>>,
    #[serde(rename = "Performance")]
    pub performance: Option<RawPerformance>,
    #[serde(rename = "EventNames")]
    pub event_names: Option<RawEventNames>,
}
