pub mod config;
pub mod detector;
pub mod error;
pub mod event_bus;
pub mod ids;
pub mod ring_buffer;

pub use config::{ConfigurationManager, ConfigurationView, EventNames, MitigationSettings};
pub use detector::CoResidencyDetector;
pub use error::{ConfigError, ConfigResult, Result, SentinelError};
pub use event_bus::{EventBus, EventPayload, Handler, SampleBatch};
pub use ids::HostId;
pub use ring_buffer::RingBuffer;
