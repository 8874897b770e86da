mod manager;
mod raw;
mod view;

pub use manager::ConfigurationManager;
pub use view::{ConfigurationView, EventNames, MitigationSettings};
