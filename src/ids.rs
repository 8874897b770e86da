use std::fmt;
use std::sync::Arc;

/// An opaque, hashable host identifier.
///
/// Backed by `Arc<str>` rather than `String` so that a single host id can be
/// cheaply shared across the per-batch sample map, the detector's internal
/// bookkeeping maps, and outgoing `StartMitigation`/`StopMitigation` event
/// payloads without re-allocating on every clone.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(Arc<str>);

impl HostId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<&str> for HostId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for HostId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}
