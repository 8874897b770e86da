use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::raw::RawConfig;
use crate::config::view::ConfigurationView;
use crate::error::ConfigError;
use crate::event_bus::{EventBus, EventPayload};

const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Loads the JSON configuration file, keeps a live view of it in memory, and
/// watches the containing directory for edits.
///
/// Construction is synchronous: it resolves the path, loads the initial
/// view, and spawns the observer before returning. The observer itself then
/// runs on a dedicated background thread, separate from that synchronous
/// setup path, so file events keep draining for the manager's lifetime
/// without blocking its caller.
pub struct ConfigurationManager {
    path: PathBuf,
    view: Mutex<Arc<ConfigurationView>>,
    event_bus: Arc<EventBus>,
    stop_flag: Arc<AtomicBool>,
    watcher_thread: Mutex<Option<JoinHandle<()>>>,
    // Keeping the watcher alive for the manager's lifetime; notify drops the
    // underlying OS watch as soon as this is dropped.
    _watcher: Mutex<Option<RecommendedWatcher>>,
}

impl std::fmt::Debug for ConfigurationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationManager")
            .field("path", &self.path)
            .finish()
    }
}

impl ConfigurationManager {
    /// Resolves `path` to an absolute path, loads and extracts the initial
    /// view, then spawns the directory watcher on a dedicated thread.
    pub fn new(path: impl AsRef<Path>, event_bus: Arc<EventBus>) -> Result<Arc<Self>, ConfigError> {
        let path = fs::canonicalize(path.as_ref()).map_err(|source| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let initial_view = load_and_extract(&path)?;

        let stop_flag = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();

        let mut watcher: RecommendedWatcher =
            notify::recommended_watcher(tx).map_err(|source| ConfigError::Watch {
                path: parent.clone(),
                source,
            })?;
        watcher
            .watch(&parent, RecursiveMode::NonRecursive)
            .map_err(|source| ConfigError::Watch {
                path: parent.clone(),
                source,
            })?;

        let manager = Arc::new(Self {
            path,
            view: Mutex::new(Arc::new(initial_view)),
            event_bus,
            stop_flag: stop_flag.clone(),
            watcher_thread: Mutex::new(None),
            _watcher: Mutex::new(Some(watcher)),
        });

        let worker = {
            let manager = manager.clone();
            thread::spawn(move || manager.watch_loop(rx, stop_flag))
        };
        *manager.watcher_thread.lock() = Some(worker);

        info!(path = %manager.path.display(), "configuration manager watching directory for changes");
        Ok(manager)
    }

    pub fn current(&self) -> Arc<ConfigurationView> {
        self.view.lock().clone()
    }

    /// Halts and joins the observer thread. Idempotent.
    pub fn stop(&self) {
        if self.stop_flag.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.watcher_thread.lock().take() {
            let _ = handle.join();
        }
    }

    fn watch_loop(&self, rx: mpsc::Receiver<notify::Result<Event>>, stop_flag: Arc<AtomicBool>) {
        while !stop_flag.load(Ordering::SeqCst) {
            match rx.recv_timeout(WATCH_POLL_INTERVAL) {
                Ok(Ok(event)) => self.on_fs_event(event),
                Ok(Err(err)) => warn!(error = %err, "configuration watcher received an error event"),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        debug!("configuration watcher thread exiting");
    }

    fn on_fs_event(&self, event: Event) {
        if !matches!(event.kind, EventKind::Modify(_)) {
            return;
        }
        if !event.paths.iter().any(|p| p == &self.path) {
            return;
        }
        self.reload();
    }

    fn reload(&self) {
        match load_and_extract(&self.path) {
            Ok(view) => {
                let view = Arc::new(view);
                let topic = view.event_names.configuration_reloaded.clone();
                *self.view.lock() = view.clone();
                info!(path = %self.path.display(), "configuration reloaded");
                self.event_bus.emit(&topic, EventPayload::Config(view));
            }
            Err(ConfigError::MissingKey(key)) => {
                error!(key, "configuration is missing a required top-level key; exiting");
                std::process::exit(1);
            }
            Err(err) => {
                error!(error = %err, "configuration reload failed; keeping previous configuration");
            }
        }
    }
}

impl Drop for ConfigurationManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Reads, MIME-probes, parses, and extracts the configuration file at `path`.
///
/// A recognized `application/json` sniff passes; an unrecognized sniff (the
/// expected case for small hand-written JSON/text files, which rarely carry
/// distinguishing magic bytes) falls through to a UTF-8 validity check
/// standing in for `text/plain`.
fn load_and_extract(path: &Path) -> Result<ConfigurationView, ConfigError> {
    let bytes = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match infer::get(&bytes) {
        Some(kind) if kind.mime_type() == "application/json" => {}
        Some(kind) => {
            return Err(ConfigError::UnsupportedMime {
                path: path.to_path_buf(),
                mime: kind.mime_type().to_string(),
            })
        }
        None if std::str::from_utf8(&bytes).is_ok() => {}
        None => {
            return Err(ConfigError::UnsupportedMime {
                path: path.to_path_buf(),
                mime: "application/octet-stream".to_string(),
            })
        }
    }

    let raw: RawConfig = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    ConfigurationView::extract(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Instant;

    fn sample_json(max_samples: u32) -> String {
        format!(
            r#"{{
                "EnableMitigation": true,
                "MitigationConfiguration": {{
                    "FlagsBeforeActivation": {{"Value": 3}},
                    "DeflagsBeforeDeactivation": {{"Value": 2}}
                }},
                "Thresholds": {{"Activity": {{"Value": 0.0}}, "Cpu": {{"Value": 0.1}}}},
                "Performance": {{
                    "MaxSamples": {{"Value": {max_samples}}},
                    "SamplesBeforeInclusion": {{"Value": 1}},
                    "SamplesBeforeExclusion": {{"Value": 0}},
                    "NormalizeSamples": {{"Value": false}}
                }},
                "EventNames": {{
                    "ConfigurationReloaded": {{"Value": "config.reloaded"}},
                    "SampleEvent": {{"Value": "sample.event"}},
                    "StartMitigation": {{"Value": "mitigation.start"}},
                    "StopMitigation": {{"Value": "mitigation.stop"}}
                }}
            }}"#
        )
    }

    #[test]
    fn loads_initial_view_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, sample_json(10)).unwrap();

        let bus = Arc::new(EventBus::new());
        let manager = ConfigurationManager::new(&path, bus).unwrap();
        assert_eq!(manager.current().max_samples, 10);
        manager.stop();
    }

    #[test]
    fn rewriting_the_file_emits_a_reload_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, sample_json(10)).unwrap();

        let bus = Arc::new(EventBus::new());
        let manager = ConfigurationManager::new(&path, bus.clone()).unwrap();

        let seen = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        bus.on(
            "config.reloaded",
            Arc::new(move |payload: &EventPayload| {
                if let EventPayload::Config(view) = payload {
                    *seen2.lock() = Some(view.max_samples);
                }
            }),
        );

        let mut file = fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.write_all(sample_json(3).as_bytes()).unwrap();
        drop(file);

        let deadline = Instant::now() + Duration::from_secs(5);
        while seen.lock().is_none() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(50));
        }

        assert_eq!(*seen.lock(), Some(3));
        assert_eq!(manager.current().max_samples, 3);
        manager.stop();
    }

    #[test]
    fn bad_json_reload_keeps_previous_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, sample_json(10)).unwrap();

        let bus = Arc::new(EventBus::new());
        let manager = ConfigurationManager::new(&path, bus).unwrap();

        fs::write(&path, b"{ not json").unwrap();
        thread::sleep(Duration::from_millis(500));

        assert_eq!(manager.current().max_samples, 10);
        manager.stop();
    }

    #[test]
    fn stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, sample_json(10)).unwrap();

        let bus = Arc::new(EventBus::new());
        let manager = ConfigurationManager::new(&path, bus).unwrap();
        manager.stop();
        manager.stop();
    }
}
