//! Coordinator construction and lifecycle recording

use coordinator::traits::MockConfigCodec;
use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorError, JsonConfigCodec, LifecycleObserver, OutputMode, ProbeKind,
    StaticExecutableLocator,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Launched(String),
    Ready(String, ProbeKind),
    Failed(String),
    Released(String),
}

/// Observer that keeps every lifecycle event in arrival order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
    pids: Mutex<Vec<u32>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Pids of every launched process, in launch order
    pub fn pids(&self) -> Vec<u32> {
        self.pids.lock().unwrap().clone()
    }

    pub fn launched(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Launched(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn released(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Released(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn failed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Failed(name) => Some(name),
                _ => None,
            })
            .collect()
    }
}

impl LifecycleObserver for RecordingObserver {
    fn on_launched(&self, service: &str, pid: Option<u32>) {
        self.pids.lock().unwrap().extend(pid);
        self.push(Event::Launched(service.to_string()));
    }

    fn on_ready(&self, service: &str, probe: &ProbeKind, _elapsed: Duration) {
        self.push(Event::Ready(service.to_string(), probe.clone()));
    }

    fn on_failed(&self, service: &str, _error: &CoordinatorError) {
        self.push(Event::Failed(service.to_string()));
    }

    fn on_released(&self, service: &str) {
        self.push(Event::Released(service.to_string()));
    }
}

pub struct TestHelpers;

impl TestHelpers {
    /// Coordinator writing artifacts into `dir`, with output kept out of the test log
    pub fn coordinator(
        dir: &TempDir,
        observer: Arc<RecordingObserver>,
    ) -> Coordinator<StaticExecutableLocator, JsonConfigCodec> {
        Self::coordinator_with_locator(dir, StaticExecutableLocator::new(), observer)
    }

    pub fn coordinator_with_locator(
        dir: &TempDir,
        locator: StaticExecutableLocator,
        observer: Arc<RecordingObserver>,
    ) -> Coordinator<StaticExecutableLocator, JsonConfigCodec> {
        let config = CoordinatorConfig::new(1)
            .with_artifact_dir(dir.path())
            .with_output(OutputMode::Discard);
        let codec = JsonConfigCodec::new(dir.path(), 1);
        Coordinator::new(config, locator, codec).with_observer(observer)
    }

    /// Coordinator whose config files come from `codec`
    pub fn coordinator_with_codec(
        dir: &TempDir,
        codec: MockConfigCodec,
        observer: Arc<RecordingObserver>,
    ) -> Coordinator<StaticExecutableLocator, MockConfigCodec> {
        let config = CoordinatorConfig::new(1)
            .with_artifact_dir(dir.path())
            .with_output(OutputMode::Discard);
        Coordinator::new(config, StaticExecutableLocator::new(), codec).with_observer(observer)
    }

    /// A localhost port with nothing listening on it
    pub fn unused_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    /// Whether a process with `pid` still exists
    pub fn process_alive(pid: u32) -> bool {
        std::path::Path::new(&format!("/proc/{pid}")).exists()
    }
}
