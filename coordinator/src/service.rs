//! Service specs and the handles of launched services
//!
//! [`launch`] turns an immutable [`ServiceSpec`] into a [`RunningService`]:
//! it writes the config artifact, starts the process with captured output
//! and returns straight away. Readiness is the coordinator's concern.

use serde::Serialize;
use shared::{service_debug, service_warn, LabelColor, OutputStream, ServiceLabel};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config::{OutputMode, ReleasePolicy};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::output::{spawn_output_reader, OutputBuffer};
use crate::services::codec::ConfigArtifact;
use crate::traits::{ConfigCodec, ExecutableLocator, Probe};

/// Flag placed before the config artifact path unless told otherwise
pub const DEFAULT_CONFIG_FLAG: &str = "--config";

/// How long release waits for output readers to drain after the process is gone
const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Immutable description of one service to start
pub struct ServiceSpec {
    label: ServiceLabel,
    executable: Option<PathBuf>,
    args: Vec<String>,
    config: Option<serde_json::Value>,
    config_flag: Option<String>,
    env: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
    ports: BTreeMap<String, u16>,
    probes: Vec<Box<dyn Probe>>,
    cleanup_paths: Vec<PathBuf>,
}

impl ServiceSpec {
    pub fn builder(name: impl Into<String>) -> ServiceSpecBuilder {
        ServiceSpecBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        self.label.name()
    }

    pub fn label(&self) -> &ServiceLabel {
        &self.label
    }

    /// Explicit executable, if any; otherwise the locator resolves the name
    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn config(&self) -> Option<&serde_json::Value> {
        self.config.as_ref()
    }

    pub fn ports(&self) -> &BTreeMap<String, u16> {
        &self.ports
    }

    pub fn probes(&self) -> &[Box<dyn Probe>] {
        &self.probes
    }

    /// Arguments the process is started with once the artifact exists
    pub fn launch_args(&self, config_path: Option<&Path>) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(path) = config_path {
            if let Some(ref flag) = self.config_flag {
                args.push(flag.clone());
            }
            args.push(path.to_string_lossy().into_owned());
        }
        args
    }
}

impl fmt::Debug for ServiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let probes: Vec<String> = self.probes.iter().map(|p| p.kind().to_string()).collect();
        f.debug_struct("ServiceSpec")
            .field("label", &self.label)
            .field("executable", &self.executable)
            .field("args", &self.args)
            .field("config", &self.config.is_some())
            .field("ports", &self.ports)
            .field("probes", &probes)
            .finish()
    }
}

/// Builder for [`ServiceSpec`]
pub struct ServiceSpecBuilder {
    name: String,
    color: LabelColor,
    executable: Option<PathBuf>,
    args: Vec<String>,
    config: Option<Result<serde_json::Value, String>>,
    config_flag: Option<String>,
    env: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
    ports: BTreeMap<String, u16>,
    probes: Vec<Box<dyn Probe>>,
    cleanup_paths: Vec<PathBuf>,
}

impl ServiceSpecBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: LabelColor::default(),
            executable: None,
            args: Vec::new(),
            config: None,
            config_flag: Some(DEFAULT_CONFIG_FLAG.to_string()),
            env: Vec::new(),
            current_dir: None,
            ports: BTreeMap::new(),
            probes: Vec::new(),
            cleanup_paths: Vec::new(),
        }
    }

    pub fn color(mut self, color: LabelColor) -> Self {
        self.color = color;
        self
    }

    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Serialize `config` as the payload written to the config artifact
    pub fn config<T: Serialize>(mut self, config: &T) -> Self {
        self.config = Some(serde_json::to_value(config).map_err(|e| e.to_string()));
        self
    }

    pub fn config_value(mut self, config: serde_json::Value) -> Self {
        self.config = Some(Ok(config));
        self
    }

    /// Flag preceding the artifact path (default `--config`)
    pub fn config_flag(mut self, flag: impl Into<String>) -> Self {
        self.config_flag = Some(flag.into());
        self
    }

    /// Pass the artifact path as a bare trailing argument
    pub fn config_path_positional(mut self) -> Self {
        self.config_flag = None;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Record a port the service listens on under a role name
    pub fn port(mut self, name: impl Into<String>, port: u16) -> Self {
        self.ports.insert(name.into(), port);
        self
    }

    /// Append a readiness probe; probes run in the order they are added
    pub fn probe<P: Probe + 'static>(mut self, probe: P) -> Self {
        self.probes.push(Box::new(probe));
        self
    }

    pub fn boxed_probe(mut self, probe: Box<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    /// A file or directory the service owns that is removed on release
    pub fn cleanup_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cleanup_paths.push(path.into());
        self
    }

    pub fn build(self) -> CoordinatorResult<ServiceSpec> {
        let label = ServiceLabel::new(self.name, self.color)?;
        let config = match self.config {
            Some(Ok(value)) => Some(value),
            Some(Err(message)) => {
                return Err(CoordinatorError::ConfigWriteFailure {
                    service: label.name().to_string(),
                    message,
                })
            }
            None => None,
        };

        Ok(ServiceSpec {
            label,
            executable: self.executable,
            args: self.args,
            config,
            config_flag: self.config_flag,
            env: self.env,
            current_dir: self.current_dir,
            ports: self.ports,
            probes: self.probes,
            cleanup_paths: self.cleanup_paths,
        })
    }
}

/// Output forwarding and stop behavior applied to launched services
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub output: OutputMode,
    pub release: ReleasePolicy,
}

/// Start the process described by `spec`
///
/// Must be called from within a tokio runtime: output readers are spawned
/// as tasks. If the process cannot be started the config artifact is
/// removed before the error is returned.
pub fn launch(
    spec: &ServiceSpec,
    locator: &dyn ExecutableLocator,
    codec: &dyn ConfigCodec,
    options: LaunchOptions,
) -> CoordinatorResult<RunningService> {
    let label = spec.label().clone();
    let executable = match spec.executable() {
        Some(path) => path.to_path_buf(),
        None => locator.locate(label.name())?,
    };

    let mut artifact = match spec.config() {
        Some(config) => Some(codec.write(&label, config)?),
        None => None,
    };
    let config_path = artifact.as_ref().map(|a| a.path().to_path_buf());
    let args = spec.launch_args(config_path.as_deref());

    let mut cmd = Command::new(&executable);
    cmd.args(&args)
        .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(ref dir) = spec.current_dir {
        cmd.current_dir(dir);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            if let Some(ref mut artifact) = artifact {
                if let Err(cleanup) = artifact.delete() {
                    service_warn!(label, "⚠️ Failed to remove config artifact after launch failure: {}", cleanup);
                }
            }
            return Err(CoordinatorError::LaunchFailure {
                service: label.name().to_string(),
                executable: executable.display().to_string(),
                message: e.to_string(),
            });
        }
    };

    let output = OutputBuffer::new();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_output_reader(stdout, OutputStream::Stdout, label.clone(), output.clone(), options.output));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_output_reader(stderr, OutputStream::Stderr, label.clone(), output.clone(), options.output));
    }

    let pid = child.id();
    service_debug!(label, "Started {} {:?} (PID: {:?})", executable.display(), args, pid);

    Ok(RunningService {
        label,
        pid,
        child: Some(child),
        output,
        artifact,
        config_path,
        ports: spec.ports.clone(),
        readers,
        cleanup_paths: spec.cleanup_paths.clone(),
        release_policy: options.release,
        released: false,
    })
}

/// A launched service and everything it owns
pub struct RunningService {
    label: ServiceLabel,
    pid: Option<u32>,
    child: Option<Child>,
    output: OutputBuffer,
    artifact: Option<ConfigArtifact>,
    config_path: Option<PathBuf>,
    ports: BTreeMap<String, u16>,
    readers: Vec<JoinHandle<()>>,
    cleanup_paths: Vec<PathBuf>,
    release_policy: ReleasePolicy,
    released: bool,
}

impl RunningService {
    pub fn name(&self) -> &str {
        self.label.name()
    }

    pub fn label(&self) -> &ServiceLabel {
        &self.label
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Combined stdout/stderr captured since launch
    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    /// Where the config artifact was written; still reported after release
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn port(&self, name: &str) -> Option<u16> {
        self.ports.get(name).copied()
    }

    pub fn ports(&self) -> &BTreeMap<String, u16> {
        &self.ports
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Exit status if the process has already stopped
    pub fn try_exit_status(&mut self) -> Option<ExitStatus> {
        self.child.as_mut().and_then(|child| child.try_wait().ok().flatten())
    }

    /// Resolves when the process exits; never resolves once released
    pub async fn wait_for_exit(&mut self) -> io::Result<ExitStatus> {
        match self.child.as_mut() {
            Some(child) => child.wait().await,
            None => std::future::pending().await,
        }
    }

    /// Stop the process and delete everything the service owns on disk
    ///
    /// Only the first call does anything. Every cleanup step runs even if an
    /// earlier one failed; failures are logged and reported together as one
    /// `ReleaseFailure`.
    pub async fn release(&mut self) -> CoordinatorResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let mut failures = Vec::new();

        if let Some(mut child) = self.child.take() {
            if let Err(e) = terminate(&mut child, self.release_policy).await {
                failures.push(e);
            }
        }

        for mut reader in self.readers.drain(..) {
            if timeout(READER_DRAIN_TIMEOUT, &mut reader).await.is_err() {
                reader.abort();
            }
        }

        if let Some(mut artifact) = self.artifact.take() {
            if let Err(e) = artifact.delete() {
                failures.push(format!("remove {}: {}", artifact.path().display(), e));
            }
        }

        for path in self.cleanup_paths.drain(..) {
            if let Err(e) = remove_path(&path) {
                failures.push(format!("remove {}: {}", path.display(), e));
            }
        }

        if failures.is_empty() {
            service_debug!(self.label, "Released");
            Ok(())
        } else {
            let message = failures.join("; ");
            service_warn!(self.label, "⚠️ Release incomplete: {}", message);
            Err(CoordinatorError::ReleaseFailure {
                service: self.label.name().to_string(),
                message,
            })
        }
    }
}

impl fmt::Debug for RunningService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunningService")
            .field("label", &self.label)
            .field("pid", &self.pid)
            .field("config_path", &self.config_path)
            .field("ports", &self.ports)
            .field("released", &self.released)
            .finish()
    }
}

impl Drop for RunningService {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        // Emergency cleanup - the handle went away without release()
        service_warn!(self.label, "🚨 Dropped without release, killing process");
        if let Some(mut child) = self.child.take() {
            let _ = child.start_kill();
        }
        for reader in self.readers.drain(..) {
            reader.abort();
        }
        // The artifact's temp path deletes itself when dropped
        for path in self.cleanup_paths.drain(..) {
            let _ = remove_path(&path);
        }
    }
}

async fn terminate(child: &mut Child, policy: ReleasePolicy) -> Result<(), String> {
    match child.try_wait() {
        Ok(Some(_)) => return Ok(()),
        Ok(None) => {}
        Err(e) => return Err(format!("check process status: {e}")),
    }

    if let ReleasePolicy::Terminate { grace } = policy {
        if send_sigterm(child) && timeout(grace, child.wait()).await.is_ok() {
            return Ok(());
        }
    }

    child.kill().await.map_err(|e| format!("kill process: {e}"))
}

#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return false;
    };
    signal::kill(Pid::from_raw(pid), Signal::SIGTERM).is_ok()
}

#[cfg(not(unix))]
fn send_sigterm(_child: &Child) -> bool {
    false
}

fn remove_path(path: &Path) -> io::Result<()> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
