//! Ordered startup and reverse-order teardown of dependent services
//!
//! The coordinator launches services one at a time and only moves on once
//! every probe of the current service has passed. Any failure releases what
//! was already started, newest first, before the error is returned.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;
use uuid::Uuid;

use shared::{logging, service_debug};

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::probe::{evaluate, ProbeOutcome, ProbeTarget};
use crate::service::{launch, LaunchOptions, RunningService, ServiceSpec};
use crate::services::{EnvExecutableLocator, JsonConfigCodec, TracingObserver};
use crate::traits::{ConfigCodec, ExecutableLocator, LifecycleObserver};

/// Starts sessions of services with injected lookup and config writing
pub struct Coordinator<L, C>
where
    L: ExecutableLocator,
    C: ConfigCodec,
{
    config: CoordinatorConfig,

    /// Injected services
    locator: L,
    codec: C,
    observer: Arc<dyn LifecycleObserver>,
}

impl Coordinator<EnvExecutableLocator, JsonConfigCodec> {
    /// Coordinator resolving executables from `<NAME>_BUILD_PATH` variables
    /// and writing JSON configs into the configured artifact directory
    pub fn from_env(config: CoordinatorConfig) -> Self {
        let codec = JsonConfigCodec::new(&config.artifact_dir, config.worker_index);
        Self::new(config, EnvExecutableLocator::from_env(), codec)
    }
}

impl<L, C> Coordinator<L, C>
where
    L: ExecutableLocator,
    C: ConfigCodec,
{
    pub fn new(config: CoordinatorConfig, locator: L, codec: C) -> Self {
        Self {
            config,
            locator,
            codec,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the default tracing observer (fluent API)
    pub fn with_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Port for `role_offset` in this coordinator's worker block
    pub fn port(&self, role_offset: u16) -> CoordinatorResult<u16> {
        self.config.ports.allocate(self.config.worker_index, role_offset)
    }

    /// Launch and probe `specs` in order
    ///
    /// Returns only when every service is ready. On the first failure every
    /// launched service, the failing one included, is released in reverse
    /// order and the failure is returned; no partial session escapes.
    pub async fn start(&self, specs: Vec<ServiceSpec>) -> CoordinatorResult<Session> {
        validate_names(&specs)?;

        let options = LaunchOptions {
            output: self.config.output,
            release: self.config.release,
        };
        let mut launched: Vec<RunningService> = Vec::with_capacity(specs.len());

        for spec in &specs {
            let mut service = match launch(spec, &self.locator, &self.codec, options) {
                Ok(service) => service,
                Err(e) => return Err(self.abort(spec.name(), launched, e).await),
            };
            self.observer.on_launched(service.name(), service.pid());

            let probed = self.await_ready(spec, &mut service).await;
            launched.push(service);
            if let Err(e) = probed {
                return Err(self.abort(spec.name(), launched, e).await);
            }
        }

        let session = Session::new(launched, Arc::clone(&self.observer));
        logging::log_success(
            "coordinator",
            &format!("Session {} ready with {} services", session.id(), session.len()),
        );
        Ok(session)
    }

    /// Run every probe of `spec` in declaration order against `service`
    async fn await_ready(&self, spec: &ServiceSpec, service: &mut RunningService) -> CoordinatorResult<()> {
        let target = ProbeTarget::new(service.name(), service.output().clone());

        for probe in spec.probes() {
            let kind = probe.kind();
            let timing = probe.timing();
            let deadline = Instant::now() + timing.timeout;
            service_debug!(service.label(), "Waiting up to {:?} for {} probe", timing.timeout, kind);

            let outcome = tokio::select! {
                biased;
                outcome = evaluate(&**probe, &target, deadline) => outcome,
                status = service.wait_for_exit() => {
                    let status = match status {
                        Ok(status) => status.to_string(),
                        Err(e) => format!("unknown ({e})"),
                    };
                    return Err(CoordinatorError::ServiceExited {
                        service: service.name().to_string(),
                        probe: kind,
                        status,
                    });
                }
            };

            match outcome {
                ProbeOutcome::Ready { elapsed, .. } => self.observer.on_ready(service.name(), &kind, elapsed),
                ProbeOutcome::TimedOut { last_error, .. } => {
                    return Err(CoordinatorError::ProbeTimeout {
                        service: service.name().to_string(),
                        probe: kind,
                        timeout: timing.timeout,
                        last_error,
                    });
                }
            }
        }

        Ok(())
    }

    /// Release `launched` newest first and hand back the startup error
    async fn abort(&self, service: &str, mut launched: Vec<RunningService>, error: CoordinatorError) -> CoordinatorError {
        self.observer.on_failed(service, &error);

        while let Some(mut running) = launched.pop() {
            match running.release().await {
                Ok(()) => self.observer.on_released(running.name()),
                Err(release_error) => logging::log_error("coordinator", "Release during abort", &release_error),
            }
        }

        error
    }
}

fn validate_names(specs: &[ServiceSpec]) -> CoordinatorResult<()> {
    let mut seen = HashSet::with_capacity(specs.len());
    for spec in specs {
        if !seen.insert(spec.name()) {
            return Err(CoordinatorError::spec(format!("duplicate service name '{}'", spec.name())));
        }
    }
    Ok(())
}

/// What a teardown did
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Services released by this call, in release order
    pub released: Vec<String>,
    pub failures: Vec<CoordinatorError>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A set of ready services, kept in startup order
pub struct Session {
    id: Uuid,
    services: Vec<RunningService>,
    observer: Arc<dyn LifecycleObserver>,
    torn_down: bool,
}

impl Session {
    fn new(services: Vec<RunningService>, observer: Arc<dyn LifecycleObserver>) -> Self {
        Self {
            id: Uuid::new_v4(),
            services,
            observer,
            torn_down: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Services in startup order
    pub fn services(&self) -> &[RunningService] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&RunningService> {
        self.services.iter().find(|s| s.name() == name)
    }

    /// Named port of a service in this session
    pub fn port(&self, service: &str, name: &str) -> Option<u16> {
        self.service(service).and_then(|s| s.port(name))
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Release every service in reverse startup order
    ///
    /// A failed release is recorded and teardown carries on with the next
    /// service. Calling this again returns an empty report.
    pub async fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        if self.torn_down {
            return report;
        }
        self.torn_down = true;

        for service in self.services.iter_mut().rev() {
            if service.is_released() {
                continue;
            }
            match service.release().await {
                Ok(()) => self.observer.on_released(service.name()),
                Err(e) => {
                    logging::log_error("coordinator", "Release during teardown", &e);
                    report.failures.push(e);
                }
            }
            report.released.push(service.name().to_string());
        }

        logging::log_shutdown("coordinator", &format!("session {} released", self.id));
        report
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("services", &self.services)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Newest first, same as teardown
        while let Some(service) = self.services.pop() {
            drop(service);
        }
    }
}
