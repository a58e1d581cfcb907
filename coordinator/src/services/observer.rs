//! Default lifecycle observer that narrates the session through tracing

use shared::{service_info, service_warn};
use std::time::Duration;

use crate::error::CoordinatorError;
use crate::probe::ProbeKind;
use crate::traits::LifecycleObserver;

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl LifecycleObserver for TracingObserver {
    fn on_launched(&self, service: &str, pid: Option<u32>) {
        match pid {
            Some(pid) => {
                service_info!(service, "🚀 Launched (PID: {})", pid);
            }
            None => {
                service_info!(service, "🚀 Launched");
            }
        }
    }

    fn on_ready(&self, service: &str, probe: &ProbeKind, elapsed: Duration) {
        service_info!(service, "✅ {} probe passed after {:?}", probe, elapsed);
    }

    fn on_failed(&self, service: &str, error: &CoordinatorError) {
        service_warn!(service, "❌ Startup failed: {}", error);
    }

    fn on_released(&self, service: &str) {
        service_info!(service, "🛑 Released");
    }
}
