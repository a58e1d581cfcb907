//! Shared logging utilities for consistent tracing across the coordinator
//! library, its binary and the stack harness

use chrono::{DateTime, Utc};
use tracing::{error, info};

/// Binary that is initializing tracing, used to scope the default filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Coordinator,
    Tester,
}

/// Build the filter directive string for a component at the given level
pub fn filter_directives(component: Component, log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("info");

    match component {
        Component::Coordinator => {
            format!("coordinator={base_level},shared={base_level},reqwest=warn,hyper=warn")
        }
        Component::Tester => {
            format!("tester={base_level},coordinator={base_level},shared={base_level},reqwest=warn,hyper=warn")
        }
    }
}

/// Initialize a stdout tracing subscriber for a component
pub fn init_tracing_with_level(component: Component, log_level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let directives = filter_directives(component, log_level);

    fmt()
        .with_env_filter(EnvFilter::new(&directives))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for service-aware info logging
#[macro_export]
macro_rules! service_info {
    ($service:expr, $($arg:tt)*) => {
        tracing::info!(
            service = %$service,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for service-aware warning logging
#[macro_export]
macro_rules! service_warn {
    ($service:expr, $($arg:tt)*) => {
        tracing::warn!(
            service = %$service,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for service-aware error logging
#[macro_export]
macro_rules! service_error {
    ($service:expr, $($arg:tt)*) => {
        tracing::error!(
            service = %$service,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for service-aware debug logging
#[macro_export]
macro_rules! service_debug {
    ($service:expr, $($arg:tt)*) => {
        tracing::debug!(
            service = %$service,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(component: &str, details: &str) {
    info!(
        component = component,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(component: &str, reason: &str) {
    info!(
        component = component,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(component: &str, context: &str, error: &dyn std::fmt::Display) {
    error!(
        component = component,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(component: &str, message: &str) {
    info!(
        component = component,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_default_level() {
        let directives = filter_directives(Component::Coordinator, None);
        assert!(directives.starts_with("coordinator=info"));
        assert!(directives.contains("reqwest=warn"));
    }

    #[test]
    fn test_filter_directives_tester_includes_coordinator() {
        let directives = filter_directives(Component::Tester, Some("debug"));
        assert!(directives.contains("tester=debug"));
        assert!(directives.contains("coordinator=debug"));
    }

    #[test]
    fn test_timestamp_format() {
        let ts = format_timestamp();
        // HH:MM:SS.mmm
        assert_eq!(ts.len(), 12);
        assert_eq!(&ts[2..3], ":");
    }
}
