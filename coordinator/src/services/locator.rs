//! Executable locators
//!
//! The environment-variable convention (`<NAME>_BUILD_PATH`) comes from
//! test suites that build companion binaries once and hand their paths to
//! every parallel worker through the environment.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::ExecutableLocator;

/// Resolves services through environment variables captured at construction
#[derive(Debug, Clone, Default)]
pub struct EnvExecutableLocator {
    vars: HashMap<String, OsString>,
    overrides: HashMap<String, String>,
}

impl EnvExecutableLocator {
    /// Snapshot the current process environment
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars_os().filter_map(|(key, value)| key.into_string().ok().map(|key| (key, value))))
    }

    /// Use an explicit set of variables instead of the process environment
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<OsString>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            overrides: HashMap::new(),
        }
    }

    /// Read `service`'s path from `var` instead of the conventional name
    pub fn with_var(mut self, service: impl Into<String>, var: impl Into<String>) -> Self {
        self.overrides.insert(service.into(), var.into());
        self
    }

    /// Variable consulted for `service`
    pub fn var_for(&self, service: &str) -> String {
        self.overrides
            .get(service)
            .cloned()
            .unwrap_or_else(|| default_var_name(service))
    }
}

/// `gateway` -> `GATEWAY_BUILD_PATH`, `metrics-agent` -> `METRICS_AGENT_BUILD_PATH`
pub fn default_var_name(service: &str) -> String {
    let stem: String = service
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{stem}_BUILD_PATH")
}

impl ExecutableLocator for EnvExecutableLocator {
    fn locate(&self, service: &str) -> CoordinatorResult<PathBuf> {
        let var = self.var_for(service);
        match self.vars.get(&var) {
            Some(value) if !value.is_empty() => Ok(PathBuf::from(value)),
            _ => Err(CoordinatorError::MissingExecutable {
                service: service.to_string(),
                hint: format!("set {var} to the built binary"),
            }),
        }
    }
}

/// Resolves services from an explicit name-to-path map
#[derive(Debug, Clone, Default)]
pub struct StaticExecutableLocator {
    paths: HashMap<String, PathBuf>,
}

impl StaticExecutableLocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, service: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(service.into(), path.into());
        self
    }
}

impl ExecutableLocator for StaticExecutableLocator {
    fn locate(&self, service: &str) -> CoordinatorResult<PathBuf> {
        self.paths
            .get(service)
            .cloned()
            .ok_or_else(|| CoordinatorError::MissingExecutable {
                service: service.to_string(),
                hint: "no path registered".to_string(),
            })
    }
}
