//! Session plans: a JSON description of the services to coordinate
//!
//! Ports are declared as role offsets and resolved for one worker, so the
//! same plan file can run in parallel workers without collisions. Strings in
//! args, env values, config payloads and probe declarations may reference
//! the resolved ports:
//!
//! - `{port:<service>.<name>}` becomes the allocated port number
//! - `{worker}` becomes the worker index
//!
//! A config string consisting of nothing but one placeholder is replaced by
//! a JSON number, so `"OutgoingPort": "{port:aggregator.outgoing}"` is
//! written as `"OutgoingPort": 55106`.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use shared::LabelColor;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::config::{CoordinatorConfig, OutputMode, ReleasePolicy};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::ports::{PortAllocator, WorkerPorts};
use crate::probe::{CheckSpec, ProbeSpec};
use crate::service::ServiceSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPlan {
    #[serde(default)]
    pub settings: PlanSettings,
    pub services: Vec<ServicePlan>,
}

/// Coordinator settings a plan may carry; the worker index always comes
/// from the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stride: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleasePolicy>,
}

impl PlanSettings {
    /// Overlay these settings on `config`
    pub fn apply(&self, mut config: CoordinatorConfig) -> CoordinatorConfig {
        if self.base_port.is_some() || self.stride.is_some() {
            config.ports = PortAllocator::new(
                self.base_port.unwrap_or(config.ports.base_port()),
                self.stride.unwrap_or(config.ports.stride()),
            );
        }
        if let Some(ref dir) = self.artifact_dir {
            config.artifact_dir = dir.clone();
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(release) = self.release {
            config.release = release;
        }
        config
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePlan {
    pub name: String,
    /// Defaults to a rotation based on the service's position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<LabelColor>,
    /// Resolved through the executable locator when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_flag: Option<String>,
    /// Pass the config path as a bare trailing argument
    #[serde(default)]
    pub config_positional: bool,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_dir: Option<PathBuf>,
    /// Port role name to offset within the worker's block
    #[serde(default)]
    pub ports: BTreeMap<String, u16>,
    #[serde(default)]
    pub probes: Vec<ProbeSpec>,
    #[serde(default)]
    pub cleanup: Vec<PathBuf>,
}

impl SessionPlan {
    pub fn from_json(json: &str) -> CoordinatorResult<Self> {
        serde_json::from_str(json).map_err(|e| CoordinatorError::plan(format!("invalid plan: {e}")))
    }

    pub fn from_file(path: &Path) -> CoordinatorResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CoordinatorError::plan(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Allocate every declared port for one worker
    ///
    /// Offsets must be unique across the whole plan.
    pub fn resolve_ports(&self, ports: WorkerPorts) -> CoordinatorResult<PortTable> {
        let mut owners: BTreeMap<u16, String> = BTreeMap::new();
        let mut table = PortTable {
            worker_index: ports.worker_index(),
            ports: BTreeMap::new(),
        };

        for service in &self.services {
            for (role, offset) in &service.ports {
                let owner = format!("{}.{}", service.name, role);
                if let Some(previous) = owners.insert(*offset, owner.clone()) {
                    return Err(CoordinatorError::plan(format!(
                        "port offset {offset} used by both {previous} and {owner}"
                    )));
                }
                table.ports.insert(owner, ports.port(*offset)?);
            }
        }

        Ok(table)
    }

    /// Turn the plan into launchable specs with every placeholder resolved
    pub fn into_specs(self, ports: WorkerPorts) -> CoordinatorResult<Vec<ServiceSpec>> {
        let table = self.resolve_ports(ports)?;
        self.services
            .into_iter()
            .enumerate()
            .map(|(index, service)| service.into_spec(index, &table))
            .collect()
    }
}

impl ServicePlan {
    fn into_spec(self, index: usize, table: &PortTable) -> CoordinatorResult<ServiceSpec> {
        let mut builder = ServiceSpec::builder(&self.name).color(self.color.unwrap_or_else(|| LabelColor::for_index(index)));

        if let Some(executable) = self.executable {
            builder = builder.executable(executable);
        }
        for arg in &self.args {
            builder = builder.arg(table.substitute(arg)?);
        }
        if let Some(config) = self.config {
            builder = builder.config_value(table.substitute_value(config)?);
        }
        if let Some(flag) = self.config_flag {
            builder = builder.config_flag(flag);
        }
        if self.config_positional {
            builder = builder.config_path_positional();
        }
        for (key, value) in &self.env {
            builder = builder.env(key, table.substitute(value)?);
        }
        if let Some(dir) = self.current_dir {
            builder = builder.current_dir(dir);
        }
        for role in self.ports.keys() {
            let port = table.port(&self.name, role).ok_or_else(|| {
                CoordinatorError::plan(format!("port {}.{} was not allocated", self.name, role))
            })?;
            builder = builder.port(role, port);
        }
        for probe in self.probes {
            builder = builder.boxed_probe(table.substitute_probe(probe)?.into_probe()?);
        }
        for path in &self.cleanup {
            builder = builder.cleanup_path(table.substitute(&path.to_string_lossy())?);
        }

        builder.build()
    }
}

/// Ports allocated to one worker, keyed by `<service>.<role>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTable {
    worker_index: u16,
    ports: BTreeMap<String, u16>,
}

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(?:port:(?P<service>[A-Za-z0-9_-]+)\.(?P<role>[A-Za-z0-9_-]+)|(?P<worker>worker))\}")
        .expect("placeholder pattern is valid")
});

impl PortTable {
    pub fn worker_index(&self) -> u16 {
        self.worker_index
    }

    pub fn port(&self, service: &str, role: &str) -> Option<u16> {
        self.ports.get(&format!("{service}.{role}")).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.ports.iter().map(|(name, port)| (name.as_str(), *port))
    }

    fn lookup(&self, caps: &Captures<'_>) -> CoordinatorResult<u16> {
        if caps.name("worker").is_some() {
            return Ok(self.worker_index);
        }
        let service = caps.name("service").map_or("", |m| m.as_str());
        let role = caps.name("role").map_or("", |m| m.as_str());
        self.port(service, role)
            .ok_or_else(|| CoordinatorError::plan(format!("unknown port reference {{port:{service}.{role}}}")))
    }

    /// Replace every placeholder in `input`
    pub fn substitute(&self, input: &str) -> CoordinatorResult<String> {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for caps in PLACEHOLDER.captures_iter(input) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&input[last..whole.start()]);
            out.push_str(&self.lookup(&caps)?.to_string());
            last = whole.end();
        }
        out.push_str(&input[last..]);
        Ok(out)
    }

    /// Substitute inside every string of a JSON value
    pub fn substitute_value(&self, value: serde_json::Value) -> CoordinatorResult<serde_json::Value> {
        use serde_json::Value;

        Ok(match value {
            Value::String(s) => match self.whole_placeholder(&s)? {
                Some(port) => Value::from(port),
                None => Value::String(self.substitute(&s)?),
            },
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.substitute_value(item))
                    .collect::<CoordinatorResult<_>>()?,
            ),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| -> CoordinatorResult<(String, Value)> { Ok((k, self.substitute_value(v)?)) })
                    .collect::<CoordinatorResult<_>>()?,
            ),
            other => other,
        })
    }

    fn whole_placeholder(&self, s: &str) -> CoordinatorResult<Option<u16>> {
        match PLACEHOLDER.captures(s) {
            Some(caps) if caps.get(0).is_some_and(|m| m.start() == 0 && m.end() == s.len()) => {
                self.lookup(&caps).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn substitute_probe(&self, mut probe: ProbeSpec) -> CoordinatorResult<ProbeSpec> {
        match &mut probe.check {
            CheckSpec::TcpDial { address } | CheckSpec::UdpDial { address } => {
                *address = self.substitute(address)?;
            }
            CheckSpec::HttpStatus { url, body, headers, .. } => {
                *url = self.substitute(url)?;
                if let Some(body) = body {
                    *body = self.substitute(body)?;
                }
                for value in headers.values_mut() {
                    *value = self.substitute(value)?;
                }
            }
            CheckSpec::LogMatch { pattern, regex } => {
                if !*regex {
                    *pattern = self.substitute(pattern)?;
                }
            }
        }
        Ok(probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    const PLAN: &str = r#"{
        "settings": { "output": "discard" },
        "services": [
            {
                "name": "store",
                "executable": "/opt/store/bin/store",
                "args": ["--listen-client-urls", "http://localhost:{port:store.client}", "--name", "store-w{worker}"],
                "ports": { "client": 0, "peer": 1 },
                "probes": [
                    { "kind": "http-status", "url": "http://localhost:{port:store.client}/v2/keys/test",
                      "method": "PUT", "body": "value=test", "timeout_ms": 10000 }
                ]
            },
            {
                "name": "aggregator",
                "config": {
                    "OutgoingPort": "{port:aggregator.outgoing}",
                    "StoreUrls": ["http://localhost:{port:store.client}"],
                    "Index": 0
                },
                "ports": { "outgoing": 6 },
                "probes": [
                    { "kind": "log-match", "pattern": "aggregator server started" },
                    { "kind": "tcp-dial", "address": "127.0.0.1:{port:aggregator.outgoing}", "timeout_ms": 3000 }
                ]
            }
        ]
    }"#;

    fn worker(index: u16) -> WorkerPorts {
        PortAllocator::default().for_worker(index)
    }

    #[test]
    fn test_resolve_ports_per_worker() {
        let plan = SessionPlan::from_json(PLAN).unwrap();

        let table = plan.resolve_ports(worker(2)).unwrap();
        assert_eq!(table.port("store", "client"), Some(55200));
        assert_eq!(table.port("store", "peer"), Some(55201));
        assert_eq!(table.port("aggregator", "outgoing"), Some(55206));
        assert_eq!(table.port("aggregator", "client"), None);
    }

    #[test]
    fn test_duplicate_offsets_rejected() {
        let mut plan = SessionPlan::from_json(PLAN).unwrap();
        plan.services[1].ports.insert("udp".to_string(), 1);

        let err = plan.resolve_ports(worker(1)).unwrap_err();
        assert_matches!(err, CoordinatorError::PlanError { ref message } if message.contains("store.peer"));
    }

    #[test]
    fn test_substitute_strings() {
        let plan = SessionPlan::from_json(PLAN).unwrap();
        let table = plan.resolve_ports(worker(3)).unwrap();

        assert_eq!(
            table.substitute("http://localhost:{port:store.client}/w{worker}").unwrap(),
            "http://localhost:55300/w3"
        );
        assert_eq!(table.substitute("no placeholders").unwrap(), "no placeholders");
        assert_matches!(table.substitute("{port:store.nope}"), Err(CoordinatorError::PlanError { .. }));
    }

    #[test]
    fn test_substitute_config_values() {
        let plan = SessionPlan::from_json(PLAN).unwrap();
        let table = plan.resolve_ports(worker(1)).unwrap();

        let config = table
            .substitute_value(json!({
                "OutgoingPort": "{port:aggregator.outgoing}",
                "StoreUrls": ["http://localhost:{port:store.client}"],
                "Nested": {"Worker": "{worker}", "Flag": true}
            }))
            .unwrap();

        assert_eq!(
            config,
            json!({
                "OutgoingPort": 55106,
                "StoreUrls": ["http://localhost:55100"],
                "Nested": {"Worker": 1, "Flag": true}
            })
        );
    }

    #[test]
    fn test_into_specs() {
        let plan = SessionPlan::from_json(PLAN).unwrap();
        let specs = plan.into_specs(worker(1)).unwrap();

        assert_eq!(specs.len(), 2);
        let store = &specs[0];
        assert_eq!(store.name(), "store");
        assert_eq!(store.label().color(), LabelColor::for_index(0));
        assert_eq!(store.args()[1], "http://localhost:55100");
        assert_eq!(store.args()[3], "store-w1");
        assert_eq!(store.ports().get("client"), Some(&55100));
        assert_eq!(store.probes().len(), 1);

        let aggregator = &specs[1];
        assert_eq!(aggregator.config().unwrap()["OutgoingPort"], json!(55106));
        assert_eq!(aggregator.probes().len(), 2);
        assert_eq!(aggregator.probes()[1].kind(), crate::probe::ProbeKind::TcpDial);
    }

    #[test]
    fn test_settings_overlay() {
        let plan = SessionPlan::from_json(PLAN).unwrap();
        let config = plan.settings.apply(CoordinatorConfig::new(5));

        assert_eq!(config.output, OutputMode::Discard);
        assert_eq!(config.worker_index, 5);
        assert_eq!(config.ports, PortAllocator::default());
    }

    #[test]
    fn test_invalid_json_is_plan_error() {
        assert_matches!(SessionPlan::from_json("{\"services\": 3}"), Err(CoordinatorError::PlanError { .. }));
    }
}
