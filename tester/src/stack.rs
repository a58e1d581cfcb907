//! Stack assembly: ports, service specs and the running stack
//!
//! Role offsets inside a worker's port block:
//!
//! | offset | role                 |
//! |--------|----------------------|
//! | 6      | store client         |
//! | 7      | store peer           |
//! | 8      | aggregator UDP in    |
//! | 9      | aggregator TCP in    |
//! | 10     | aggregator TLS in    |
//! | 11     | aggregator outgoing  |
//! | 12     | agent UDP in         |
//! | 13     | gateway outgoing     |

use coordinator::{
    ConfigCodec, Coordinator, ExecutableLocator, HttpStatusProbe, LogMatchProbe, ProbeTiming, ServiceSpec, Session,
    TcpDialProbe, TeardownReport, UdpDialProbe, WorkerPorts,
};
use reqwest::Method;
use shared::LabelColor;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tempfile::TempDir;
use url::Url;

use crate::config::{
    AgentConfig, AggregatorConfig, AggregatorPorts, GatewayConfig, Protocol, StackIdentity, StoreSettings, TlsFixtures,
};
use crate::error::{StackError, StackResult};

pub const STORE_CLIENT_OFFSET: u16 = 6;
pub const STORE_PEER_OFFSET: u16 = 7;
pub const AGGREGATOR_UDP_OFFSET: u16 = 8;
pub const AGGREGATOR_TCP_OFFSET: u16 = 9;
pub const AGGREGATOR_TLS_OFFSET: u16 = 10;
pub const AGGREGATOR_OUTGOING_OFFSET: u16 = 11;
pub const AGENT_OFFSET: u16 = 12;
pub const GATEWAY_OFFSET: u16 = 13;

/// Line the aggregator prints once its listeners are set up
pub const AGGREGATOR_STARTED_LINE: &str = "aggregator server started";

/// Line the agent prints once it has picked up aggregators from the store
pub const AGENT_WRITER_LINE: &str = " from last etcd event, updating writer...";

/// Services of the stack, in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StackService {
    Store,
    Aggregator,
    Agent,
    Gateway,
}

impl StackService {
    pub const ALL: [StackService; 4] = [
        StackService::Store,
        StackService::Aggregator,
        StackService::Agent,
        StackService::Gateway,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StackService::Store => "store",
            StackService::Aggregator => "aggregator",
            StackService::Agent => "agent",
            StackService::Gateway => "gateway",
        }
    }

    pub fn color(self) -> LabelColor {
        match self {
            StackService::Store => LabelColor::Yellow,
            StackService::Aggregator => LabelColor::Blue,
            StackService::Agent => LabelColor::Magenta,
            StackService::Gateway => LabelColor::Cyan,
        }
    }

    /// Environment variable holding the service's built executable
    pub fn build_path_var(self) -> &'static str {
        match self {
            StackService::Store => "STORE_BUILD_PATH",
            StackService::Aggregator => "AGGREGATOR_BUILD_PATH",
            StackService::Agent => "AGENT_BUILD_PATH",
            StackService::Gateway => "GATEWAY_BUILD_PATH",
        }
    }
}

impl fmt::Display for StackService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StackService {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StackService::ALL
            .into_iter()
            .find(|service| service.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StackError::UnknownService { input: s.to_string() })
    }
}

/// Every port the stack uses for one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackPorts {
    pub store_client: u16,
    pub store_peer: u16,
    pub aggregator: AggregatorPorts,
    pub agent: u16,
    pub gateway: u16,
}

impl StackPorts {
    pub fn for_worker(ports: WorkerPorts) -> StackResult<Self> {
        Ok(Self {
            store_client: ports.port(STORE_CLIENT_OFFSET)?,
            store_peer: ports.port(STORE_PEER_OFFSET)?,
            aggregator: AggregatorPorts {
                udp: ports.port(AGGREGATOR_UDP_OFFSET)?,
                tcp: ports.port(AGGREGATOR_TCP_OFFSET)?,
                tls: ports.port(AGGREGATOR_TLS_OFFSET)?,
                outgoing: ports.port(AGGREGATOR_OUTGOING_OFFSET)?,
            },
            agent: ports.port(AGENT_OFFSET)?,
            gateway: ports.port(GATEWAY_OFFSET)?,
        })
    }

    pub fn store_url(&self) -> String {
        format!("http://localhost:{}", self.store_client)
    }
}

/// What to bring up and how
#[derive(Debug, Clone)]
pub struct StackOptions {
    pub services: Vec<StackService>,
    pub protocol: Protocol,
    pub identity: StackIdentity,
    pub fixtures: TlsFixtures,
    /// Where the store's data directory is created
    pub data_root: PathBuf,
}

impl Default for StackOptions {
    fn default() -> Self {
        Self {
            services: StackService::ALL.to_vec(),
            protocol: Protocol::default(),
            identity: StackIdentity::default(),
            fixtures: TlsFixtures::default(),
            data_root: std::env::temp_dir(),
        }
    }
}

/// Specs for the requested services plus the store's data directory
#[derive(Debug)]
pub struct StackSpecs {
    pub specs: Vec<ServiceSpec>,
    /// Removed when dropped, in case the store never got to release it
    pub data_dir: Option<TempDir>,
}

/// Build launchable specs for `options.services` in dependency order
pub fn build_specs(options: &StackOptions, ports: &StackPorts) -> StackResult<StackSpecs> {
    let mut services = options.services.clone();
    services.sort();
    services.dedup();

    let store_url = ports.store_url();
    let mut specs = Vec::with_capacity(services.len());
    let mut data_dir = None;

    for service in services {
        let builder = ServiceSpec::builder(service.name()).color(service.color());
        let spec = match service {
            StackService::Store => {
                std::fs::create_dir_all(&options.data_root)?;
                let dir = tempfile::Builder::new().prefix("store-data-").tempdir_in(&options.data_root)?;
                let settings = StoreSettings {
                    data_dir: dir.path().to_path_buf(),
                    client_port: ports.store_client,
                    peer_port: ports.store_peer,
                };
                data_dir = Some(dir);

                builder
                    .args(settings.args())
                    .port("client", settings.client_port)
                    .port("peer", settings.peer_port)
                    .cleanup_path(&settings.data_dir)
                    .probe(
                        HttpStatusProbe::new(Url::parse(&settings.probe_url())?)
                            .with_method(Method::PUT)
                            .with_body("value=test")
                            .with_timing(ProbeTiming::http()),
                    )
            }
            StackService::Aggregator => {
                let config = AggregatorConfig::new(ports.aggregator, &store_url, &options.identity, &options.fixtures);
                builder
                    .config(&config)
                    .port("udp", ports.aggregator.udp)
                    .port("tcp", ports.aggregator.tcp)
                    .port("tls", ports.aggregator.tls)
                    .port("outgoing", ports.aggregator.outgoing)
                    .probe(LogMatchProbe::literal(AGGREGATOR_STARTED_LINE).with_timing(ProbeTiming::log_line()))
                    .probe(TcpDialProbe::new(local(ports.aggregator.outgoing)).with_timing(ProbeTiming::dial()))
            }
            StackService::Agent => {
                let config = AgentConfig::new(
                    ports.agent,
                    &store_url,
                    options.protocol,
                    &options.identity,
                    &options.fixtures,
                );
                builder
                    .arg("--debug")
                    .config(&config)
                    .port("udp", ports.agent)
                    .probe(LogMatchProbe::literal(AGENT_WRITER_LINE).with_timing(ProbeTiming::log_line()))
                    .probe(UdpDialProbe::new(local(ports.agent)).with_timing(ProbeTiming::dial()))
            }
            StackService::Gateway => {
                let config = GatewayConfig::new(
                    ports.gateway,
                    ports.aggregator.outgoing,
                    ports.agent,
                    &store_url,
                    &options.identity,
                );
                builder
                    .args(["--debug", "--disableAccessControl"])
                    .config(&config)
                    .port("outgoing", ports.gateway)
                    .probe(TcpDialProbe::new(local(ports.gateway)).with_timing(ProbeTiming::dial()))
            }
        };
        specs.push(spec.build()?);
    }

    Ok(StackSpecs { specs, data_dir })
}

fn local(port: u16) -> String {
    format!("127.0.0.1:{port}")
}

/// A running stack for one worker
#[derive(Debug)]
pub struct Stack {
    session: Session,
    ports: StackPorts,
    _data_dir: Option<TempDir>,
}

impl Stack {
    /// Bring up `options.services` on the coordinator's worker block
    pub async fn start<L, C>(coordinator: &Coordinator<L, C>, options: &StackOptions) -> StackResult<Self>
    where
        L: ExecutableLocator,
        C: ConfigCodec,
    {
        let config = coordinator.config();
        let ports = StackPorts::for_worker(config.ports.for_worker(config.worker_index))?;
        let StackSpecs { specs, data_dir } = build_specs(options, &ports)?;

        tracing::info!(
            worker = config.worker_index,
            protocol = %options.protocol,
            "🧪 Starting stack: {}",
            specs.iter().map(|s| s.name()).collect::<Vec<_>>().join(" -> ")
        );
        let session = coordinator.start(specs).await?;

        Ok(Self {
            session,
            ports,
            _data_dir: data_dir,
        })
    }

    pub fn ports(&self) -> &StackPorts {
        &self.ports
    }

    pub fn store_url(&self) -> String {
        self.ports.store_url()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn teardown(&mut self) -> TeardownReport {
        self.session.teardown().await
    }
}
