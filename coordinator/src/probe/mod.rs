//! Readiness probes
//!
//! A probe answers one question, "is this service ready yet?", in a
//! service-specific way: a successful dial, an acceptable HTTP status or a
//! line in the service's output. [`evaluate`] polls any [`Probe`] with
//! backoff until it succeeds or its deadline passes.

pub mod http;
pub mod log_match;
pub mod tcp;
pub mod udp;

pub use http::HttpStatusProbe;
pub use log_match::{LogMatchProbe, LogPattern};
pub use tcp::TcpDialProbe;
pub use udp::UdpDialProbe;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::output::OutputBuffer;
use crate::traits::Probe;

/// Kind of readiness signal a probe waits for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    TcpDial,
    UdpDial,
    HttpStatus,
    LogMatch,
    /// Probes defined outside this crate
    Custom(String),
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::TcpDial => write!(f, "tcp-dial"),
            ProbeKind::UdpDial => write!(f, "udp-dial"),
            ProbeKind::HttpStatus => write!(f, "http-status"),
            ProbeKind::LogMatch => write!(f, "log-match"),
            ProbeKind::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Deadline and poll cadence of one probe
///
/// The sleep between attempts starts at `interval` and doubles after every
/// failed attempt, never exceeding `max_interval`. Intervals below
/// [`ProbeTiming::MIN_INTERVAL`] are raised to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTiming {
    pub timeout: Duration,
    pub interval: Duration,
    pub max_interval: Duration,
}

impl ProbeTiming {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(50);
    pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_millis(500);
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: Self::DEFAULT_INTERVAL,
            max_interval: Self::DEFAULT_MAX_INTERVAL,
        }
    }

    /// Poll at a constant `interval`
    pub fn fixed(timeout: Duration, interval: Duration) -> Self {
        let interval = interval.max(Self::MIN_INTERVAL);
        Self {
            timeout,
            interval,
            max_interval: interval,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        let interval = interval.max(Self::MIN_INTERVAL);
        self.interval = interval;
        self.max_interval = self.max_interval.max(interval);
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval.max(self.interval);
        self
    }

    /// Socket dials: 3 seconds
    pub fn dial() -> Self {
        Self::new(Duration::from_secs(3))
    }

    /// HTTP endpoints that may need to bootstrap state first: 10 seconds
    pub fn http() -> Self {
        Self::new(Duration::from_secs(10))
    }

    /// Waiting on a log line: 10 seconds
    pub fn log_line() -> Self {
        Self::new(Duration::from_secs(10))
    }

    fn first_delay(&self) -> Duration {
        self.interval.max(Self::MIN_INTERVAL)
    }

    fn next_delay(&self, current: Duration) -> Duration {
        current
            .saturating_mul(2)
            .min(self.max_interval)
            .max(Self::MIN_INTERVAL)
    }
}

/// What a probe can inspect about the service it is checking
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    service: String,
    output: OutputBuffer,
}

impl ProbeTarget {
    pub fn new(service: impl Into<String>, output: OutputBuffer) -> Self {
        Self {
            service: service.into(),
            output,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// The service's combined stdout/stderr since launch
    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Ready { attempts: u32, elapsed: Duration },
    TimedOut { attempts: u32, last_error: Option<String> },
}

impl ProbeOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ProbeOutcome::Ready { .. })
    }
}

/// Poll `probe` against `target` until it succeeds or `deadline` passes
///
/// Attempt errors are swallowed and retried. No single attempt and no sleep
/// is allowed to run past the deadline, so a hung dial cannot block the
/// caller beyond the probe's timeout.
pub async fn evaluate(probe: &dyn Probe, target: &ProbeTarget, deadline: Instant) -> ProbeOutcome {
    let started = Instant::now();
    let timing = probe.timing();
    let kind = probe.kind();
    let mut delay = timing.first_delay();
    let mut attempts = 0u32;
    let mut last_error = None;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ProbeOutcome::TimedOut { attempts, last_error };
        }

        attempts += 1;
        match timeout(remaining, probe.attempt(target)).await {
            Ok(Ok(())) => {
                return ProbeOutcome::Ready {
                    attempts,
                    elapsed: started.elapsed(),
                };
            }
            Ok(Err(reason)) => {
                tracing::trace!(service = %target.service(), probe = %kind, attempt = attempts, "not ready: {}", reason);
                last_error = Some(reason);
            }
            Err(_) => {
                last_error = Some(format!("attempt {attempts} still running at deadline"));
                return ProbeOutcome::TimedOut { attempts, last_error };
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ProbeOutcome::TimedOut { attempts, last_error };
        }
        sleep(delay.min(remaining)).await;
        delay = timing.next_delay(delay);
    }
}

/// Serializable probe declaration, as found in session plan files
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSpec {
    #[serde(flatten)]
    pub check: CheckSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CheckSpec {
    TcpDial {
        address: String,
    },
    UdpDial {
        address: String,
    },
    HttpStatus {
        url: String,
        #[serde(default = "default_method")]
        method: String,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default = "default_fail_status_codes")]
        fail_status_codes: Vec<u16>,
        #[serde(default)]
        expect_status: Option<u16>,
    },
    LogMatch {
        pattern: String,
        #[serde(default)]
        regex: bool,
    },
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_fail_status_codes() -> Vec<u16> {
    vec![500]
}

impl ProbeSpec {
    pub fn new(check: CheckSpec) -> Self {
        Self {
            check,
            timeout_ms: None,
            interval_ms: None,
        }
    }

    fn timing(&self, default: ProbeTiming) -> ProbeTiming {
        let mut timing = default;
        if let Some(ms) = self.timeout_ms {
            timing.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.interval_ms {
            timing = timing.with_interval(Duration::from_millis(ms));
        }
        timing
    }

    /// Build the concrete probe this declaration describes
    pub fn into_probe(self) -> CoordinatorResult<Box<dyn Probe>> {
        let probe: Box<dyn Probe> = match &self.check {
            CheckSpec::TcpDial { address } => {
                Box::new(TcpDialProbe::new(address.clone()).with_timing(self.timing(ProbeTiming::dial())))
            }
            CheckSpec::UdpDial { address } => {
                Box::new(UdpDialProbe::new(address.clone()).with_timing(self.timing(ProbeTiming::dial())))
            }
            CheckSpec::HttpStatus {
                url,
                method,
                body,
                headers,
                fail_status_codes,
                expect_status,
            } => {
                let url = url::Url::parse(url).map_err(|e| CoordinatorError::spec(format!("invalid probe url '{url}': {e}")))?;
                let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
                    .map_err(|e| CoordinatorError::spec(format!("invalid probe method '{method}': {e}")))?;
                let fail_codes = fail_status_codes
                    .iter()
                    .map(|code| status_code(*code))
                    .collect::<CoordinatorResult<Vec<_>>>()?;

                let mut probe = HttpStatusProbe::new(url)
                    .with_method(method)
                    .with_fail_status_codes(fail_codes)
                    .with_timing(self.timing(ProbeTiming::http()));
                if let Some(body) = body {
                    probe = probe.with_body(body.clone());
                }
                for (name, value) in headers {
                    probe = probe.with_header(name.clone(), value.clone());
                }
                if let Some(code) = expect_status {
                    probe = probe.expect_status(status_code(*code)?);
                }
                Box::new(probe)
            }
            CheckSpec::LogMatch { pattern, regex } => {
                let pattern = if *regex {
                    LogPattern::regex(pattern)?
                } else {
                    LogPattern::literal(pattern.clone())
                };
                Box::new(LogMatchProbe::new(pattern).with_timing(self.timing(ProbeTiming::log_line())))
            }
        };
        Ok(probe)
    }
}

fn status_code(code: u16) -> CoordinatorResult<reqwest::StatusCode> {
    reqwest::StatusCode::from_u16(code).map_err(|e| CoordinatorError::spec(format!("invalid status code {code}: {e}")))
}
