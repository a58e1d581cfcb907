//! Stand-in service specs built from shell scripts

use coordinator::{LogMatchProbe, ProbeTiming, ServiceSpec, ServiceSpecBuilder};
use std::path::Path;
use std::time::Duration;

pub struct TestFixtures;

impl TestFixtures {
    /// Service running `script` under `/bin/sh`; `$0` is the service name
    pub fn script(name: &str, script: &str) -> ServiceSpecBuilder {
        ServiceSpec::builder(name)
            .executable("/bin/sh")
            .args(["-c", script, name])
    }

    /// Prints `<name> ready` and stays up, with a probe waiting for that line
    pub fn ready_service(name: &str) -> ServiceSpecBuilder {
        Self::script(name, r#"echo "$0 ready"; exec sleep 30"#)
            .probe(LogMatchProbe::literal(format!("{name} ready")).with_timing(Self::quick_timing()))
    }

    /// Stays up but never prints the line its probe waits for
    pub fn silent_service(name: &str) -> ServiceSpecBuilder {
        Self::script(name, "exec sleep 30")
            .probe(LogMatchProbe::literal(format!("{name} ready")).with_timing(Self::short_timeout()))
    }

    /// Creates `marker` as soon as it starts
    pub fn marker_service(name: &str, marker: &Path) -> ServiceSpecBuilder {
        Self::script(name, r#"touch "$1"; echo "$0 ready"; exec sleep 30"#)
            .arg(marker.to_string_lossy())
            .probe(LogMatchProbe::literal(format!("{name} ready")).with_timing(Self::quick_timing()))
    }

    pub fn quick_timing() -> ProbeTiming {
        ProbeTiming::fixed(Duration::from_secs(5), Duration::from_millis(20))
    }

    pub fn short_timeout() -> ProbeTiming {
        ProbeTiming::fixed(Duration::from_millis(300), Duration::from_millis(20))
    }
}
