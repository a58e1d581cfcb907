//! End-to-end coordinator tests against real child processes
//!
//! Services are `/bin/sh` scripts, HTTP endpoints are wiremock servers.

use assert_matches::assert_matches;
use coordinator::traits::MockConfigCodec;
use coordinator::{
    ConfigArtifact, CoordinatorConfig, CoordinatorError, HttpStatusProbe, OutputMode, PortAllocator, ProbeKind, ProbeTiming,
    ServiceSpec, SessionPlan, StaticExecutableLocator, TcpDialProbe,
};
use reqwest::Method;
use serde_json::json;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{Event, RecordingObserver, TestFixtures, TestHelpers};

/// Three ready services come down newest first
#[tokio::test]
async fn test_teardown_releases_in_reverse_order() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let observer = RecordingObserver::new();
    let coordinator = TestHelpers::coordinator(&dir, observer.clone());
    let specs = vec![
        TestFixtures::ready_service("alpha").build().unwrap(),
        TestFixtures::ready_service("bravo").build().unwrap(),
        TestFixtures::ready_service("charlie").build().unwrap(),
    ];

    // Act
    let mut session = coordinator.start(specs).await.unwrap();
    let pids: Vec<u32> = session.services().iter().filter_map(|s| s.pid()).collect();
    let report = session.teardown().await;

    // Assert
    assert_eq!(observer.launched(), vec!["alpha", "bravo", "charlie"]);
    assert_eq!(report.released, vec!["charlie", "bravo", "alpha"]);
    assert_eq!(observer.released(), vec!["charlie", "bravo", "alpha"]);
    assert!(report.is_clean());
    assert_eq!(pids.len(), 3);
    assert!(pids.iter().all(|pid| !TestHelpers::process_alive(*pid)));
}

/// Each service is ready before the next one launches
#[tokio::test]
async fn test_startup_is_sequential() {
    let dir = TempDir::new().unwrap();
    let observer = RecordingObserver::new();
    let coordinator = TestHelpers::coordinator(&dir, observer.clone());
    let specs = vec![
        TestFixtures::ready_service("alpha").build().unwrap(),
        TestFixtures::ready_service("bravo").build().unwrap(),
    ];

    let mut session = coordinator.start(specs).await.unwrap();
    session.teardown().await;

    let startup: Vec<Event> = observer
        .events()
        .into_iter()
        .filter(|e| !matches!(e, Event::Released(_)))
        .collect();
    assert_eq!(
        startup,
        vec![
            Event::Launched("alpha".to_string()),
            Event::Ready("alpha".to_string(), ProbeKind::LogMatch),
            Event::Launched("bravo".to_string()),
            Event::Ready("bravo".to_string(), ProbeKind::LogMatch),
        ]
    );
}

/// Given [A, B, C] where B never becomes ready: B and A are released, C never starts
#[tokio::test]
async fn test_failed_probe_aborts_in_reverse_order() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("charlie-started");
    let observer = RecordingObserver::new();
    let coordinator = TestHelpers::coordinator(&dir, observer.clone());
    let specs = vec![
        TestFixtures::ready_service("alpha").build().unwrap(),
        TestFixtures::silent_service("bravo").build().unwrap(),
        TestFixtures::marker_service("charlie", &marker).build().unwrap(),
    ];

    // Act
    let err = coordinator.start(specs).await.unwrap_err();

    // Assert
    assert_matches!(
        err,
        CoordinatorError::ProbeTimeout { ref service, probe: ProbeKind::LogMatch, .. } if service == "bravo"
    );
    assert_eq!(observer.launched(), vec!["alpha", "bravo"]);
    assert_eq!(observer.failed(), vec!["bravo"]);
    assert_eq!(observer.released(), vec!["bravo", "alpha"]);
    assert!(!marker.exists());
}

/// Codec that hands bravo a directory as its config file, which cannot be removed like a file
fn codec_with_stuck_artifact(stuck: &Path) -> MockConfigCodec {
    let stuck = stuck.to_path_buf();
    let mut codec = MockConfigCodec::new();
    codec
        .expect_write()
        .withf(|label, _| label.name() == "bravo")
        .times(1)
        .returning(move |_, _| Ok(ConfigArtifact::from_path(stuck.clone())));
    codec
}

/// Bravo's release fails; charlie and alpha are still released and every process exits
#[tokio::test]
async fn test_teardown_continues_past_failed_release() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let stuck = dir.path().join("bravo-config");
    std::fs::create_dir(&stuck).unwrap();
    let observer = RecordingObserver::new();
    let coordinator = TestHelpers::coordinator_with_codec(&dir, codec_with_stuck_artifact(&stuck), observer.clone());
    let specs = vec![
        TestFixtures::ready_service("alpha").build().unwrap(),
        TestFixtures::ready_service("bravo")
            .config_value(json!({"Index": 0}))
            .build()
            .unwrap(),
        TestFixtures::ready_service("charlie").build().unwrap(),
    ];

    // Act
    let mut session = coordinator.start(specs).await.unwrap();
    let report = session.teardown().await;

    // Assert
    assert_eq!(report.released, vec!["charlie", "bravo", "alpha"]);
    assert_eq!(report.failures.len(), 1);
    assert_matches!(&report.failures[0], CoordinatorError::ReleaseFailure { service, .. } if service == "bravo");
    assert_eq!(observer.released(), vec!["charlie", "alpha"]);
    let pids = observer.pids();
    assert_eq!(pids.len(), 3);
    assert!(pids.iter().all(|pid| !TestHelpers::process_alive(*pid)));
}

/// A failed release during abort does not replace the startup error
#[tokio::test]
async fn test_abort_keeps_startup_error_when_release_fails() {
    // Arrange
    let dir = TempDir::new().unwrap();
    let stuck = dir.path().join("bravo-config");
    std::fs::create_dir(&stuck).unwrap();
    let observer = RecordingObserver::new();
    let coordinator = TestHelpers::coordinator_with_codec(&dir, codec_with_stuck_artifact(&stuck), observer.clone());
    let specs = vec![
        TestFixtures::ready_service("alpha").build().unwrap(),
        TestFixtures::ready_service("bravo")
            .config_value(json!({"Index": 0}))
            .build()
            .unwrap(),
        TestFixtures::silent_service("charlie").build().unwrap(),
    ];

    // Act
    let err = coordinator.start(specs).await.unwrap_err();

    // Assert
    assert_matches!(err, CoordinatorError::ProbeTimeout { ref service, .. } if service == "charlie");
    assert_eq!(observer.failed(), vec!["charlie"]);
    assert_eq!(observer.released(), vec!["charlie", "alpha"]);
    let pids = observer.pids();
    assert_eq!(pids.len(), 3);
    assert!(pids.iter().all(|pid| !TestHelpers::process_alive(*pid)));
}

/// A service whose executable cannot be resolved aborts the session
#[tokio::test]
async fn test_missing_executable_releases_earlier_services() {
    let dir = TempDir::new().unwrap();
    let observer = RecordingObserver::new();
    let locator = StaticExecutableLocator::new().with("alpha", "/bin/sh");
    let coordinator = TestHelpers::coordinator_with_locator(&dir, locator, observer.clone());
    let specs = vec![
        ServiceSpec::builder("alpha")
            .args(["-c", "exec sleep 30"])
            .build()
            .unwrap(),
        ServiceSpec::builder("bravo").build().unwrap(),
    ];

    let err = coordinator.start(specs).await.unwrap_err();

    assert_matches!(err, CoordinatorError::MissingExecutable { ref service, .. } if service == "bravo");
    assert_eq!(observer.launched(), vec!["alpha"]);
    assert_eq!(observer.released(), vec!["alpha"]);
}

#[tokio::test]
async fn test_teardown_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let observer = RecordingObserver::new();
    let coordinator = TestHelpers::coordinator(&dir, observer.clone());

    let mut session = coordinator
        .start(vec![TestFixtures::ready_service("alpha").build().unwrap()])
        .await
        .unwrap();

    let first = session.teardown().await;
    let second = session.teardown().await;

    assert_eq!(first.released, vec!["alpha"]);
    assert!(second.released.is_empty());
    assert!(second.is_clean());
    assert!(session.is_torn_down());
    assert_eq!(observer.released(), vec!["alpha"]);
}

/// Config artifacts exist while the service runs and are gone after teardown
#[tokio::test]
async fn test_config_artifact_removed_on_release() {
    let dir = TempDir::new().unwrap();
    let coordinator = TestHelpers::coordinator(&dir, RecordingObserver::new());
    let spec = TestFixtures::script("aggregator", r#"grep -q JobName "$2" && echo "$0 ready"; exec sleep 30"#)
        .config_value(json!({"JobName": "test-job-name", "Index": 0}))
        .probe(coordinator::LogMatchProbe::literal("aggregator ready").with_timing(TestFixtures::quick_timing()))
        .build()
        .unwrap();

    let mut session = coordinator.start(vec![spec]).await.unwrap();
    let config_path = session.service("aggregator").unwrap().config_path().unwrap().to_path_buf();
    assert!(config_path.exists());
    assert!(config_path.starts_with(dir.path()));

    session.teardown().await;

    assert!(!config_path.exists());
}

/// Nothing listens on the probed port: the probe times out and names TCP
#[tokio::test]
async fn test_tcp_probe_without_listener_times_out() {
    let dir = TempDir::new().unwrap();
    let coordinator = TestHelpers::coordinator(&dir, RecordingObserver::new());
    let port = TestHelpers::unused_port();
    let spec = TestFixtures::script("gateway", "exec sleep 30")
        .probe(
            TcpDialProbe::new(format!("127.0.0.1:{port}"))
                .with_timing(ProbeTiming::fixed(Duration::from_millis(400), Duration::from_millis(50))),
        )
        .build()
        .unwrap();

    let started = Instant::now();
    let err = coordinator.start(vec![spec]).await.unwrap_err();

    assert!(started.elapsed() >= Duration::from_millis(400));
    assert_matches!(
        err,
        CoordinatorError::ProbeTimeout { ref service, probe: ProbeKind::TcpDial, timeout, ref last_error }
            if service == "gateway" && timeout == Duration::from_millis(400) && last_error.is_some()
    );
}

#[tokio::test]
async fn test_tcp_probe_with_listener_is_ready() {
    let dir = TempDir::new().unwrap();
    let observer = RecordingObserver::new();
    let coordinator = TestHelpers::coordinator(&dir, observer.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let spec = TestFixtures::script("gateway", "exec sleep 30")
        .probe(TcpDialProbe::new(address).with_timing(ProbeTiming::dial()))
        .build()
        .unwrap();

    let mut session = coordinator.start(vec![spec]).await.unwrap();
    session.teardown().await;

    assert!(observer.events().contains(&Event::Ready("gateway".to_string(), ProbeKind::TcpDial)));
}

/// A store answering 500 while it bootstraps becomes ready once it stops failing
#[tokio::test]
async fn test_http_probe_polls_through_server_errors() {
    // Arrange
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v2/keys/test"))
        .and(body_string("value=test"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v2/keys/test"))
        .respond_with(ResponseTemplate::new(201))
        .with_priority(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator = TestHelpers::coordinator(&dir, RecordingObserver::new());
    let url = format!("{}/v2/keys/test", server.uri()).parse().unwrap();
    let spec = TestFixtures::script("store", "exec sleep 30")
        .probe(
            HttpStatusProbe::new(url)
                .with_method(Method::PUT)
                .with_body("value=test")
                .with_timing(ProbeTiming::fixed(Duration::from_secs(5), Duration::from_millis(20))),
        )
        .build()
        .unwrap();

    // Act
    let mut session = coordinator.start(vec![spec]).await.unwrap();
    session.teardown().await;

    // Assert
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_http_probe_times_out_on_persistent_500() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let coordinator = TestHelpers::coordinator(&dir, RecordingObserver::new());
    let spec = TestFixtures::script("store", "exec sleep 30")
        .probe(
            HttpStatusProbe::new(server.uri().parse().unwrap())
                .with_timing(ProbeTiming::fixed(Duration::from_millis(300), Duration::from_millis(50))),
        )
        .build()
        .unwrap();

    let err = coordinator.start(vec![spec]).await.unwrap_err();

    assert_matches!(err, CoordinatorError::ProbeTimeout { probe: ProbeKind::HttpStatus, .. });
}

/// A plan file's port placeholders reach both the process and its probes
#[tokio::test]
async fn test_plan_resolves_ports_into_args_and_probes() {
    let dir = TempDir::new().unwrap();
    let plan = SessionPlan::from_json(
        r#"{
            "services": [{
                "name": "echoer",
                "executable": "/bin/sh",
                "args": ["-c", "echo \"listening on $1\"; exec sleep 30", "echoer", "{port:echoer.main}"],
                "ports": {"main": 4},
                "probes": [{"kind": "log-match", "pattern": "listening on {port:echoer.main}", "timeout_ms": 5000}]
            }]
        }"#,
    )
    .unwrap();
    let ports = PortAllocator::default().for_worker(7);
    let specs = plan.into_specs(ports).unwrap();

    let config = CoordinatorConfig::new(7)
        .with_artifact_dir(dir.path())
        .with_output(OutputMode::Discard);
    let coordinator = coordinator::Coordinator::from_env(config);
    let mut session = coordinator.start(specs).await.unwrap();

    assert_eq!(session.port("echoer", "main"), Some(55704));
    assert!(session.service("echoer").unwrap().output().contains("listening on 55704"));

    session.teardown().await;
}
