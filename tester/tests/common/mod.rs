//! Common test utilities: fake service executables and coordinators
#![allow(dead_code)]

use coordinator::{Coordinator, CoordinatorConfig, EnvExecutableLocator, JsonConfigCodec, OutputMode};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestHelpers;

impl TestHelpers {
    /// Write an executable shell script standing in for a service binary
    pub fn fake_service(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Coordinator for `worker` resolving executables from `vars` only
    pub fn coordinator(
        dir: &TempDir,
        worker: u16,
        vars: Vec<(&str, PathBuf)>,
    ) -> Coordinator<EnvExecutableLocator, JsonConfigCodec> {
        let config = CoordinatorConfig::new(worker)
            .with_artifact_dir(dir.path())
            .with_output(OutputMode::Discard);
        let codec = JsonConfigCodec::new(dir.path(), worker);
        Coordinator::new(config, EnvExecutableLocator::from_vars(vars), codec)
    }
}
