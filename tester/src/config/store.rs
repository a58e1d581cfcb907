//! Discovery store launch settings
//!
//! The store takes everything on its command line; it has no config file.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub data_dir: PathBuf,
    pub client_port: u16,
    pub peer_port: u16,
}

impl StoreSettings {
    pub fn client_url(&self) -> String {
        format!("http://localhost:{}", self.client_port)
    }

    pub fn peer_url(&self) -> String {
        format!("http://localhost:{}", self.peer_port)
    }

    /// Endpoint the readiness probe writes a test key to
    pub fn probe_url(&self) -> String {
        format!("{}/v2/keys/test", self.client_url())
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            "--data-dir".to_string(),
            self.data_dir.to_string_lossy().into_owned(),
            "--listen-client-urls".to_string(),
            self.client_url(),
            "--listen-peer-urls".to_string(),
            self.peer_url(),
            "--advertise-client-urls".to_string(),
            self.client_url(),
        ]
    }
}
