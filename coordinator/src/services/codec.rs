//! Config artifacts written to disk for services to read at startup

use shared::ServiceLabel;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::traits::ConfigCodec;

#[derive(Debug)]
enum ArtifactFile {
    /// Removed automatically if the artifact is dropped without `delete`
    Temp(TempPath),
    Plain(PathBuf),
}

/// A config file on disk owned by one running service
#[derive(Debug)]
pub struct ConfigArtifact {
    path: PathBuf,
    file: Option<ArtifactFile>,
}

impl ConfigArtifact {
    fn temp(temp: TempPath) -> Self {
        Self {
            path: temp.to_path_buf(),
            file: Some(ArtifactFile::Temp(temp)),
        }
    }

    /// Wrap a file written by some other means; `delete` removes it
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            file: Some(ArtifactFile::Plain(path.clone())),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_deleted(&self) -> bool {
        self.file.is_none()
    }

    /// Remove the file. Later calls do nothing.
    pub fn delete(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(ArtifactFile::Temp(temp)) => temp.close(),
            Some(ArtifactFile::Plain(path)) => match fs::remove_file(&path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            },
            None => Ok(()),
        }
    }
}

/// Writes configs as pretty-printed JSON temp files
///
/// File names carry the service name and worker index, e.g.
/// `aggregator-config-w3-Ab12Cd.json`, so parallel workers never share one.
#[derive(Debug, Clone)]
pub struct JsonConfigCodec {
    dir: PathBuf,
    worker_index: u16,
}

impl JsonConfigCodec {
    pub fn new(dir: impl Into<PathBuf>, worker_index: u16) -> Self {
        Self {
            dir: dir.into(),
            worker_index,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_file(&self, label: &ServiceLabel, config: &serde_json::Value) -> io::Result<TempPath> {
        fs::create_dir_all(&self.dir)?;

        let prefix = format!("{}-config-w{}-", label.name(), self.worker_index);
        let mut file = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".json")
            .tempfile_in(&self.dir)?;

        serde_json::to_writer_pretty(&mut file, config)?;
        file.write_all(b"\n")?;
        file.flush()?;

        Ok(file.into_temp_path())
    }
}

impl ConfigCodec for JsonConfigCodec {
    fn write(&self, label: &ServiceLabel, config: &serde_json::Value) -> CoordinatorResult<ConfigArtifact> {
        self.write_file(label, config)
            .map(ConfigArtifact::temp)
            .map_err(|e| CoordinatorError::ConfigWriteFailure {
                service: label.name().to_string(),
                message: format!("{} in {}", e, self.dir.display()),
            })
    }
}
