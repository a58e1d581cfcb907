//! Captured child output
//!
//! Each running service gets one [`OutputBuffer`] that both of its pipes
//! append whole lines to. The buffer only grows, so log probes can always
//! scan from the very first byte the service wrote.

use regex::Regex;
use shared::{OutputStream, ServiceLabel};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;

use crate::config::OutputMode;

/// Append-only byte buffer shared between output readers and probes
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // A reader panicking mid-append leaves whole lines behind, so the data is still usable
        self.bytes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one line, adding the newline the line reader stripped
    pub fn append_line(&self, line: &str) {
        let mut bytes = self.lock();
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Everything captured so far, lossily decoded
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Whether `needle` appears anywhere since the start of the stream
    pub fn contains(&self, needle: &str) -> bool {
        let needle = needle.as_bytes();
        if needle.is_empty() {
            return true;
        }
        let bytes = self.lock();
        bytes.windows(needle.len()).any(|window| window == needle)
    }

    pub fn is_match(&self, pattern: &Regex) -> bool {
        pattern.is_match(&self.contents())
    }
}

/// Spawn a task that copies one child pipe into `buffer` line by line and
/// forwards every line according to `mode`. The task ends when the pipe
/// closes, which happens once the child exits.
pub fn spawn_output_reader<R>(
    reader: R,
    stream: OutputStream,
    label: ServiceLabel,
    buffer: OutputBuffer,
    mode: OutputMode,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    buffer.append_line(&line);
                    forward_line(&label, stream, &line, mode);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(service = %label, stream = %stream, "stopped reading output: {}", e);
                    break;
                }
            }
        }
    })
}

fn forward_line(label: &ServiceLabel, stream: OutputStream, line: &str, mode: OutputMode) {
    match mode {
        OutputMode::Tracing => {
            tracing::info!(target: "coordinator::output", service = %label, stream = %stream, "{}", line);
        }
        OutputMode::Prefixed => {
            let mut stderr = std::io::stderr().lock();
            // Nowhere left to report a failed write to stderr
            let _ = writeln!(stderr, "{}{}", label.prefix(stream), line);
        }
        OutputMode::Discard => {}
    }
}
