//! Shared helpers for csvrelay integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use csvrelay_ingest::error::{FtpConnectError, UploadError};
use csvrelay_ingest::fetch::{Fetcher, DEFAULT_FETCH_TIMEOUT};
use csvrelay_ingest::ftp::{Connector, Uploader};
use csvrelay_ingest::pipeline::{FailurePolicy, Runner, RunnerSettings};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A file as it reached the fake server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub contents: String,
}

#[derive(Debug, Default)]
struct ServerState {
    sessions: usize,
    closed: usize,
    stored: Vec<StoredFile>,
}

/// In-memory stand-in for the FTP server
#[derive(Debug, Clone, Default)]
pub struct RecordingServer {
    state: Arc<Mutex<ServerState>>,
    refuse_connections: bool,
    reject: HashSet<String>,
}

impl RecordingServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `connect` fails
    pub fn refusing() -> Self {
        Self {
            refuse_connections: true,
            ..Self::default()
        }
    }

    /// Uploads of `file_name` fail
    pub fn rejecting(mut self, file_name: &str) -> Self {
        self.reject.insert(file_name.to_string());
        self
    }

    pub fn stored(&self) -> Vec<StoredFile> {
        self.state.lock().unwrap().stored.clone()
    }

    pub fn stored_names(&self) -> Vec<String> {
        self.stored().into_iter().map(|f| f.name).collect()
    }

    pub fn sessions(&self) -> usize {
        self.state.lock().unwrap().sessions
    }

    pub fn closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl Connector for RecordingServer {
    async fn connect(&self) -> Result<Box<dyn Uploader>, FtpConnectError> {
        if self.refuse_connections {
            return Err(FtpConnectError::Connect {
                host: "ftp.test:21".to_string(),
                message: "connection refused".to_string(),
            });
        }

        self.state.lock().unwrap().sessions += 1;
        Ok(Box::new(RecordingSession {
            server: self.clone(),
        }))
    }
}

struct RecordingSession {
    server: RecordingServer,
}

#[async_trait]
impl Uploader for RecordingSession {
    async fn upload(&mut self, path: &Path) -> Result<u64, UploadError> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if self.server.reject.contains(&name) {
            return Err(UploadError::Rejected {
                file: name,
                message: "553 Could not create file".to_string(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|source| UploadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bytes = contents.len() as u64;
        self.server
            .state
            .lock()
            .unwrap()
            .stored
            .push(StoredFile { name, contents });
        Ok(bytes)
    }

    async fn close(&mut self) {
        self.server.state.lock().unwrap().closed += 1;
    }
}

/// A config file plus an empty work directory
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new(config: &Value) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("work")).unwrap();
        std::fs::write(dir.path().join("config.json"), serde_json::to_string_pretty(config).unwrap()).unwrap();
        Self { dir }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.json")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    /// Files left behind in the work directory
    pub fn leftovers(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.work_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn runner(&self, server: &RecordingServer, on_error: FailurePolicy) -> Runner<RecordingServer> {
        let settings = RunnerSettings {
            config_path: self.config_path(),
            work_dir: self.work_dir(),
            on_error,
        };
        Runner::new(settings, Fetcher::new(DEFAULT_FETCH_TIMEOUT).unwrap(), server.clone())
    }
}
