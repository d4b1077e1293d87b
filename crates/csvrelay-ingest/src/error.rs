//! Error types for csvrelay ingestion
//!
//! Failures fall into two scopes:
//!
//! - **Run level** ([`ConfigError`], [`FtpConnectError`]): nothing can be
//!   processed, the run ends before the first source.
//! - **Source level** ([`FetchError`], [`WriteError`], [`UploadError`]): only
//!   the current source failed. Its local artifact is still removed and the
//!   runner's [`FailurePolicy`](crate::pipeline::FailurePolicy) decides
//!   whether the remaining sources are attempted.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for a whole pipeline run
pub type Result<T> = std::result::Result<T, PipelineError>;

/// The source configuration or connection settings could not be loaded
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid source '{name}': {reason}")]
    InvalidSource { name: String, reason: String },

    #[error("Missing FTP setting: {0}. Set FTPHOST, FTPUSER and FTPPASS in the environment or a .env file.")]
    MissingEnv(#[from] csvrelay_common::EnvError),
}

/// The FTP session could not be established
#[derive(Error, Debug)]
pub enum FtpConnectError {
    #[error("Failed to connect to FTP server {host}: {message}")]
    Connect { host: String, message: String },

    #[error("TLS negotiation with {host} failed: {message}")]
    Tls { host: String, message: String },

    #[error("FTP login as '{username}' rejected: {message}")]
    Login { username: String, message: String },

    #[error("FTP connection task failed: {0}")]
    Task(String),
}

/// A dataset could not be downloaded or parsed
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported source location '{0}': only http, https, file URLs and local paths are accepted")]
    UnsupportedUrl(String),

    #[error("Cannot parse CSV from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("Unusable parser option '{option}': {reason}")]
    Options { option: String, reason: String },
}

/// The local CSV artifact could not be written
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot encode CSV into {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// A file could not be stored on the FTP server
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Cannot open {path} for upload: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Server rejected upload of {file}: {message}")]
    Rejected { file: String, message: String },

    #[error("FTP session is no longer usable")]
    SessionClosed,

    #[error("Upload task failed: {0}")]
    Task(String),
}

/// Why a single source failed
#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl SourceError {
    /// Stage name used in logs and reports
    pub fn stage(&self) -> &'static str {
        match self {
            SourceError::Fetch(_) => "fetch",
            SourceError::Write(_) => "write",
            SourceError::Upload(_) => "upload",
        }
    }
}

/// A pipeline run did not complete
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    FtpConnect(#[from] FtpConnectError),

    #[error("{} source(s) failed: {}. Uploaded before failure: {}", failed.len(), failed.join(", "), display_list(uploaded))]
    SourcesFailed {
        failed: Vec<String>,
        uploaded: Vec<String>,
    },
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

impl FetchError {
    pub fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn options(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Options {
            option: option.into(),
            reason: reason.into(),
        }
    }
}

impl ConfigError {
    pub fn invalid_source(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
