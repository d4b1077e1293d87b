//! FTP-over-TLS upload
//!
//! One explicit-TLS session (`AUTH TLS`, then `PBSZ 0` / `PROT P` so the data
//! channel is encrypted too) is opened per pipeline run and reused for every
//! source. `suppaftp` is a blocking client, so every call runs on tokio's
//! blocking pool.
//!
//! The runner only sees the [`Connector`] and [`Uploader`] traits, which keeps
//! the FTP server out of pipeline tests.

use crate::error::{ConfigError, FtpConnectError, UploadError};
use async_trait::async_trait;
use csvrelay_common::env;
use rustls::ClientConfig;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{Mode, RustlsConnector, RustlsFtpStream};
use tracing::{debug, info, warn};

pub const DEFAULT_FTP_PORT: u16 = 21;

/// Control-connection timeout in seconds
pub const DEFAULT_FTP_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the destination server
#[derive(Clone)]
pub struct FtpConfig {
    pub host: String,

    pub port: u16,

    pub username: String,

    pub password: String,

    /// Connect and read timeout on the control connection
    pub timeout: Duration,
}

impl FtpConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_FTP_PORT,
            username: username.into(),
            password: password.into(),
            timeout: Duration::from_secs(DEFAULT_FTP_TIMEOUT_SECS),
        }
    }

    /// Read `FTPHOST`, `FTPUSER`, `FTPPASS` and optionally `FTPPORT` / `FTPTIMEOUT`.
    ///
    /// Only the binary calls this; everything else takes an `FtpConfig`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(
            env::required("FTPHOST")?,
            env::required("FTPUSER")?,
            env::required("FTPPASS")?,
        );
        config.port = env::parse_or("FTPPORT", DEFAULT_FTP_PORT)?;
        config.timeout = Duration::from_secs(env::parse_or("FTPTIMEOUT", DEFAULT_FTP_TIMEOUT_SECS)?);
        Ok(config)
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn socket_addr(&self) -> Result<SocketAddr, FtpConnectError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| self.connect_error(e))?
            .next()
            .ok_or_else(|| self.connect_error("host did not resolve to any address"))
    }

    fn connect_error(&self, message: impl ToString) -> FtpConnectError {
        FtpConnectError::Connect {
            host: format!("{}:{}", self.host, self.port),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Debug for FtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// An open session that can store files on the server
#[async_trait]
pub trait Uploader: Send {
    /// Store the file under its base name. Returns the number of bytes sent.
    async fn upload(&mut self, path: &Path) -> Result<u64, UploadError>;

    /// End the session. Failures are logged, not returned.
    async fn close(&mut self);
}

/// Opens upload sessions
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Uploader>, FtpConnectError>;
}

/// Opens FTP-over-TLS sessions with `suppaftp` and `rustls`
#[derive(Debug, Clone)]
pub struct FtpsConnector {
    config: FtpConfig,
}

impl FtpsConnector {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for FtpsConnector {
    async fn connect(&self) -> Result<Box<dyn Uploader>, FtpConnectError> {
        let config = self.config.clone();
        let stream = tokio::task::spawn_blocking(move || open_session(&config))
            .await
            .map_err(|e| FtpConnectError::Task(e.to_string()))??;

        info!(host = %self.config.host, "Connected to FTP");
        Ok(Box::new(FtpsSession {
            stream: Some(stream),
        }))
    }
}

fn tls_connector() -> Result<RustlsConnector, rustls::Error> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(RustlsConnector::from(Arc::new(config)))
}

fn open_session(config: &FtpConfig) -> Result<RustlsFtpStream, FtpConnectError> {
    let addr = config.socket_addr()?;
    debug!(%addr, "Connecting to FTP server");

    let stream = RustlsFtpStream::connect_timeout(addr, config.timeout)
        .map_err(|e| config.connect_error(e))?;
    stream
        .get_ref()
        .set_read_timeout(Some(config.timeout))
        .map_err(|e| config.connect_error(e))?;

    let tls_error = |message: String| FtpConnectError::Tls {
        host: config.host.clone(),
        message,
    };
    let connector = tls_connector().map_err(|e| tls_error(e.to_string()))?;
    let mut stream = stream
        .into_secure(connector, &config.host)
        .map_err(|e| tls_error(e.to_string()))?;

    debug!(username = %config.username, "Logging in");
    stream
        .login(&config.username, &config.password)
        .map_err(|e| FtpConnectError::Login {
            username: config.username.clone(),
            message: e.to_string(),
        })?;

    stream.set_mode(Mode::Passive);
    stream
        .transfer_type(FileType::Binary)
        .map_err(|e| config.connect_error(format!("cannot switch to binary mode: {e}")))?;

    Ok(stream)
}

/// A logged-in FTP-over-TLS session
pub struct FtpsSession {
    // None while a blocking call owns the stream, or after close
    stream: Option<RustlsFtpStream>,
}

#[async_trait]
impl Uploader for FtpsSession {
    async fn upload(&mut self, path: &Path) -> Result<u64, UploadError> {
        let mut stream = self.stream.take().ok_or(UploadError::SessionClosed)?;
        let path = path.to_path_buf();

        let (stream, result) = tokio::task::spawn_blocking(move || {
            let result = store_file(&mut stream, &path);
            (stream, result)
        })
        .await
        .map_err(|e| UploadError::Task(e.to_string()))?;

        self.stream = Some(stream);
        result
    }

    async fn close(&mut self) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };

        match tokio::task::spawn_blocking(move || stream.quit()).await {
            Ok(Ok(())) => debug!("FTP session closed"),
            Ok(Err(e)) => warn!(error = %e, "Failed to quit FTP session gracefully"),
            Err(e) => warn!(error = %e, "FTP quit task failed"),
        }
    }
}

fn store_file(stream: &mut RustlsFtpStream, path: &Path) -> Result<u64, UploadError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| UploadError::Rejected {
            file: path.display().to_string(),
            message: "path has no file name".to_string(),
        })?;

    let mut file = std::fs::File::open(path).map_err(|source| UploadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let bytes = stream
        .put_file(&name, &mut file)
        .map_err(|e| UploadError::Rejected {
            file: name.clone(),
            message: e.to_string(),
        })?;

    info!(file = %name, bytes, "Uploaded to FTP");
    Ok(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_ftp_env() {
        for var in ["FTPHOST", "FTPUSER", "FTPPASS", "FTPPORT", "FTPTIMEOUT"] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_requires_credentials() {
        clear_ftp_env();
        std::env::set_var("FTPHOST", "ftp.example.com");
        std::env::set_var("FTPUSER", "relay");

        let err = FtpConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("FTPPASS"));

        clear_ftp_env();
    }

    #[test]
    #[serial]
    fn test_from_env_reads_all_settings() {
        clear_ftp_env();
        std::env::set_var("FTPHOST", "ftp.example.com");
        std::env::set_var("FTPUSER", "relay");
        std::env::set_var("FTPPASS", "s3cret");
        std::env::set_var("FTPPORT", "2121");

        let config = FtpConfig::from_env().unwrap();
        assert_eq!(config.host, "ftp.example.com");
        assert_eq!(config.port, 2121);
        assert_eq!(config.username, "relay");
        assert_eq!(config.password, "s3cret");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_FTP_TIMEOUT_SECS));

        clear_ftp_env();
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = FtpConfig::new("ftp.example.com", "relay", "s3cret");
        let shown = format!("{config:?}");
        assert!(!shown.contains("s3cret"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn test_tls_connector_builds() {
        assert!(tls_connector().is_ok());
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        let config = FtpConfig::new("127.0.0.1", "relay", "s3cret").with_port(1);
        let err = FtpsConnector::new(config).connect().await.err().unwrap();
        assert!(matches!(err, FtpConnectError::Connect { .. }));
    }
}
