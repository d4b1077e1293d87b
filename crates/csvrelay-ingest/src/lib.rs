//! csvrelay Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Downloads CSV datasets, normalizes them to local files and relays them to
//! an FTP-over-TLS server.
//!
//! # Overview
//!
//! - **Config**: source list from a JSON file ([`config`])
//! - **Fetch**: HTTP(S) or local download into a [`table::DataTable`] ([`fetch`])
//! - **Artifact**: local `{source}.csv` that deletes itself when dropped ([`artifact`])
//! - **Upload**: one FTPS session per run ([`ftp`])
//! - **Pipeline**: the per-run state machine ([`pipeline`])
//! - **Scheduler**: daily runs at a fixed local time ([`scheduler`])
//!
//! # Example
//!
//! ```no_run
//! use csvrelay_ingest::fetch::{Fetcher, DEFAULT_FETCH_TIMEOUT};
//! use csvrelay_ingest::ftp::{FtpConfig, FtpsConnector};
//! use csvrelay_ingest::pipeline::{Runner, RunnerSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let connector = FtpsConnector::new(FtpConfig::from_env()?);
//!     let runner = Runner::new(
//!         RunnerSettings::default(),
//!         Fetcher::new(DEFAULT_FETCH_TIMEOUT)?,
//!         connector,
//!     );
//!     runner.run().await?.into_result()?;
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ftp;
pub mod pipeline;
pub mod scheduler;
pub mod table;

pub use error::{PipelineError, Result};
