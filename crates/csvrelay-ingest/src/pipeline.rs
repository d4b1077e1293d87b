//! Pipeline runner
//!
//! One run walks `LoadConfig -> OpenSession -> [Fetch -> Write -> Upload ->
//! Cleanup]* -> CloseSession`. Config and session failures end the run before
//! any source is touched. Source failures are collected in a [`RunReport`];
//! whether the remaining sources are still attempted is the
//! [`FailurePolicy`].

use crate::artifact::LocalArtifact;
use crate::config::{Configuration, SourceConfig, DEFAULT_CONFIG_PATH};
use crate::error::{PipelineError, Result, SourceError};
use crate::fetch::Fetcher;
use crate::ftp::{Connector, Uploader};
use std::path::PathBuf;
use tracing::{error, info, info_span, warn, Instrument};

/// What to do with the remaining sources after one fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FailurePolicy {
    /// Stop at the first failed source; later sources are skipped
    #[default]
    Abort,
    /// Attempt every source
    Continue,
}

/// Settings for a [`Runner`]
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Source configuration file, re-read at the start of every run
    pub config_path: PathBuf,

    /// Directory where local artifacts are written
    pub work_dir: PathBuf,

    pub on_error: FailurePolicy,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            work_dir: PathBuf::from("."),
            on_error: FailurePolicy::default(),
        }
    }
}

/// A source that did not make it to the server
#[derive(Debug)]
pub struct SourceFailure {
    pub name: String,
    pub error: SourceError,
}

/// Outcome of one run
#[derive(Debug, Default)]
pub struct RunReport {
    /// Sources uploaded, in processing order
    pub uploaded: Vec<String>,

    pub failed: Vec<SourceFailure>,

    /// Sources never attempted because an earlier one failed
    pub skipped: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    /// `Ok` when every source was uploaded
    pub fn into_result(self) -> Result<Self> {
        if self.failed.is_empty() {
            return Ok(self);
        }
        Err(PipelineError::SourcesFailed {
            failed: self.failed.into_iter().map(|f| f.name).collect(),
            uploaded: self.uploaded,
        })
    }

    fn log_summary(&self) {
        if self.is_success() {
            info!(uploaded = self.uploaded.len(), "Pipeline run completed");
        } else {
            warn!(
                uploaded = self.uploaded.len(),
                failed = self.failed.len(),
                skipped = self.skipped.len(),
                "Pipeline run finished with failures"
            );
        }
    }
}

/// Runs the fetch, write, upload and cleanup cycle for every configured source
pub struct Runner<C> {
    settings: RunnerSettings,
    fetcher: Fetcher,
    connector: C,
}

impl<C: Connector> Runner<C> {
    pub fn new(settings: RunnerSettings, fetcher: Fetcher, connector: C) -> Self {
        Self {
            settings,
            fetcher,
            connector,
        }
    }

    /// Execute one complete run
    pub async fn run(&self) -> Result<RunReport> {
        let span = info_span!("run", config = %self.settings.config_path.display());
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&self) -> Result<RunReport> {
        let config = Configuration::load(&self.settings.config_path).inspect_err(|e| {
            error!(error = %e, "Failed to load configuration");
        })?;
        info!(sources = config.len(), "Loaded configuration");

        let mut session = self.connector.connect().await.inspect_err(|e| {
            error!(error = %e, "Failed to connect to FTP");
        })?;

        let report = self.process_all(&config, session.as_mut()).await;
        session.close().await;

        report.log_summary();
        Ok(report)
    }

    async fn process_all(&self, config: &Configuration, uploader: &mut dyn Uploader) -> RunReport {
        let mut report = RunReport::default();
        let mut sources = config.sources();

        while let Some((name, source)) = sources.next() {
            let span = info_span!("source", name = %name);
            match self.process_source(name, source, uploader).instrument(span).await {
                Ok(()) => report.uploaded.push(name.to_string()),
                Err(error) => {
                    error!(source_name = %name, stage = error.stage(), error = %error, "Source failed");
                    report.failed.push(SourceFailure {
                        name: name.to_string(),
                        error,
                    });

                    if self.settings.on_error == FailurePolicy::Abort {
                        report
                            .skipped
                            .extend(sources.by_ref().map(|(name, _)| name.to_string()));
                        if !report.skipped.is_empty() {
                            warn!(skipped = ?report.skipped, "Aborting run, remaining sources skipped");
                        }
                        break;
                    }
                },
            }
        }

        report
    }

    async fn process_source(
        &self,
        name: &str,
        source: &SourceConfig,
        uploader: &mut dyn Uploader,
    ) -> std::result::Result<(), SourceError> {
        // dropped on every path below, which deletes the file
        let artifact = LocalArtifact::reserve(&self.settings.work_dir, name);

        let table = self.fetcher.fetch(source).await?;
        artifact.write(&table)?;
        uploader.upload(artifact.path()).await?;

        Ok(())
    }
}
