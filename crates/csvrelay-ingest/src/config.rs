//! Source configuration
//!
//! The config file is a JSON object keyed by source name:
//!
//! ```json
//! {
//!   "sales": { "URL": "https://example.com/sales.csv" },
//!   "stock": { "URL": "https://example.com/stock.txt", "PARAMS": { "sep": ";", "skiprows": 2 } }
//! }
//! ```
//!
//! Sources are processed in file order. `PARAMS` uses the option names of
//! pandas' `read_csv` so existing configuration files keep working.

use crate::error::{ConfigError, FetchError};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default location of the source configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// One configured data source
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceConfig {
    /// Where the dataset is downloaded from (http, https, file URL or local path)
    #[serde(rename = "URL")]
    pub url: String,

    /// Parser options as written in the file. They are only interpreted when
    /// the source is fetched, so a bad value fails that source alone.
    #[serde(rename = "PARAMS", default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl SourceConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: serde_json::Map::new(),
        }
    }

    pub fn with_params(mut self, params: serde_json::Map<String, serde_json::Value>) -> Self {
        self.params = params;
        self
    }

    /// Interpret `PARAMS` as parser options
    pub fn options(&self) -> Result<CsvOptions, FetchError> {
        serde_json::from_value(serde_json::Value::Object(self.params.clone()))
            .map_err(|e| FetchError::options("PARAMS", e.to_string()))
    }
}

/// Which row holds the column names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Header {
    /// Row 0, unless `names` is given (then there is no header row)
    #[default]
    Infer,
    /// Zero-based row index counted after `skiprows`; rows before it are dropped
    Row(usize),
    /// No header; columns are named `0`, `1`, ...
    Absent,
}

impl Header {
    /// The header row index once `names` is taken into account
    pub fn resolve(self, has_names: bool) -> Option<usize> {
        match self {
            Header::Infer if has_names => None,
            Header::Infer => Some(0),
            Header::Row(row) => Some(row),
            Header::Absent => None,
        }
    }
}

impl<'de> Deserialize<'de> for Header {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Null => Ok(Header::Absent),
            serde_json::Value::String(s) if s == "infer" => Ok(Header::Infer),
            serde_json::Value::Number(n) => n
                .as_u64()
                .and_then(|row| usize::try_from(row).ok())
                .map(Header::Row)
                .ok_or_else(|| D::Error::custom(format!("header must be a row index, got {n}"))),
            other => Err(D::Error::custom(format!(
                "header must be a row index, \"infer\" or null, got {other}"
            ))),
        }
    }
}

/// CSV parser options from a source's `PARAMS` object
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field separator, a single ASCII character. Defaults to `,`.
    pub sep: Option<String>,

    /// Same as `sep`; takes precedence when both are given
    pub delimiter: Option<String>,

    pub header: Header,

    /// Column names to use instead of a header row
    pub names: Option<Vec<String>>,

    /// Number of leading records to drop before anything else
    pub skiprows: usize,

    /// Maximum number of data rows to keep
    pub nrows: Option<usize>,

    /// Columns to keep, by name
    pub usecols: Option<Vec<String>>,

    pub quotechar: Option<String>,

    /// Lines starting with this character are ignored
    pub comment: Option<String>,

    /// Options this parser does not implement. They are logged and ignored.
    #[serde(flatten)]
    pub unsupported: BTreeMap<String, serde_json::Value>,
}

impl CsvOptions {
    /// The configured field separator, if any
    pub fn separator(&self) -> Option<&str> {
        self.delimiter.as_deref().or(self.sep.as_deref())
    }
}

/// All configured sources, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    sources: Vec<(String, SourceConfig)>,
}

impl Configuration {
    /// Read and parse the configuration file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(path, &text)
    }

    /// Parse configuration text. `path` is only used in error messages.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self, ConfigError> {
        let path = path.into();
        let raw: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(text).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;

        let mut sources = Vec::with_capacity(raw.len());
        for (name, value) in raw {
            validate_source_name(&name)?;
            let source: SourceConfig = serde_json::from_value(value)
                .map_err(|e| ConfigError::invalid_source(&name, e.to_string()))?;
            sources.push((name, source));
        }

        Ok(Self { sources })
    }

    pub fn sources(&self) -> impl Iterator<Item = (&str, &SourceConfig)> {
        self.sources.iter().map(|(name, source)| (name.as_str(), source))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Source names become local file names, so they must stay inside the work directory.
fn validate_source_name(name: &str) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::invalid_source(name, "name is empty"));
    }
    if name == "." || name == ".." {
        return Err(ConfigError::invalid_source(name, "name is a relative path"));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(ConfigError::invalid_source(
            name,
            "name must not contain path separators",
        ));
    }
    Ok(())
}
