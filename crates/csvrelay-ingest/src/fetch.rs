//! Dataset download
//!
//! One GET per source, no retries. `file://` URLs and plain paths are read
//! from local disk instead.

use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::table::DataTable;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Default whole-request timeout for HTTP downloads
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Where a source's data lives
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Remote(Url),
    Local(PathBuf),
}

impl Location {
    fn parse(raw: &str) -> Result<Self, FetchError> {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(Location::Remote(url)),
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Location::Local)
                .map_err(|_| FetchError::UnsupportedUrl(raw.to_string())),
            // "C:\data\x.csv" parses as a URL with scheme "c"
            Ok(url) if url.scheme().len() == 1 => Ok(Location::Local(PathBuf::from(raw))),
            Ok(_) => Err(FetchError::UnsupportedUrl(raw.to_string())),
            Err(_) => Ok(Location::Local(PathBuf::from(raw))),
        }
    }
}

/// Downloads and parses source datasets
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("csvrelay/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Download `source.url` and parse it with `source.params`
    pub async fn fetch(&self, source: &SourceConfig) -> Result<DataTable, FetchError> {
        let options = source.options()?;
        let body = self.retrieve(&source.url).await?;
        debug!(url = %source.url, bytes = body.len(), "Downloaded source data");

        let table = DataTable::parse(&body, &options, &source.url)?;
        info!(
            url = %source.url,
            rows = table.row_count(),
            columns = table.column_count(),
            "Fetched dataset"
        );

        Ok(table)
    }

    async fn retrieve(&self, raw: &str) -> Result<Vec<u8>, FetchError> {
        match Location::parse(raw)? {
            Location::Remote(url) => self.download(url).await,
            Location::Local(path) => tokio::fs::read(&path)
                .await
                .map_err(|source| FetchError::Read { path, source }),
        }
    }

    async fn download(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        let url_str = url.to_string();
        debug!(url = %url_str, "Requesting source data");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url_str.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url_str,
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::Request {
                url: url_str,
                source,
            })?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn fetcher() -> Fetcher {
        Fetcher::new(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_location_parse() {
        assert!(matches!(
            Location::parse("https://example.com/a.csv").unwrap(),
            Location::Remote(_)
        ));
        assert_eq!(
            Location::parse("data/a.csv").unwrap(),
            Location::Local(PathBuf::from("data/a.csv"))
        );
        assert!(matches!(
            Location::parse("ftp://example.com/a.csv"),
            Err(FetchError::UnsupportedUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_http_csv() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n1,2\n3,4\n5,6\n"))
            .expect(1)
            .mount(&server)
            .await;

        let source = SourceConfig::new(format!("{}/data.csv", server.uri()));
        let table = fetcher().fetch(&source).await.unwrap();

        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 3);
    }

    #[tokio::test]
    async fn test_fetch_applies_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/semi.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x;y\n1;2\n"))
            .mount(&server)
            .await;

        let mut params = serde_json::Map::new();
        params.insert("sep".to_string(), serde_json::json!(";"));
        let source = SourceConfig::new(format!("{}/semi.txt", server.uri())).with_params(params);
        let table = fetcher().fetch(&source).await.unwrap();
        assert_eq!(table.columns(), &["x".to_string(), "y".to_string()]);
    }

    #[tokio::test]
    async fn test_unusable_params_fail_before_download() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n1,2\n"))
            .expect(0)
            .mount(&server)
            .await;

        let mut params = serde_json::Map::new();
        params.insert("usecols".to_string(), serde_json::json!([0, 1]));
        let source = SourceConfig::new(format!("{}/data.csv", server.uri())).with_params(params);

        let err = fetcher().fetch(&source).await.unwrap_err();
        assert!(matches!(err, FetchError::Options { .. }));
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = SourceConfig::new(format!("{}/missing.csv", server.uri()));
        let err = fetcher().fetch(&source).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host() {
        // port 1 is never listening
        let source = SourceConfig::new("http://127.0.0.1:1/data.csv");
        let err = fetcher().fetch(&source).await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }

    #[tokio::test]
    async fn test_fetch_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("local.csv");
        std::fs::write(&file, "k,v\nx,1\n").unwrap();

        let by_path = SourceConfig::new(file.to_string_lossy().to_string());
        assert_eq!(fetcher().fetch(&by_path).await.unwrap().row_count(), 1);

        let by_url = SourceConfig::new(Url::from_file_path(&file).unwrap().to_string());
        assert_eq!(fetcher().fetch(&by_url).await.unwrap().row_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_missing_local_file() {
        let source = SourceConfig::new("/definitely/not/here.csv");
        let err = fetcher().fetch(&source).await.unwrap_err();
        assert!(matches!(err, FetchError::Read { .. }));
    }
}
