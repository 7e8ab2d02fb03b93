//! HTTP client for the CDS retrieve API.
//!
//! Protocol:
//! 1. `POST {url}/retrieve/v1/processes/{dataset}/execute` with `{"inputs": ...}`
//! 2. `GET {url}/retrieve/v1/jobs/{id}` until the job is no longer queued or running
//! 3. `GET {url}/retrieve/v1/jobs/{id}/results` for the asset location
//! 4. stream the asset to disk
//!
//! Failed requests are not retried. Polling only waits for the remote job.

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::Deserialize;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::error::{CdsError, CdsResult};
use crate::request::RetrieveRequest;
use crate::ClimateDataSource;

/// Default CDS endpoint.
pub const DEFAULT_CDS_URL: &str = "https://cds.climate.copernicus.eu/api";

/// Header carrying the personal access token.
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Configuration for the CDS client.
#[derive(Debug, Clone)]
pub struct CdsConfig {
    /// API root, e.g. `https://cds.climate.copernicus.eu/api`
    pub url: String,
    /// Personal access token
    pub key: String,
    /// First delay between job status polls (grows by half each poll)
    pub poll_interval: Duration,
    /// Upper bound for the poll delay
    pub max_poll_interval: Duration,
    /// Timeout for a single HTTP request, asset download included
    pub request_timeout: Duration,
    /// Give up waiting for a job after this long (`None` waits forever)
    pub max_wait: Option<Duration>,
}

impl Default for CdsConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CDS_URL.to_string(),
            key: String::new(),
            poll_interval: Duration::from_secs(1),
            max_poll_interval: Duration::from_secs(120),
            request_timeout: Duration::from_secs(3600),
            max_wait: None,
        }
    }
}

impl CdsConfig {
    /// Read `CDSAPI_URL` and `CDSAPI_KEY` from the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("CDSAPI_URL") {
            config.url = url;
        }
        if let Ok(key) = std::env::var("CDSAPI_KEY") {
            config.key = key;
        }

        config
    }

    pub fn validate(&self) -> CdsResult<()> {
        if self.key.trim().is_empty() {
            return Err(CdsError::InvalidConfig(
                "no access key configured (set CDSAPI_KEY)".to_string(),
            ));
        }
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(CdsError::InvalidConfig(format!("invalid url: {}", self.url)));
        }
        if self.poll_interval.is_zero() {
            return Err(CdsError::InvalidConfig("poll_interval must be > 0".to_string()));
        }
        Ok(())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), path)
    }
}

/// State of a submitted job as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Accepted,
    Running,
    Successful,
    Failed,
    Rejected,
    Dismissed,
    Other(String),
}

impl FromStr for JobStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "accepted" => Self::Accepted,
            "running" => Self::Running,
            "successful" => Self::Successful,
            "failed" => Self::Failed,
            "rejected" => Self::Rejected,
            "dismissed" => Self::Dismissed,
            other => Self::Other(other.to_string()),
        })
    }
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Accepted => "accepted",
            Self::Running => "running",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
            Self::Dismissed => "dismissed",
            Self::Other(s) => s,
        }
    }

    /// Whether the job can still change state.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Accepted | Self::Running)
    }
}

#[derive(Debug, Deserialize)]
struct JobInfo {
    #[serde(rename = "jobID")]
    job_id: String,
    status: String,
}

impl JobInfo {
    fn status(&self) -> JobStatus {
        match self.status.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobResults {
    asset: Asset,
}

#[derive(Debug, Deserialize)]
struct Asset {
    value: AssetValue,
}

#[derive(Debug, Deserialize)]
struct AssetValue {
    href: String,
    #[serde(rename = "file:size", default)]
    size: Option<u64>,
}

/// Download progress information.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub url: String,
    pub total_bytes: Option<u64>,
    pub downloaded_bytes: u64,
    pub started_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

impl DownloadProgress {
    fn new(url: &str, total_bytes: Option<u64>) -> Self {
        let now = Utc::now();
        Self {
            url: url.to_string(),
            total_bytes,
            downloaded_bytes: 0,
            started_at: now,
            last_update: now,
        }
    }

    pub fn percent_complete(&self) -> Option<f64> {
        self.total_bytes
            .filter(|total| *total > 0)
            .map(|total| (self.downloaded_bytes as f64 / total as f64) * 100.0)
    }

    pub fn bytes_per_second(&self) -> f64 {
        let elapsed = (self.last_update - self.started_at).num_seconds() as f64;
        if elapsed > 0.0 {
            self.downloaded_bytes as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// CDS retrieve client.
pub struct CdsClient {
    client: Client,
    config: CdsConfig,
}

impl CdsClient {
    /// Create a client; the configuration must carry an access key.
    pub fn new(config: CdsConfig) -> CdsResult<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CdsConfig {
        &self.config
    }

    async fn submit(&self, dataset: &str, request: &RetrieveRequest) -> CdsResult<JobInfo> {
        let url = self
            .config
            .endpoint(&format!("retrieve/v1/processes/{}/execute", dataset));

        let response = self
            .client
            .post(&url)
            .header(TOKEN_HEADER, &self.config.key)
            .json(&serde_json::json!({ "inputs": request }))
            .send()
            .await?;

        let job: JobInfo = check_status(response).await?.json().await?;
        info!(job_id = %job.job_id, status = %job.status, dataset = dataset, "Submitted CDS request");
        Ok(job)
    }

    async fn job_status(&self, job_id: &str) -> CdsResult<JobStatus> {
        let url = self.config.endpoint(&format!("retrieve/v1/jobs/{}", job_id));
        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.config.key)
            .send()
            .await?;

        let job: JobInfo = check_status(response).await?.json().await?;
        Ok(job.status())
    }

    /// Poll until the job leaves the queued/running states.
    async fn wait_for_job(&self, job_id: &str) -> CdsResult<()> {
        let started = Instant::now();
        let mut delay = self.config.poll_interval;

        loop {
            let status = self.job_status(job_id).await?;
            debug!(job_id = job_id, status = status.as_str(), "Polled CDS job");

            match status {
                JobStatus::Successful => return Ok(()),
                s if s.is_pending() => {
                    if let Some(max_wait) = self.config.max_wait {
                        if started.elapsed() >= max_wait {
                            return Err(CdsError::JobTimeout {
                                job_id: job_id.to_string(),
                                status: s.as_str().to_string(),
                                waited_secs: started.elapsed().as_secs(),
                            });
                        }
                    }
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay + delay / 2, self.config.max_poll_interval);
                }
                s => {
                    let message = self.failure_message(job_id).await;
                    return Err(CdsError::JobFailed {
                        job_id: job_id.to_string(),
                        status: s.as_str().to_string(),
                        message,
                    });
                }
            }
        }
    }

    /// Best-effort description of why a job failed.
    async fn failure_message(&self, job_id: &str) -> String {
        let url = self
            .config
            .endpoint(&format!("retrieve/v1/jobs/{}/results", job_id));
        let body = match self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.config.key)
            .send()
            .await
        {
            Ok(response) => response.text().await.unwrap_or_default(),
            Err(e) => return e.to_string(),
        };
        describe_error_body(&body)
    }

    async fn asset(&self, job_id: &str) -> CdsResult<AssetValue> {
        let url = self
            .config
            .endpoint(&format!("retrieve/v1/jobs/{}/results", job_id));
        let response = self
            .client
            .get(&url)
            .header(TOKEN_HEADER, &self.config.key)
            .send()
            .await?;

        let body = check_status(response).await?.text().await?;
        parse_asset(&body)
    }

    /// Stream `href` into `target`, going through a `.partial` file.
    #[instrument(skip(self), fields(target = %target.display()))]
    async fn download(&self, href: &str, size: Option<u64>, target: &Path) -> CdsResult<u64> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CdsError::io(parent, e))?;
        }
        let partial = partial_path(target);

        let response = check_status(self.client.get(href).send().await?).await?;
        let mut progress = DownloadProgress::new(href, size.or(response.content_length()));

        let written = write_body(response, &partial, &mut progress).await;
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&partial).await {
                warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial download");
            }
            return Err(e);
        }

        fs::rename(&partial, target)
            .await
            .map_err(|e| CdsError::io(target, e))?;

        Ok(progress.downloaded_bytes)
    }
}

#[async_trait]
impl ClimateDataSource for CdsClient {
    async fn retrieve(
        &self,
        dataset: &str,
        request: &RetrieveRequest,
        target: &Path,
    ) -> CdsResult<u64> {
        let job = self.submit(dataset, request).await?;
        self.wait_for_job(&job.job_id).await?;

        let asset = self.asset(&job.job_id).await?;
        let bytes = self.download(&asset.href, asset.size, target).await?;

        info!(
            job_id = %job.job_id,
            path = %target.display(),
            bytes = bytes,
            "Retrieved CDS asset"
        );
        Ok(bytes)
    }
}

/// Stream the response body into `partial`, updating `progress` as chunks arrive.
async fn write_body(
    response: Response,
    partial: &Path,
    progress: &mut DownloadProgress,
) -> CdsResult<()> {
    let mut file = File::create(partial)
        .await
        .map_err(|e| CdsError::io(partial, e))?;

    let mut stream = response.bytes_stream();
    let mut bytes_since_update = 0u64;
    let update_interval = 50 * 1024 * 1024;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| CdsError::io(partial, e))?;

        progress.downloaded_bytes += chunk.len() as u64;
        progress.last_update = Utc::now();
        bytes_since_update += chunk.len() as u64;

        if bytes_since_update >= update_interval {
            bytes_since_update = 0;
            debug!(
                downloaded = progress.downloaded_bytes,
                total = ?progress.total_bytes,
                percent = ?progress.percent_complete().map(|p| format!("{:.1}%", p)),
                speed = format!("{:.1} KB/s", progress.bytes_per_second() / 1024.0),
                "Download progress"
            );
        }
    }

    file.flush().await.map_err(|e| CdsError::io(partial, e))?;
    file.sync_all().await.map_err(|e| CdsError::io(partial, e))?;
    Ok(())
}

async fn check_status(response: Response) -> CdsResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Err(CdsError::Status {
        status: status.as_u16(),
        url,
        body: describe_error_body(&body),
    })
}

fn parse_asset(body: &str) -> CdsResult<AssetValue> {
    let results: JobResults = serde_json::from_str(body)
        .map_err(|e| CdsError::UnexpectedResponse(format!("job results: {}", e)))?;
    Ok(results.asset.value)
}

/// Pull `title`/`detail` out of a CDS error document, falling back to the raw body.
fn describe_error_body(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    match (field("title"), field("detail")) {
        (Some(title), Some(detail)) => format!("{}: {}", title, detail),
        (Some(title), None) => title,
        (None, Some(detail)) => detail,
        (None, None) => body.chars().take(500).collect(),
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = CdsConfig {
            url: "https://cds.climate.copernicus.eu/api/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.endpoint("retrieve/v1/jobs/abc"),
            "https://cds.climate.copernicus.eu/api/retrieve/v1/jobs/abc"
        );
    }

    #[test]
    fn test_validate_requires_key() {
        let config = CdsConfig::default();
        assert!(matches!(config.validate(), Err(CdsError::InvalidConfig(_))));

        let config = CdsConfig {
            key: "token".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = CdsConfig {
            key: "token".to_string(),
            url: "cds.example".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_job_status_states() {
        let parse = |s: &str| s.parse::<JobStatus>().unwrap();
        assert!(parse("accepted").is_pending());
        assert!(parse("running").is_pending());
        assert!(!parse("successful").is_pending());
        assert!(!parse("failed").is_pending());
        assert!(!parse("rejected").is_pending());
        assert_eq!(parse("paused"), JobStatus::Other("paused".to_string()));
        assert_eq!(parse("dismissed").as_str(), "dismissed");
    }

    #[test]
    fn test_parse_job_info() {
        let job: JobInfo =
            serde_json::from_str(r#"{"jobID": "1234-abcd", "status": "accepted", "type": "process"}"#)
                .unwrap();
        assert_eq!(job.job_id, "1234-abcd");
        assert_eq!(job.status(), JobStatus::Accepted);
    }

    #[test]
    fn test_parse_asset() {
        let body = r#"{
            "asset": {
                "value": {
                    "type": "application/zip",
                    "href": "https://object-store.example/cache/abc.zip",
                    "file:size": 123456
                }
            }
        }"#;
        let asset = parse_asset(body).unwrap();
        assert_eq!(asset.href, "https://object-store.example/cache/abc.zip");
        assert_eq!(asset.size, Some(123456));

        assert!(matches!(
            parse_asset(r#"{"status": "ok"}"#),
            Err(CdsError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_describe_error_body() {
        assert_eq!(
            describe_error_body(r#"{"title": "Authentication failed", "detail": "bad token"}"#),
            "Authentication failed: bad token"
        );
        assert_eq!(describe_error_body("gateway timeout"), "gateway timeout");
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/data/netcdf_zip/cordex_tas_2020_2030.zip")),
            PathBuf::from("/data/netcdf_zip/cordex_tas_2020_2030.zip.partial")
        );
    }

    #[test]
    fn test_progress_percent() {
        let mut progress = DownloadProgress::new("https://example.com/file", Some(1000));
        progress.downloaded_bytes = 500;
        assert_eq!(progress.percent_complete(), Some(50.0));

        let progress = DownloadProgress::new("https://example.com/file", None);
        assert_eq!(progress.percent_complete(), None);
    }
}
