use std::future::Future;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, ConfigError};
use crate::contract::{self, AnalysisResult};
use crate::submission_error::SubmissionError;
use crate::upload::SelectedFile;

/// Multipart field the analysis service reads the spreadsheet from.
pub const FILE_FIELD: &str = "file";

/// Anything that can turn a selected spreadsheet into an analysis result.
///
/// The upload session only talks to this trait, so it can be driven by the
/// HTTP client in production and by in-memory fakes in tests. Dropping the
/// returned future must abandon the request.
pub trait AnalysisService: Send + Sync + 'static {
    fn analyze(
        &self,
        file: SelectedFile,
    ) -> impl Future<Output = Result<AnalysisResult, SubmissionError>> + Send;
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// HTTP client for the external analysis service.
#[derive(Clone)]
pub struct AnalysisClient {
    client: reqwest::Client,
    config: Config,
}

impl AnalysisClient {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Send one spreadsheet to `POST {endpoint}/analyze` and validate the
    /// answer. No retries happen here.
    #[instrument(skip(self, file), fields(url = %self.config.analyze_url()))]
    pub async fn submit(&self, file: Option<&SelectedFile>) -> Result<AnalysisResult, SubmissionError> {
        let file = file.ok_or(SubmissionError::NoFileProvided)?;

        let part = Part::bytes(file.contents().to_vec())
            .file_name(file.name().to_string())
            .mime_str(file.media_type())?;
        let form = Form::new().part(FILE_FIELD, part);

        debug!("Uploading {} ({} bytes) for analysis", file.name(), file.len());
        let response = self
            .client
            .post(self.config.analyze_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        debug!("Received HTTP response with status: {}", status);
        if !status.is_success() {
            warn!("Analysis of {} failed with HTTP {}", file.name(), status);
            return Err(SubmissionError::HttpError(status.as_u16()));
        }

        let body = response.bytes().await?;
        debug!("Retrieved result body, size: {} bytes", body.len());

        let result = contract::validate_bytes(&body)?;
        info!(
            "Analysis of {} complete: {} daily and {} annual violations",
            file.name(),
            result.daily_exceed_count,
            result.annual_exceed_count
        );
        Ok(result)
    }

    /// `GET {endpoint}/`; the service answers `{"status": "API Running"}`.
    #[instrument(skip(self), fields(url = %self.config.health_url()))]
    pub async fn health_check(&self) -> Result<HealthStatus, SubmissionError> {
        let response = self.client.get(self.config.health_url()).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Health check failed with HTTP {}", status);
            return Err(SubmissionError::HttpError(status.as_u16()));
        }

        let health = response.json::<HealthStatus>().await.map_err(|e| {
            SubmissionError::MalformedResult(contract::ValidationError::Shape(e.to_string()))
        })?;
        debug!("Analysis service status: {}", health.status);
        Ok(health)
    }
}

impl AnalysisService for AnalysisClient {
    fn analyze(
        &self,
        file: SelectedFile,
    ) -> impl Future<Output = Result<AnalysisResult, SubmissionError>> + Send {
        async move { self.submit(Some(&file)).await }
    }
}
