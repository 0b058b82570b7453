//! Pipeline entry point.
//!
//! Ties the stages together per platform: classify, resolve the canonical
//! ID, fetch metadata under the retry policy, select formats under the
//! size budget, download and mux. Each inbound request runs as one
//! logically sequential task; the only intra-request parallelism is the
//! engine's pair of download legs.

use std::time::Duration;

use reqwest::Client;
use tracing::info;

use crate::classify::{Platform, classify};
use crate::config::AppConfig;
use crate::download::{DownloadEngine, MediaArtifact};
use crate::error::{Error, Result, ValidationError};
use crate::media::{Metadata, Selection, SelectionMode, SizeBudget, select_format};
use crate::retry::RetryPolicy;
use crate::{instagram, tiktok, twitter, youtube};

/// Browser-like identity for resolver pages and short-link fetches.
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// One inbound media request from the dispatch layer.
#[derive(Debug, Clone)]
pub struct MediaRequest {
    /// Raw input text, validated by the classifier before any other use.
    pub input: String,
    /// Deliver only the audio track (YouTube only; other platforms serve
    /// combined streams).
    pub audio_only: bool,
    /// Requested maximum artifact size in MiB; clamped to the transport
    /// ceiling, defaulted from configuration when absent.
    pub size_budget_mib: Option<u64>,
}

impl MediaRequest {
    /// Request the default delivery of `input`.
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            audio_only: false,
            size_budget_mib: None,
        }
    }
}

/// What the pipeline hands back to the dispatch layer.
#[derive(Debug)]
pub enum Delivery {
    /// A single downloaded artifact with title, stream and cleanup.
    Media(MediaArtifact),
    /// Ordered image URLs of a slideshow post; the transport fetches these
    /// directly, so nothing is downloaded here.
    Images(Vec<String>),
}

/// The media resolution and delivery pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    client: Client,
    engine: DownloadEngine,
    retry: RetryPolicy,
    default_budget_mib: u64,
}

impl Pipeline {
    /// Build a pipeline from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            engine: DownloadEngine::new(client.clone(), config),
            client,
            retry: config.retry.policy(),
            default_budget_mib: config.default_budget_mib,
        })
    }

    /// Resolve one request into a deliverable result.
    ///
    /// # Errors
    ///
    /// Propagates the typed error of whichever stage failed; the message is
    /// user-surfaceable verbatim.
    pub async fn resolve(&self, request: &MediaRequest) -> Result<Delivery> {
        let classified = classify(&request.input)?;
        let budget =
            SizeBudget::from_mib(request.size_budget_mib.unwrap_or(self.default_budget_mib));

        info!(platform = %classified.platform, url = %classified.url, "resolving request");

        match classified.platform {
            Platform::TikTok => {
                let id = tiktok::resolve_id(&self.client, &classified.url).await?;
                let metadata = self
                    .retry
                    .run(|| tiktok::fetch_metadata(&self.client, &id))
                    .await?;
                self.deliver(&metadata, budget, SelectionMode::SingleStream)
                    .await
            }
            Platform::YouTube => {
                let id = youtube::extract_video_id(&classified.url)
                    .ok_or(ValidationError::InvalidShape {
                        platform: "YouTube",
                    })?;
                let metadata = self
                    .retry
                    .run(|| youtube::fetch_metadata(&self.client, &id))
                    .await?;
                let mode = if request.audio_only {
                    SelectionMode::AudioOnly
                } else {
                    SelectionMode::Muxed
                };
                self.deliver(&metadata, budget, mode).await
            }
            Platform::Twitter => {
                let metadata = self
                    .retry
                    .run(|| twitter::fetch_metadata(&self.client, &classified.url))
                    .await?;
                self.deliver(&metadata, budget, SelectionMode::SingleStream)
                    .await
            }
            Platform::Instagram => {
                let metadata = self
                    .retry
                    .run(|| instagram::fetch_metadata(&self.client, &classified.url))
                    .await?;
                self.deliver(&metadata, budget, SelectionMode::SingleStream)
                    .await
            }
        }
    }

    /// Select under the budget and run the download engine.
    async fn deliver(
        &self,
        metadata: &Metadata,
        budget: SizeBudget,
        mode: SelectionMode,
    ) -> Result<Delivery> {
        match select_format(metadata, budget, mode)? {
            Selection::Images(images) => {
                info!(id = %metadata.id, count = images.len(), "delivering image post");
                Ok(Delivery::Images(images))
            }
            Selection::Streams(selection) => {
                let artifact = self
                    .engine
                    .fetch_and_mux(&selection, &metadata.id, &metadata.title)
                    .await?;
                info!(id = %metadata.id, title = %artifact.title(), "delivering media artifact");
                Ok(Delivery::Media(artifact))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_unrecognized_input_before_any_network_access() {
        let pipeline = Pipeline::new(&AppConfig::default()).expect("pipeline builds");
        let request = MediaRequest::new("https://example.com/not-a-post");

        let err = pipeline.resolve(&request).await.expect_err("must reject");
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn request_defaults_are_plain_video() {
        let request = MediaRequest::new("https://youtu.be/dQw4w9WgXcQ");
        assert!(!request.audio_only);
        assert!(request.size_budget_mib.is_none());
    }
}
