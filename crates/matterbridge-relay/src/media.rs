use async_trait::async_trait;
use matterbridge_core::{BridgeError, BridgeResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Public beta key, used when no key is configured.
pub const GIPHY_PUBLIC_KEY: &str = "dc6zaTOxFJmzC";

const GIPHY_API: &str = "https://api.giphy.com";

/// Looks up a random media URL for some keywords.
#[async_trait]
pub trait MediaSearch: Send + Sync {
    async fn random(&self, keywords: &[String]) -> BridgeResult<String>;
}

#[derive(Debug, Deserialize)]
struct RandomResponse {
    data: RandomData,
}

#[derive(Debug, Deserialize)]
struct RandomData {
    #[serde(default)]
    images: Option<Images>,
    /// Flat field returned by older API versions.
    #[serde(default)]
    fixed_height_downsampled_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Images {
    fixed_height_downsampled: Option<Rendition>,
}

#[derive(Debug, Deserialize)]
struct Rendition {
    url: String,
}

/// [`MediaSearch`] backed by the Giphy random endpoint.
pub struct GiphyClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GiphyClient {
    pub fn new(api_key: Option<String>) -> BridgeResult<Self> {
        Self::with_base_url(api_key, GIPHY_API)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> BridgeResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BridgeError::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: api_key
                .filter(|k| !k.is_empty())
                .unwrap_or_else(|| GIPHY_PUBLIC_KEY.to_string()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MediaSearch for GiphyClient {
    async fn random(&self, keywords: &[String]) -> BridgeResult<String> {
        let tag = keywords.join(" ");
        debug!(tag = %tag, "Giphy random lookup");
        let resp = self
            .client
            .get(format!("{}/v1/gifs/random", self.base_url))
            .query(&[("api_key", self.api_key.as_str()), ("tag", tag.as_str())])
            .send()
            .await
            .map_err(|e| BridgeError::Media(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(BridgeError::Media(format!("Giphy returned {}", resp.status())));
        }
        let body: RandomResponse = resp
            .json()
            .await
            .map_err(|e| BridgeError::Media(format!("No result for '{tag}': {e}")))?;

        body.data
            .images
            .and_then(|i| i.fixed_height_downsampled)
            .map(|r| r.url)
            .or(body.data.fixed_height_downsampled_url)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| BridgeError::Media(format!("No result for '{tag}'")))
    }
}
