//! Typed access to the console's own `/api/*` surface.

use async_trait::async_trait;
use console_core::{
    Consumer, ConsumerList, CreateConsumerRequest, CreatedConsumer, DeleteResponse,
    ModelUsageParams, UpdateConsumerRequest, UsageParams, UsageResponse,
};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ClientError, Result};

/// Console operations the data cache is built on.
#[async_trait]
pub trait ConsoleApi: Send + Sync {
    async fn list_consumers(&self) -> Result<ConsumerList>;

    async fn create_consumer(&self, request: &CreateConsumerRequest) -> Result<CreatedConsumer>;

    /// `consumer_name` is the current name; the request may carry a new one.
    async fn update_consumer(
        &self,
        consumer_name: &str,
        request: &UpdateConsumerRequest,
    ) -> Result<Consumer>;

    async fn delete_consumer(&self, consumer_name: &str) -> Result<DeleteResponse>;

    async fn usage(&self, params: &UsageParams) -> Result<UsageResponse>;

    async fn model_usage(&self, params: &ModelUsageParams) -> Result<UsageResponse>;
}

/// Error body rendered by the console.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// reqwest-backed [`ConsoleApi`].
#[derive(Clone)]
pub struct HttpConsoleApi {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpConsoleApi {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::Config(format!("{base_url}: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        Ok(Self { http, base_url })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config("base URL cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()));
    }

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    warn!(status = status.as_u16(), code = ?body.code, "Console request failed");

    Err(ClientError::Api {
        status: status.as_u16(),
        code: body.code,
        message: body
            .error
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string()),
        details: body.details,
    })
}

#[async_trait]
impl ConsoleApi for HttpConsoleApi {
    async fn list_consumers(&self) -> Result<ConsumerList> {
        let url = self.url(&["api", "consumers"])?;
        debug!(url = %url, "Fetching consumers");
        self.send(self.http.get(url)).await
    }

    async fn create_consumer(&self, request: &CreateConsumerRequest) -> Result<CreatedConsumer> {
        let url = self.url(&["api", "consumers"])?;
        self.send(self.http.post(url).json(request)).await
    }

    async fn update_consumer(
        &self,
        consumer_name: &str,
        request: &UpdateConsumerRequest,
    ) -> Result<Consumer> {
        let url = self.url(&["api", "consumers", consumer_name])?;
        self.send(self.http.patch(url).json(request)).await
    }

    async fn delete_consumer(&self, consumer_name: &str) -> Result<DeleteResponse> {
        let url = self.url(&["api", "consumers", consumer_name])?;
        self.send(self.http.delete(url)).await
    }

    async fn usage(&self, params: &UsageParams) -> Result<UsageResponse> {
        let url = self.url(&["api", "usage"])?;
        self.send(self.http.get(url).query(params)).await
    }

    async fn model_usage(&self, params: &ModelUsageParams) -> Result<UsageResponse> {
        let url = self.url(&["api", "model-usage"])?;
        self.send(self.http.get(url).query(params)).await
    }
}
