//! Gateway client for the consumers collection.

use async_trait::async_trait;
use console_core::{
    Consumer, ConsumerList, ConsumerPatch, CreatedConsumer, Error, NewConsumer, Result,
    UpstreamCreatedConsumer,
};
use reqwest::{RequestBuilder, Response};
use std::time::{Duration, Instant};
use telemetry::{health, metrics};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::GatewayConfig;

/// Operations the console performs against the gateway.
///
/// Implemented by [`GatewayClient`] in production and by recording mocks in
/// tests.
#[async_trait]
pub trait ConsumerGateway: Send + Sync {
    /// List consumers. An unexpected envelope yields an empty list.
    async fn list_consumers(&self) -> Result<ConsumerList>;

    /// Create a consumer and have the gateway issue a non-expiring key.
    async fn create_consumer(&self, body: &NewConsumer) -> Result<CreatedConsumer>;

    /// Patch the consumer named `patch.name`.
    async fn update_consumer(&self, patch: &ConsumerPatch) -> Result<Consumer>;

    async fn delete_consumer(&self, consumer_name: &str) -> Result<()>;

    fn is_configured(&self) -> bool;
}

/// reqwest-backed gateway client.
#[derive(Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
}

impl GatewayClient {
    /// Creates a new gateway client.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {e}")))?;

        health().gateway.set_configured(config.is_configured());

        info!(
            base_url = %config.base_url,
            account = %config.account,
            bucket = %config.bucket,
            configured = config.is_configured(),
            "Created gateway client"
        );

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// `{base}/accounts/{account}/key-buckets/{bucket}/consumers[/{name}]`
    pub fn consumers_url(&self, consumer_name: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| Error::internal(format!("Invalid gateway base URL: {e}")))?;

        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| Error::internal("Gateway base URL cannot carry a path"))?;
            segments.pop_if_empty().extend([
                "accounts",
                self.config.account.as_str(),
                "key-buckets",
                self.config.bucket.as_str(),
                "consumers",
            ]);
            if let Some(name) = consumer_name {
                segments.push(name);
            }
        }

        Ok(url)
    }

    /// List with an explicit page size. Used by the startup probe.
    pub async fn list_page(&self, limit: u32, offset: u32) -> Result<ConsumerList> {
        let api_key = self.config.api_key()?;
        let mut url = self.consumers_url(None)?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());

        debug!(url = %url, "Listing consumers");
        let response = self
            .send("fetch consumers", self.http.get(url).bearer_auth(api_key))
            .await?;

        let envelope = match response.json::<serde_json::Value>().await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Consumer list body is not JSON, treating as empty");
                metrics().unexpected_envelopes.inc();
                return Ok(ConsumerList::empty());
            }
        };

        match ConsumerList::from_envelope(envelope) {
            Some(decoded) => {
                for skipped in &decoded.skipped {
                    warn!(
                        index = skipped.index,
                        id = ?skipped.id,
                        reason = %skipped.reason,
                        "Skipping unreadable consumer record"
                    );
                }
                if !decoded.skipped.is_empty() {
                    metrics().unexpected_envelopes.inc();
                }
                debug!(
                    count = decoded.list.data.len(),
                    skipped = decoded.skipped.len(),
                    "Fetched consumers"
                );
                Ok(decoded.list)
            }
            None => {
                warn!("Consumer list envelope has no data array, treating as empty");
                metrics().unexpected_envelopes.inc();
                Ok(ConsumerList::empty())
            }
        }
    }

    /// Send a request, mapping transport failures and non-2xx statuses.
    async fn send(&self, action: &'static str, request: RequestBuilder) -> Result<Response> {
        let start = Instant::now();
        let result = request.send().await;
        metrics()
            .upstream_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        let response = result.map_err(|e| {
            error!(action, error = %e, "Gateway request failed");
            metrics().transport_failures.inc();
            health().gateway.set_unhealthy(e.to_string());
            Error::transport(format!("Failed to {action}: {e}"))
        })?;

        let status = response.status();
        info!(action, status = status.as_u16(), "Gateway responded");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(action, status = %status, body = %body, "Gateway rejected request");
            metrics().upstream_rejections.inc();
            if status.is_server_error() {
                health().gateway.set_unhealthy(format!("gateway returned {status}"));
            } else {
                health().gateway.set_healthy();
            }
            return Err(Error::upstream(
                action,
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
                body,
            ));
        }

        health().gateway.set_healthy();
        Ok(response)
    }
}

#[async_trait]
impl ConsumerGateway for GatewayClient {
    async fn list_consumers(&self) -> Result<ConsumerList> {
        self.list_page(self.config.page_size, 0).await
    }

    async fn create_consumer(&self, body: &NewConsumer) -> Result<CreatedConsumer> {
        let api_key = self.config.api_key()?;
        let mut url = self.consumers_url(None)?;
        url.query_pairs_mut()
            .append_pair("with-api-key", "true")
            .append_pair("no-key-expiration", "true");

        debug!(name = %body.name, "Creating consumer");
        let response = self
            .send(
                "create consumer",
                self.http.post(url).bearer_auth(api_key).json(body),
            )
            .await?;

        let created: UpstreamCreatedConsumer = response
            .json()
            .await
            .map_err(|e| Error::decode(format!("create consumer: {e}")))?;
        let created = CreatedConsumer::from(created);

        info!(
            id = %created.consumer.id,
            name = %created.consumer.name,
            key_issued = created.api_key.is_some(),
            "Created consumer"
        );
        Ok(created)
    }

    async fn update_consumer(&self, patch: &ConsumerPatch) -> Result<Consumer> {
        let api_key = self.config.api_key()?;
        let url = self.consumers_url(Some(&patch.name))?;

        debug!(name = %patch.name, "Updating consumer");
        let response = self
            .send(
                "update consumer",
                self.http.patch(url).bearer_auth(api_key).json(patch),
            )
            .await?;

        // The patch is committed once the gateway answers 2xx, so an
        // unreadable echo falls back to what was sent.
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::transport(format!("Failed to update consumer: {e}")))?;
        match serde_json::from_slice::<Consumer>(&body) {
            Ok(consumer) => Ok(consumer),
            Err(e) => {
                warn!(name = %patch.name, error = %e, "Updated consumer body is unreadable, echoing the patch");
                metrics().unexpected_envelopes.inc();
                Ok(Consumer::from_patch(patch))
            }
        }
    }

    async fn delete_consumer(&self, consumer_name: &str) -> Result<()> {
        let api_key = self.config.api_key()?;
        let url = self.consumers_url(Some(consumer_name))?;

        debug!(name = %consumer_name, "Deleting consumer");
        self.send("delete consumer", self.http.delete(url).bearer_auth(api_key))
            .await?;
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }
}
