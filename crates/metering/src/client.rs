//! Metering API client.

use async_trait::async_trait;
use console_core::{Error, MeterQuery, Result, UsageSeries};
use std::time::{Duration, Instant};
use telemetry::{health, metrics};
use tracing::{debug, error, warn};
use url::Url;

use crate::config::MeteringConfig;

/// Meter queries, implemented by [`MeteringClient`] and by test mocks.
#[async_trait]
pub trait UsageMeter: Send + Sync {
    /// Run a meter query. An unparseable result yields an empty series.
    async fn query_meter(&self, query: &MeterQuery) -> Result<UsageSeries>;

    /// Time zone applied to window boundaries, if the backend wants one.
    fn window_time_zone(&self) -> Option<String> {
        None
    }

    fn is_configured(&self) -> bool;
}

/// reqwest-backed metering client.
#[derive(Clone)]
pub struct MeteringClient {
    http: reqwest::Client,
    config: MeteringConfig,
}

impl MeteringClient {
    pub fn new(config: MeteringConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::internal(format!("Failed to create HTTP client: {e}")))?;

        health().metering.set_configured(config.is_configured());

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &MeteringConfig {
        &self.config
    }

    /// `{base}/api/v1/meters/{meter}/query?from=..&to=..&windowSize=..&subject=..&groupBy=..`
    pub fn query_url(&self, query: &MeterQuery) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| Error::internal(format!("Invalid metering base URL: {e}")))?;

        url.path_segments_mut()
            .map_err(|_| Error::internal("Metering base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["api", "v1", "meters", query.meter.as_str(), "query"]);

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("from", &query.range.from_iso())
                .append_pair("to", &query.range.to_iso())
                .append_pair("windowSize", query.window_size.as_str());
            if let Some(tz) = query.window_time_zone.as_deref() {
                pairs.append_pair("windowTimeZone", tz);
            }
            for subject in &query.subjects {
                pairs.append_pair("subject", subject);
            }
            for group in &query.group_by {
                pairs.append_pair("groupBy", group);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl UsageMeter for MeteringClient {
    async fn query_meter(&self, query: &MeterQuery) -> Result<UsageSeries> {
        let api_key = self.config.api_key()?;
        let url = self.query_url(query)?;

        debug!(meter = %query.meter, subjects = ?query.subjects, "Querying meter");

        let start = Instant::now();
        let result = self.http.get(url).bearer_auth(api_key).send().await;
        metrics()
            .upstream_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        let response = result.map_err(|e| {
            error!(meter = %query.meter, error = %e, "Metering request failed");
            metrics().transport_failures.inc();
            health().metering.set_unhealthy(e.to_string());
            Error::transport(format!("Failed to query usage data: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(meter = %query.meter, status = %status, body = %body, "Metering API rejected query");
            metrics().upstream_rejections.inc();
            if status.is_server_error() {
                health().metering.set_unhealthy(format!("metering returned {status}"));
            }
            return Err(Error::upstream(
                "query usage data",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
                body,
            ));
        }
        health().metering.set_healthy();

        match response.json::<UsageSeries>().await {
            Ok(series) => {
                debug!(rows = series.data.len(), "Meter query returned");
                Ok(series)
            }
            Err(e) => {
                warn!(meter = %query.meter, error = %e, "Unexpected meter query body, treating as empty");
                metrics().unexpected_envelopes.inc();
                Ok(UsageSeries::default())
            }
        }
    }

    fn window_time_zone(&self) -> Option<String> {
        Some(self.config.window_time_zone.clone())
    }

    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }
}
