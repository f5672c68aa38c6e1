//! Mock upstreams for testing.

use async_trait::async_trait;
use axum::http::StatusCode;
use console_core::{
    Consumer, ConsumerLimits, ConsumerList, ConsumerMetadata, ConsumerPatch, CreatedConsumer,
    Error, MeterQuery, NewConsumer, Result, UpstreamMetadata, UsageSeries,
};
use gateway_client::ConsumerGateway;
use metering_client::UsageMeter;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// How a mock upstream should fail.
#[derive(Debug, Clone, PartialEq)]
pub enum MockFailure {
    /// Non-2xx with a raw body.
    Reject { status: u16, body: String },
    /// Connection-level failure.
    Transport,
}

impl MockFailure {
    pub fn reject(status: u16, body: impl Into<String>) -> Self {
        Self::Reject {
            status,
            body: body.into(),
        }
    }

    fn into_error(self, action: &'static str) -> Error {
        match self {
            Self::Reject { status, body } => {
                let reason = StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or_default();
                Error::upstream(action, status, reason, body)
            }
            Self::Transport => Error::transport(format!("Failed to {action}: connection refused")),
        }
    }
}

fn stored_metadata(metadata: &UpstreamMetadata) -> ConsumerMetadata {
    ConsumerMetadata {
        limits: Some(ConsumerLimits {
            tokens: Some(metadata.limits.tokens),
            requests: Some(metadata.limits.requests),
            time_window_minutes: Some(metadata.limits.time_window_minutes),
            budget: Some(metadata.limits.budget),
        }),
        model: Some(metadata.model.clone()),
        extra: Default::default(),
    }
}

/// In-memory gateway that records every upstream-bound request.
///
/// Implements the same `ConsumerGateway` trait as `GatewayClient`, so the
/// real router runs unchanged against it.
#[derive(Clone)]
pub struct MockGateway {
    consumers: Arc<Mutex<Vec<Consumer>>>,
    created: Arc<Mutex<Vec<NewConsumer>>>,
    patches: Arc<Mutex<Vec<ConsumerPatch>>>,
    deleted: Arc<Mutex<Vec<String>>>,
    list_calls: Arc<AtomicUsize>,
    failure: Arc<Mutex<Option<MockFailure>>>,
    issue_keys: Arc<Mutex<bool>>,
    configured: bool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            consumers: Arc::new(Mutex::new(Vec::new())),
            created: Arc::new(Mutex::new(Vec::new())),
            patches: Arc::new(Mutex::new(Vec::new())),
            deleted: Arc::new(Mutex::new(Vec::new())),
            list_calls: Arc::new(AtomicUsize::new(0)),
            failure: Arc::new(Mutex::new(None)),
            issue_keys: Arc::new(Mutex::new(true)),
            configured: true,
        }
    }

    /// A gateway with no API key: every operation fails before recording.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn seed(&self, consumers: Vec<Consumer>) {
        *self.consumers.lock() = consumers;
    }

    pub fn consumers(&self) -> Vec<Consumer> {
        self.consumers.lock().clone()
    }

    /// Create bodies the gateway received.
    pub fn created(&self) -> Vec<NewConsumer> {
        self.created.lock().clone()
    }

    /// Patch bodies the gateway received.
    pub fn patches(&self) -> Vec<ConsumerPatch> {
        self.patches.lock().clone()
    }

    /// Names the gateway was asked to delete.
    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of requests that reached the mock.
    pub fn request_count(&self) -> usize {
        self.list_calls() + self.created.lock().len() + self.patches.lock().len() + self.deleted.lock().len()
    }

    pub fn fail_with(&self, failure: MockFailure) {
        *self.failure.lock() = Some(failure);
    }

    pub fn clear_failure(&self) {
        *self.failure.lock() = None;
    }

    /// Whether create responses carry an `apiKeys` entry.
    pub fn set_issue_keys(&self, issue: bool) {
        *self.issue_keys.lock() = issue;
    }

    fn check(&self, action: &'static str) -> Result<()> {
        if !self.configured {
            return Err(Error::NotConfigured("API key"));
        }
        match self.failure.lock().clone() {
            Some(failure) => Err(failure.into_error(action)),
            None => Ok(()),
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConsumerGateway for MockGateway {
    async fn list_consumers(&self) -> Result<ConsumerList> {
        if !self.configured {
            return Err(Error::NotConfigured("API key"));
        }
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check("fetch consumers")?;

        Ok(ConsumerList {
            data: self.consumers(),
            ..ConsumerList::empty()
        })
    }

    async fn create_consumer(&self, body: &NewConsumer) -> Result<CreatedConsumer> {
        if !self.configured {
            return Err(Error::NotConfigured("API key"));
        }
        self.created.lock().push(body.clone());
        self.check("create consumer")?;

        let consumer = Consumer {
            id: Uuid::new_v4().to_string(),
            name: body.name.clone(),
            created_on: Some(chrono::Utc::now().to_rfc3339()),
            description: Some(body.description.clone()),
            metadata: Some(stored_metadata(&body.metadata)),
            ..Default::default()
        };
        self.consumers.lock().push(consumer.clone());

        let api_key = (*self.issue_keys.lock()).then(|| format!("zpka_{}", Uuid::new_v4().simple()));
        Ok(CreatedConsumer { consumer, api_key })
    }

    async fn update_consumer(&self, patch: &ConsumerPatch) -> Result<Consumer> {
        if !self.configured {
            return Err(Error::NotConfigured("API key"));
        }
        self.patches.lock().push(patch.clone());
        self.check("update consumer")?;

        let mut consumers = self.consumers.lock();
        let consumer = consumers
            .iter_mut()
            .find(|c| c.name == patch.name)
            .ok_or_else(|| MockFailure::reject(404, "Consumer not found").into_error("update consumer"))?;
        consumer.metadata = Some(stored_metadata(&patch.metadata));
        consumer.updated_on = Some(chrono::Utc::now().to_rfc3339());
        Ok(consumer.clone())
    }

    async fn delete_consumer(&self, consumer_name: &str) -> Result<()> {
        if !self.configured {
            return Err(Error::NotConfigured("API key"));
        }
        self.deleted.lock().push(consumer_name.to_string());
        self.check("delete consumer")?;

        self.consumers.lock().retain(|c| c.name != consumer_name);
        Ok(())
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

/// In-memory metering API that records every meter query.
#[derive(Clone)]
pub struct MockMetering {
    queries: Arc<Mutex<Vec<MeterQuery>>>,
    series: Arc<Mutex<UsageSeries>>,
    failure: Arc<Mutex<Option<MockFailure>>>,
    configured: bool,
}

impl MockMetering {
    pub fn new() -> Self {
        Self {
            queries: Arc::new(Mutex::new(Vec::new())),
            series: Arc::new(Mutex::new(UsageSeries::default())),
            failure: Arc::new(Mutex::new(None)),
            configured: true,
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    /// Series returned by every query.
    pub fn respond_with(&self, series: UsageSeries) {
        *self.series.lock() = series;
    }

    pub fn queries(&self) -> Vec<MeterQuery> {
        self.queries.lock().clone()
    }

    pub fn last_query(&self) -> Option<MeterQuery> {
        self.queries.lock().last().cloned()
    }

    pub fn fail_with(&self, failure: MockFailure) {
        *self.failure.lock() = Some(failure);
    }
}

impl Default for MockMetering {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageMeter for MockMetering {
    async fn query_meter(&self, query: &MeterQuery) -> Result<UsageSeries> {
        if !self.configured {
            return Err(Error::NotConfigured("Metering API key"));
        }
        self.queries.lock().push(query.clone());
        if let Some(failure) = self.failure.lock().clone() {
            return Err(failure.into_error("query usage data"));
        }
        Ok(self.series.lock().clone())
    }

    fn window_time_zone(&self) -> Option<String> {
        Some("UTC".to_string())
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_gateway_records_and_fails() {
        let gateway = MockGateway::new();
        gateway.fail_with(MockFailure::reject(409, "conflict"));

        let err = gateway.delete_consumer("a").await.unwrap_err();
        assert_eq!(err.http_status(), 409);
        assert_eq!(err.details(), Some("conflict"));
        assert_eq!(gateway.deleted(), vec!["a".to_string()]);

        gateway.clear_failure();
        assert!(gateway.delete_consumer("a").await.is_ok());
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_records_nothing() {
        let gateway = MockGateway::unconfigured();
        let err = gateway.list_consumers().await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
        assert_eq!(gateway.request_count(), 0);
    }
}
