//! Stale-while-revalidate data cache over [`ConsoleApi`].
//!
//! Reads serve fresh entries directly, serve stale entries immediately while
//! refetching in the background, and fetch synchronously once an entry has
//! been evicted. Successful mutations patch the cached consumer list in place
//! and mark it invalidated so the next read revalidates it.

use console_core::{
    Consumer, ConsumerMetadataInput, CreateConsumerRequest, CreatedConsumer, DeleteResponse,
    LimitForm, ModelUsageParams, UpdateConsumerRequest, UsageParams, UsageResponse, WindowSize,
};
use moka::future::Cache;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, info, warn};

use crate::api::ConsoleApi;
use crate::cache::{CachePolicy, CachedData, Entry, QueryKey};
use crate::error::{ClientError, Result};
use crate::retry::with_retry;

/// What the operator entered in the create or edit dialog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumerForm {
    pub name: String,
    pub description: Option<String>,
    pub limits: LimitForm,
}

struct Inner {
    api: Arc<dyn ConsoleApi>,
    cache: Cache<QueryKey, Entry>,
    policy: CachePolicy,
    revalidating: Mutex<HashSet<QueryKey>>,
    /// Bumped by every local list patch. A list fetch that started before a
    /// patch must not overwrite it.
    list_generation: AtomicU64,
}

impl Inner {
    async fn load(&self, key: &QueryKey) -> Result<CachedData> {
        match key {
            QueryKey::ConsumerList => {
                let list = self.api.list_consumers().await?;
                Ok(CachedData::Consumers(Arc::new(list.data)))
            }
            QueryKey::Usage {
                subject,
                metric,
                time_range,
                window_size,
            } => {
                let params = UsageParams {
                    subject: Some(subject.clone()),
                    metric: Some(metric.clone()),
                    time_range: Some(time_range.clone()),
                    window_size: Some(window_size.as_str().to_string()),
                };
                let usage = self.api.usage(&params).await?;
                Ok(CachedData::Usage(Arc::new(usage)))
            }
            QueryKey::ModelUsage {
                subject,
                time_range,
            } => {
                let params = ModelUsageParams {
                    subject: Some(subject.clone()),
                    time_range: Some(time_range.clone()),
                };
                let usage = self.api.model_usage(&params).await?;
                Ok(CachedData::Usage(Arc::new(usage)))
            }
        }
    }
}

/// Shared client-side cache. Cloning shares the same cache.
#[derive(Clone)]
pub struct ConsoleStore {
    inner: Arc<Inner>,
}

impl ConsoleStore {
    pub fn new(api: Arc<dyn ConsoleApi>, policy: CachePolicy) -> Self {
        let cache = Cache::builder()
            .max_capacity(policy.max_entries)
            .time_to_live(policy.retain_for)
            .build();

        Self {
            inner: Arc::new(Inner {
                api,
                cache,
                policy,
                revalidating: Mutex::new(HashSet::new()),
                list_generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.inner.policy
    }

    /// All consumers.
    pub async fn consumers(&self) -> Result<Arc<Vec<Consumer>>> {
        match self.read(QueryKey::ConsumerList).await? {
            CachedData::Consumers(list) => Ok(list),
            CachedData::Usage(_) => Err(mismatch(&QueryKey::ConsumerList)),
        }
    }

    /// Usage series for a subject. `None` while no subject is selected.
    pub async fn usage(
        &self,
        subject: &str,
        metric: &str,
        time_range: &str,
        window_size: WindowSize,
    ) -> Result<Option<Arc<UsageResponse>>> {
        if subject.trim().is_empty() {
            return Ok(None);
        }
        let key = QueryKey::usage(subject, metric, time_range, window_size);
        self.read_usage(key).await.map(Some)
    }

    /// Per-model token usage for a subject. `None` while no subject is selected.
    pub async fn model_usage(
        &self,
        subject: &str,
        time_range: &str,
    ) -> Result<Option<Arc<UsageResponse>>> {
        if subject.trim().is_empty() {
            return Ok(None);
        }
        let key = QueryKey::model_usage(subject, time_range);
        self.read_usage(key).await.map(Some)
    }

    /// Cached data for `key` without fetching or touching freshness.
    pub async fn peek(&self, key: &QueryKey) -> Option<CachedData> {
        self.inner.cache.get(key).await.map(|entry| entry.data)
    }

    /// Create a consumer. The issued key is returned once and not cached.
    pub async fn create_consumer(&self, form: ConsumerForm) -> Result<CreatedConsumer> {
        let request = CreateConsumerRequest {
            name: form.name,
            description: form.description,
            metadata: Some(ConsumerMetadataInput::from_form(form.limits)),
            ..Default::default()
        };

        let api = &self.inner.api;
        let created = with_retry(
            &self.inner.policy,
            self.inner.policy.mutation_retries,
            "create consumer",
            || api.create_consumer(&request),
        )
        .await?;

        info!(name = %created.consumer.name, "Consumer created");
        let consumer = created.consumer.clone();
        self.patch_consumers(move |list| list.push(consumer)).await;
        Ok(created)
    }

    /// Update `previous`. Limits left blank in `form` keep their previous value.
    pub async fn update_consumer(
        &self,
        previous: &Consumer,
        form: ConsumerForm,
    ) -> Result<Consumer> {
        let limits = form.limits.or_previous(previous.metadata.as_ref());
        let name = if form.name.trim().is_empty() {
            previous.name.clone()
        } else {
            form.name
        };
        let request = UpdateConsumerRequest {
            name: Some(name),
            metadata: Some(ConsumerMetadataInput::from_form(limits)),
        };

        let api = &self.inner.api;
        let updated = with_retry(
            &self.inner.policy,
            self.inner.policy.mutation_retries,
            "update consumer",
            || api.update_consumer(&previous.name, &request),
        )
        .await?;

        let mut updated = updated;
        if updated.id.is_empty() {
            updated.id = previous.id.clone();
        }

        info!(name = %updated.name, "Consumer updated");
        let replacement = updated.clone();
        self.patch_consumers(move |list| {
            for consumer in list.iter_mut().filter(|c| c.id == replacement.id) {
                *consumer = replacement.clone();
            }
        })
        .await;
        Ok(updated)
    }

    /// Delete by the consumer's name; the cached list drops it by id.
    pub async fn delete_consumer(&self, consumer: &Consumer) -> Result<DeleteResponse> {
        let api = &self.inner.api;
        let response = with_retry(
            &self.inner.policy,
            self.inner.policy.mutation_retries,
            "delete consumer",
            || api.delete_consumer(&consumer.name),
        )
        .await?;

        info!(name = %consumer.name, "Consumer deleted");
        let id = consumer.id.clone();
        self.patch_consumers(move |list| list.retain(|c| c.id != id))
            .await;
        Ok(response)
    }

    /// Window regained focus: refetch every cached query regardless of age.
    ///
    /// Returns how many queries refreshed. Failures keep the old entry.
    pub async fn on_focus(&self) -> usize {
        let keys: Vec<QueryKey> = self
            .inner
            .cache
            .iter()
            .map(|(key, _)| QueryKey::clone(&key))
            .collect();

        let mut refreshed = 0;
        for key in keys {
            match self.fetch(&key).await {
                Ok(_) => refreshed += 1,
                Err(e) => warn!(key = ?key, error = %e, "Focus refetch failed"),
            }
        }
        debug!(refreshed, "Focus refetch complete");
        refreshed
    }

    async fn read_usage(&self, key: QueryKey) -> Result<Arc<UsageResponse>> {
        match self.read(key.clone()).await? {
            CachedData::Usage(usage) => Ok(usage),
            CachedData::Consumers(_) => Err(mismatch(&key)),
        }
    }

    async fn read(&self, key: QueryKey) -> Result<CachedData> {
        match self.inner.cache.get(&key).await {
            Some(entry) if entry.is_fresh(&self.inner.policy) => {
                metrics().cache_hits.inc();
                Ok(entry.data)
            }
            Some(entry) => {
                metrics().cache_revalidations.inc();
                self.revalidate(key);
                Ok(entry.data)
            }
            None => {
                metrics().cache_misses.inc();
                self.fetch(&key).await
            }
        }
    }

    async fn fetch(&self, key: &QueryKey) -> Result<CachedData> {
        let inner = &self.inner;
        let generation = inner.list_generation.load(Ordering::SeqCst);
        let data = with_retry(&inner.policy, inner.policy.read_retries, "read", || {
            inner.load(key)
        })
        .await?;

        if *key == QueryKey::ConsumerList
            && inner.list_generation.load(Ordering::SeqCst) != generation
        {
            debug!("Consumer list patched during fetch, keeping the patched list");
            if let Some(entry) = inner.cache.get(key).await {
                return Ok(entry.data);
            }
            let entry = Entry {
                invalidated: true,
                ..Entry::new(data.clone())
            };
            inner.cache.insert(key.clone(), entry).await;
            return Ok(data);
        }

        inner.cache.insert(key.clone(), Entry::new(data.clone())).await;
        Ok(data)
    }

    /// Refetch `key` in the background unless a refetch is already running.
    fn revalidate(&self, key: QueryKey) {
        if !self.inner.revalidating.lock().insert(key.clone()) {
            return;
        }

        let store = self.clone();
        tokio::spawn(async move {
            if let Err(e) = store.fetch(&key).await {
                warn!(key = ?key, error = %e, "Background refetch failed, keeping stale data");
            }
            store.inner.revalidating.lock().remove(&key);
        });
    }

    /// Apply a local edit to the cached consumer list and mark it invalidated.
    async fn patch_consumers(&self, edit: impl FnOnce(&mut Vec<Consumer>)) {
        self.inner.list_generation.fetch_add(1, Ordering::SeqCst);
        let key = QueryKey::ConsumerList;
        let Some(entry) = self.inner.cache.get(&key).await else {
            return;
        };
        let CachedData::Consumers(list) = entry.data else {
            return;
        };

        let mut list = Vec::clone(&list);
        edit(&mut list);
        self.inner
            .cache
            .insert(
                key,
                Entry {
                    data: CachedData::Consumers(Arc::new(list)),
                    fetched_at: entry.fetched_at,
                    invalidated: true,
                },
            )
            .await;
    }
}

fn mismatch(key: &QueryKey) -> ClientError {
    ClientError::Decode(format!("cached data does not match {key:?}"))
}
