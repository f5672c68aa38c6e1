//! Consumer resource model.
//!
//! Three layers of shape live here:
//! - what the gateway returns (`Consumer`, `ConsumerList`)
//! - what the console accepts (`CreateConsumerRequest`, `UpdateConsumerRequest`)
//! - what the gateway accepts (`NewConsumer`, `ConsumerPatch`)
//!
//! `name` is the gateway's key for update/delete; `id` is only stable
//! identity for the console's cache.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::limits::{
    normalize_limits, LimitForm, UpstreamMetadata, CREATE_DEFAULTS, UPDATE_DEFAULTS,
};
use crate::name::normalize_name;

/// Page size used when listing consumers.
pub const CONSUMER_PAGE_SIZE: u32 = 1000;

/// Limits as stored upstream. Everything is optional on read.
///
/// Records written by older tools may hold numbers as strings or floats;
/// anything that is not a usable non-negative number reads as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerLimits {
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub tokens: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub requests: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_window_minutes: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient_amount",
        skip_serializing_if = "Option::is_none"
    )]
    pub budget: Option<f64>,
}

fn loose_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (n.is_finite() && n >= 0.0).then_some(n)
}

fn loose_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) if n.is_u64() => n.as_u64(),
        _ => loose_number(value).map(|n| n.round() as u64),
    }
}

fn lenient_count<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(loose_count))
}

fn lenient_amount<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(loose_number))
}

fn page_number(value: Option<&Value>) -> Option<u32> {
    value
        .and_then(loose_count)
        .and_then(|n| u32::try_from(n).ok())
}

fn lenient_offset<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(page_number(value.as_ref()).unwrap_or(0))
}

fn lenient_page_size<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(page_number(value.as_ref()).unwrap_or(CONSUMER_PAGE_SIZE))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ConsumerLimits>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Unknown metadata keys, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A rate-limited application known to the gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consumer {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ConsumerMetadata>,
}

impl Consumer {
    pub fn limits(&self) -> Option<&ConsumerLimits> {
        self.metadata.as_ref().and_then(|m| m.limits.as_ref())
    }

    /// What a patch leaves behind upstream, for when the gateway's echo of
    /// a committed update cannot be read. `id` stays empty.
    pub fn from_patch(patch: &ConsumerPatch) -> Self {
        let limits = patch.metadata.limits;
        Self {
            name: patch.name.clone(),
            metadata: Some(ConsumerMetadata {
                limits: Some(ConsumerLimits {
                    tokens: Some(limits.tokens),
                    requests: Some(limits.requests),
                    time_window_minutes: Some(limits.time_window_minutes),
                    budget: Some(limits.budget),
                }),
                model: Some(patch.metadata.model.clone()),
                extra: Map::new(),
            }),
            ..Default::default()
        }
    }
}

/// The gateway's list envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerList {
    pub data: Vec<Consumer>,
    #[serde(default, deserialize_with = "lenient_offset")]
    pub offset: u32,
    #[serde(default = "default_page_size", deserialize_with = "lenient_page_size")]
    pub limit: u32,
}

/// A list record that could not be read as a [`Consumer`].
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub index: usize,
    pub id: Option<String>,
    pub reason: String,
}

/// A decoded list envelope plus the records that were left out of it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedList {
    pub list: ConsumerList,
    pub skipped: Vec<SkippedRecord>,
}

fn default_page_size() -> u32 {
    CONSUMER_PAGE_SIZE
}

impl ConsumerList {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            offset: 0,
            limit: CONSUMER_PAGE_SIZE,
        }
    }

    /// Unwrap a raw list envelope record by record. `None` if it does not
    /// carry a `data` array; unreadable records are skipped, not fatal.
    pub fn from_envelope(envelope: Value) -> Option<DecodedList> {
        let Value::Object(mut envelope) = envelope else {
            return None;
        };
        let Some(Value::Array(records)) = envelope.remove("data") else {
            return None;
        };

        let mut data = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();
        for (index, record) in records.into_iter().enumerate() {
            let id = record.get("id").and_then(Value::as_str).map(str::to_string);
            match serde_json::from_value::<Consumer>(record) {
                Ok(consumer) => data.push(consumer),
                Err(e) => skipped.push(SkippedRecord {
                    index,
                    id,
                    reason: e.to_string(),
                }),
            }
        }

        Some(DecodedList {
            list: Self {
                data,
                offset: page_number(envelope.get("offset")).unwrap_or(0),
                limit: page_number(envelope.get("limit")).unwrap_or(CONSUMER_PAGE_SIZE),
            },
            skipped,
        })
    }
}

/// `metadata` as the console accepts it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumerMetadataInput {
    #[serde(default)]
    pub limits: LimitForm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ConsumerMetadataInput {
    pub fn from_form(form: LimitForm) -> Self {
        let model = form.model.clone();
        Self {
            limits: form,
            model,
        }
    }

    pub fn into_form(self) -> LimitForm {
        LimitForm {
            model: self.model,
            ..self.limits
        }
    }
}

/// Body of `POST /api/consumers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateConsumerRequest {
    #[serde(default)]
    pub name: String,
    /// Used as the name when `name` is blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ConsumerMetadataInput>,
}

impl CreateConsumerRequest {
    /// Normalize into the gateway create body.
    pub fn into_upstream(self) -> Result<NewConsumer> {
        let raw_name = if self.name.trim().is_empty() {
            self.id.unwrap_or(self.name)
        } else {
            self.name
        };
        let form = self.metadata.map(ConsumerMetadataInput::into_form).unwrap_or_default();

        Ok(NewConsumer {
            name: normalize_name(&raw_name),
            managers: self.managers.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
            metadata: normalize_limits(&form, &CREATE_DEFAULTS)?,
        })
    }
}

/// Body of `PATCH /api/consumers/:consumer_name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateConsumerRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ConsumerMetadataInput>,
}

impl UpdateConsumerRequest {
    /// Normalize into the gateway patch body.
    ///
    /// The body name wins over the path name; the result is both the upstream
    /// path segment and the `name` field, which the gateway always requires.
    pub fn into_upstream(self, consumer_name: &str) -> Result<ConsumerPatch> {
        let raw_name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| consumer_name.to_string());
        let form = self.metadata.map(ConsumerMetadataInput::into_form).unwrap_or_default();

        Ok(ConsumerPatch {
            name: normalize_name(&raw_name),
            metadata: normalize_limits(&form, &UPDATE_DEFAULTS)?,
        })
    }
}

/// Create body sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConsumer {
    pub name: String,
    pub managers: Vec<String>,
    pub description: String,
    pub tags: Map<String, Value>,
    pub metadata: UpstreamMetadata,
}

/// Patch body sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerPatch {
    pub name: String,
    pub metadata: UpstreamMetadata,
}

/// One entry of the gateway's `apiKeys` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiKeyRecord {
    #[serde(default)]
    pub key: Option<String>,
}

/// Gateway response to a create with key issuance.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamCreatedConsumer {
    #[serde(flatten)]
    pub consumer: Consumer,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyRecord>,
}

/// Outcome of key issuance on create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuedKey {
    Issued { key: String },
    NotIssued,
}

impl IssuedKey {
    /// The first record's key, if it has a non-empty one.
    pub fn from_records(records: &[ApiKeyRecord]) -> Self {
        match records.first().and_then(|r| r.key.as_deref()) {
            Some(key) if !key.is_empty() => Self::Issued {
                key: key.to_string(),
            },
            _ => Self::NotIssued,
        }
    }

    pub fn into_key(self) -> Option<String> {
        match self {
            Self::Issued { key } => Some(key),
            Self::NotIssued => None,
        }
    }
}

/// Response of `POST /api/consumers`. The key is shown once and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedConsumer {
    pub consumer: Consumer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl From<UpstreamCreatedConsumer> for CreatedConsumer {
    fn from(created: UpstreamCreatedConsumer) -> Self {
        Self {
            api_key: IssuedKey::from_records(&created.api_keys).into_key(),
            consumer: created.consumer,
        }
    }
}

/// Response of `DELETE /api/consumers/:consumer_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

impl DeleteResponse {
    pub fn deleted(consumer_name: &str) -> Self {
        Self {
            success: true,
            message: format!("Consumer {consumer_name} deleted successfully"),
        }
    }
}
