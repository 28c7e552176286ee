//! [`Processor`] that delegates each catalog item to an HTTP translation
//! service.
//!
//! The job payload carries the items to translate:
//!
//! ```json
//! { "item_ids": ["sku-1", 42] }
//! ```
//!
//! Items are sent one at a time as `POST {base_url}/translate`. The
//! cancellation token is checked before every item and raced against every
//! in-flight request.

use std::time::Duration;

use async_trait::async_trait;
use linguist_db::models::job::Job;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{ProcessError, Processor};
use crate::config::{env_or, env_required, ConfigError};
use crate::progress::ProgressReporter;

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Connection settings for the translation service.
#[derive(Debug, Clone)]
pub struct HttpProcessorConfig {
    /// Base URL, e.g. `http://translator:8080`.
    pub base_url: String,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl HttpProcessorConfig {
    /// Load from the environment.
    ///
    /// | Variable                   | Default    |
    /// |----------------------------|------------|
    /// | `TRANSLATION_API_URL`      | (required) |
    /// | `TRANSLATION_API_KEY`      | (none)     |
    /// | `TRANSLATION_TIMEOUT_SECS` | `60`       |
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env_required("TRANSLATION_API_URL")?;
        let api_key = std::env::var("TRANSLATION_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());
        let timeout_secs = env_or("TRANSLATION_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TranslationPayload {
    item_ids: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    catalog_id: &'a str,
    item_id: &'a serde_json::Value,
    from_locale: &'a str,
    to_locale: &'a str,
}

/// Extract the item ids from a job payload.
///
/// Ids may be strings or integers; anything else is rejected up front so
/// that a malformed job fails before any item is sent.
fn parse_item_ids(payload: &serde_json::Value) -> Result<Vec<serde_json::Value>, ProcessError> {
    let parsed: TranslationPayload = serde_json::from_value(payload.clone())
        .map_err(|e| ProcessError::InvalidPayload(e.to_string()))?;

    if let Some(bad) = parsed
        .item_ids
        .iter()
        .find(|id| !(id.is_string() || id.is_i64() || id.is_u64()))
    {
        return Err(ProcessError::InvalidPayload(format!(
            "item id must be a string or an integer, got {bad}"
        )));
    }
    Ok(parsed.item_ids)
}

/// Percentage reached after `done` of `total` items.
fn percent_after(done: usize, total: usize) -> i16 {
    if total == 0 {
        return 100;
    }
    ((done * 100) / total).min(100) as i16
}

/// Translates catalog items through a remote HTTP service.
pub struct HttpTranslationProcessor {
    client: reqwest::Client,
    config: HttpProcessorConfig,
}

impl HttpTranslationProcessor {
    pub fn new(config: HttpProcessorConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    async fn translate_item(
        &self,
        job: &Job,
        item_id: &serde_json::Value,
    ) -> Result<serde_json::Value, ProcessError> {
        let body = TranslateRequest {
            catalog_id: &job.catalog_id,
            item_id,
            from_locale: &job.from_locale,
            to_locale: &job.to_locale,
        };

        let mut request = self
            .client
            .post(format!("{}/translate", self.config.base_url))
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProcessError::Service(format!(
                "item {item_id}: {} {text}",
                status.as_u16()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Processor for HttpTranslationProcessor {
    async fn process(
        &self,
        job: &Job,
        progress: &ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, ProcessError> {
        let item_ids = parse_item_ids(&job.payload)?;
        let total = item_ids.len();
        let mut translated = Vec::with_capacity(total);

        for (index, item_id) in item_ids.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(ProcessError::Cancelled);
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(ProcessError::Cancelled),
                result = self.translate_item(job, item_id) => result?,
            };
            translated.push(result);

            progress
                .report(
                    percent_after(index + 1, total),
                    format!("Translated item {item_id} ({}/{total})", index + 1),
                )
                .await;
        }

        if total == 0 {
            progress.report(100, "No items to translate").await;
        }

        tracing::debug!(job_id = job.id, total, "Translation finished");
        Ok(serde_json::json!({
            "translated_items": total,
            "items": translated,
        }))
    }
}
