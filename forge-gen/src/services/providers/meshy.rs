//! Meshy image-to-3D job client
//!
//! Drives the Meshy v2 image-to-3d API: job creation returns an opaque
//! task id, completion arrives later via polling or webhook. All calls
//! carry a bounded retry envelope for rate limiting and transient 5xx.

use super::{JobStatus, ModelArtifacts, ModelJobClient, ProviderError};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_API_URL: &str = "https://api.meshy.ai/openapi/v2/image-to-3d";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const DOWNLOAD_TIMEOUT_SECS: u64 = 120;
const MAX_RETRIES: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Meshy API client
pub struct MeshyClient {
    http_client: reqwest::Client,
    api_key: Option<String>,
    api_url: String,
    webhook_url: Option<String>,
}

impl MeshyClient {
    pub fn new(
        api_key: Option<String>,
        api_url: Option<String>,
        webhook_url: Option<String>,
    ) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            webhook_url,
        })
    }

    fn require_key(&self) -> Result<&str, ProviderError> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            ProviderError::NotConfigured(
                "Meshy API key not set (FORGE_MODEL_API_KEY)".to_string(),
            )
        })
    }

    async fn post_json_with_retry(&self, url: &str, payload: &Value) -> Result<Value, ProviderError> {
        let key = self.require_key()?.to_string();
        let mut last_err = ProviderError::Network("request not attempted".to_string());

        for attempt in 0..MAX_RETRIES {
            let response = self
                .http_client
                .post(url)
                .bearer_auth(&key)
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .json(payload)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp
                            .json()
                            .await
                            .map_err(|e| ProviderError::Parse(e.to_string()));
                    }
                    let body = resp.text().await.unwrap_or_default();
                    last_err = ProviderError::Api(status.as_u16(), body);
                    if !is_retryable_status(status.as_u16()) {
                        return Err(last_err);
                    }
                }
                Err(e) => {
                    last_err = ProviderError::Network(e.to_string());
                    if !(e.is_timeout() || e.is_connect() || e.is_request()) {
                        return Err(last_err);
                    }
                }
            }

            if attempt + 1 < MAX_RETRIES {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
        }

        Err(last_err)
    }

    async fn get_json_with_retry(&self, url: &str) -> Result<Value, ProviderError> {
        let key = self.require_key()?.to_string();
        let mut last_err = ProviderError::Network("request not attempted".to_string());

        for attempt in 0..MAX_RETRIES {
            let response = self
                .http_client
                .get(url)
                .bearer_auth(&key)
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp
                            .json()
                            .await
                            .map_err(|e| ProviderError::Parse(e.to_string()));
                    }
                    let body = resp.text().await.unwrap_or_default();
                    last_err = ProviderError::Api(status.as_u16(), body);
                    if !is_retryable_status(status.as_u16()) {
                        return Err(last_err);
                    }
                }
                Err(e) => {
                    last_err = ProviderError::Network(e.to_string());
                }
            }

            if attempt + 1 < MAX_RETRIES {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
        }

        Err(last_err)
    }
}

#[async_trait::async_trait]
impl ModelJobClient for MeshyClient {
    fn name(&self) -> &'static str {
        "meshy"
    }

    fn is_available(&self) -> bool {
        self.api_key.as_deref().map(|k| !k.trim().is_empty()).unwrap_or(false)
    }

    async fn create_job(
        &self,
        image_url: &str,
        name: Option<&str>,
    ) -> Result<String, ProviderError> {
        let mut payload = serde_json::json!({
            "image_url": image_url,
            "enable_pbr": true,
            "art_style": "realistic",
        });
        if let Some(name) = name {
            payload["name"] = serde_json::json!(name);
        }
        if let Some(webhook_url) = &self.webhook_url {
            payload["webhook_url"] = serde_json::json!(webhook_url);
        }

        let response = self.post_json_with_retry(&self.api_url, &payload).await?;
        let task_id = parse_submit_response(&response)?;

        tracing::info!(task_id = %task_id, "Meshy job created");
        Ok(task_id)
    }

    async fn job_status(&self, task_id: &str) -> Result<JobStatus, ProviderError> {
        let url = format!("{}/{}", self.api_url, task_id);
        let response = self.get_json_with_retry(&url).await?;
        Ok(parse_status_response(&response))
    }

    async fn fetch_artifact(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        let mut last_err = ProviderError::Network("request not attempted".to_string());

        for attempt in 0..MAX_RETRIES {
            match self.http_client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp
                            .bytes()
                            .await
                            .map(|b| b.to_vec())
                            .map_err(|e| ProviderError::Network(e.to_string()));
                    }
                    last_err = ProviderError::Api(status.as_u16(), String::new());
                    if !is_retryable_status(status.as_u16()) {
                        return Err(last_err);
                    }
                }
                Err(e) => {
                    last_err = ProviderError::Network(e.to_string());
                }
            }

            if attempt + 1 < MAX_RETRIES {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
        }

        Err(last_err)
    }
}

fn is_retryable_status(code: u16) -> bool {
    matches!(code, 429 | 500 | 502 | 503 | 504)
}

fn backoff_delay(attempt: usize) -> Duration {
    Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(1u64 << attempt))
}

/// Extract the task id from a job-creation response (`{"result": "<id>"}`).
pub fn parse_submit_response(response: &Value) -> Result<String, ProviderError> {
    response
        .get("result")
        .and_then(|r| r.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            ProviderError::Parse(format!(
                "no task id in job-creation response: {}",
                serde_json::to_string(response).unwrap_or_default()
            ))
        })
}

/// Decode a poll response into the provider-agnostic `JobStatus`.
pub fn parse_status_response(response: &Value) -> JobStatus {
    let status = response
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("UNKNOWN")
        .to_string();

    let progress = response
        .get("progress")
        .and_then(|p| p.as_i64())
        .unwrap_or(0)
        .clamp(0, 100);

    let error = response
        .get("task_error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .or_else(|| response.get("error").and_then(|e| e.as_str()))
        .filter(|m| !m.is_empty())
        .map(|m| m.to_string());

    let result = parse_result_payload(response);
    let result = if result.is_empty() { None } else { Some(result) };

    JobStatus { status, progress, result, error }
}

/// Extract artifact URLs from a result payload (poll body or webhook
/// `result` field): `model_urls.{obj,fbx}` plus the first texture URL.
pub fn parse_result_payload(payload: &Value) -> ModelArtifacts {
    let model_urls = payload.get("model_urls");

    let obj_url = model_urls
        .and_then(|u| u.get("obj"))
        .and_then(|u| u.as_str())
        .map(|s| s.to_string());
    let fbx_url = model_urls
        .and_then(|u| u.get("fbx"))
        .and_then(|u| u.as_str())
        .map(|s| s.to_string());

    // texture_urls is either a plain list or a list of {base_color: url}
    let texture_url = payload.get("texture_urls").and_then(|t| match t {
        Value::Array(items) => items.first().and_then(|item| match item {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map
                .get("base_color")
                .and_then(|u| u.as_str())
                .map(|s| s.to_string()),
            _ => None,
        }),
        Value::String(s) => Some(s.clone()),
        _ => None,
    });

    ModelArtifacts { obj_url, fbx_url, texture_url }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_submit_response() {
        let json: Value = serde_json::from_str(r#"{"result":"018d2158-aaaa-bbbb"}"#).unwrap();
        assert_eq!(parse_submit_response(&json).unwrap(), "018d2158-aaaa-bbbb");
    }

    #[test]
    fn submit_without_task_id_is_parse_error() {
        let json: Value = serde_json::from_str(r#"{"message":"accepted"}"#).unwrap();
        assert!(parse_submit_response(&json).is_err());
    }

    #[test]
    fn parses_in_progress_status() {
        let json: Value = serde_json::from_str(r#"{"status":"IN_PROGRESS","progress":42}"#).unwrap();
        let status = parse_status_response(&json);
        assert_eq!(status.status, "IN_PROGRESS");
        assert_eq!(status.progress, 42);
        assert!(status.result.is_none());
        assert!(status.error.is_none());
    }

    #[test]
    fn parses_succeeded_status_with_artifacts() {
        let json: Value = serde_json::from_str(
            r#"{
                "status": "SUCCEEDED",
                "progress": 100,
                "model_urls": {
                    "obj": "https://assets.example/model.obj",
                    "fbx": "https://assets.example/model.fbx"
                },
                "texture_urls": [{"base_color": "https://assets.example/tex.png"}]
            }"#,
        )
        .unwrap();
        let status = parse_status_response(&json);
        assert_eq!(status.status, "SUCCEEDED");
        let result = status.result.unwrap();
        assert_eq!(result.obj_url.as_deref(), Some("https://assets.example/model.obj"));
        assert_eq!(result.fbx_url.as_deref(), Some("https://assets.example/model.fbx"));
        assert_eq!(result.texture_url.as_deref(), Some("https://assets.example/tex.png"));
    }

    #[test]
    fn parses_failed_status_with_task_error() {
        let json: Value = serde_json::from_str(
            r#"{"status":"FAILED","progress":50,"task_error":{"message":"content policy"}}"#,
        )
        .unwrap();
        let status = parse_status_response(&json);
        assert_eq!(status.status, "FAILED");
        assert_eq!(status.error.as_deref(), Some("content policy"));
    }

    #[test]
    fn texture_urls_as_plain_list() {
        let json: Value = serde_json::from_str(
            r#"{"model_urls":{"obj":"https://x/m.obj"},"texture_urls":["https://x/t.png"]}"#,
        )
        .unwrap();
        let artifacts = parse_result_payload(&json);
        assert_eq!(artifacts.texture_url.as_deref(), Some("https://x/t.png"));
    }

    #[test]
    fn retryable_statuses() {
        for code in [429u16, 500, 502, 503, 504] {
            assert!(is_retryable_status(code));
        }
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(404));
    }
}
