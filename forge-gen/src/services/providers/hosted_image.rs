//! Hosted diffusion-model image generator
//!
//! Calls a hosted text-to-image inference endpoint (stable-diffusion
//! style: JSON in, raw image bytes out). Only used when an API key is
//! configured; the tier controller falls back to the procedural renderer
//! on any failure here.

use super::{GeneratedImage, ImageGenerator, ProviderError};
use std::time::Duration;
use uuid::Uuid;

const REQUEST_TIMEOUT_SECS: u64 = 120;

const NEGATIVE_PROMPT: &str =
    "blurry, bad quality, distorted, multiple objects, busy background, text, watermark, logo";

/// Hosted inference API client for 2D concept images
pub struct HostedImageClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl HostedImageClient {
    /// Returns `None` when no endpoint or key is configured, so callers
    /// can skip this generator entirely.
    pub fn new(api_url: Option<String>, api_key: Option<String>) -> Option<Self> {
        let api_url = api_url.filter(|u| !u.trim().is_empty())?;
        let api_key = api_key.filter(|k| !k.trim().is_empty())?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .ok()?;

        Some(Self { http_client, api_url, api_key })
    }

    /// Wrap the user prompt into a clean product-render request so the
    /// output works as a downstream image-to-3D input.
    fn build_prompt(prompt: &str, refinement_notes: Option<&str>) -> String {
        let mut full = format!(
            "A clean 3D render of {prompt}, centered in frame, \
             plain white background, studio lighting, high quality, \
             single isolated object, product photography style, \
             no text, no watermarks, game asset style"
        );
        if let Some(notes) = refinement_notes {
            full.push_str(", ");
            full.push_str(notes);
        }
        full
    }
}

#[async_trait::async_trait]
impl ImageGenerator for HostedImageClient {
    fn name(&self) -> &'static str {
        "hosted"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        prompt: &str,
        refinement_notes: Option<&str>,
    ) -> Result<GeneratedImage, ProviderError> {
        let full_prompt = Self::build_prompt(prompt, refinement_notes);

        let payload = serde_json::json!({
            "inputs": full_prompt,
            "parameters": {
                "negative_prompt": NEGATIVE_PROMPT,
                "num_inference_steps": 25,
                "guidance_scale": 7.5,
                "width": 512,
                "height": 512,
            }
        });

        tracing::debug!(endpoint = %self.api_url, "Requesting hosted image generation");

        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?
            .to_vec();

        if bytes.is_empty() {
            return Err(ProviderError::Parse("empty image response".to_string()));
        }

        let filename = format!("hosted_{}.png", Uuid::new_v4().simple());
        Ok(GeneratedImage { bytes, remote_url: None, filename })
    }
}
