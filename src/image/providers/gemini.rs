//! Google image service: Imagen for text-to-image, Gemini for edits.

use crate::config::StudioConfig;
use crate::error::{parse_retry_after, sanitize_error_message, Result, StudioError};
use crate::image::provider::ImageService;
use crate::image::types::{GeneratedImage, GenerationConfig, ImageData};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Output type requested from Imagen.
const GENERATION_MIME_TYPE: &str = "image/jpeg";

const NO_GENERATED_IMAGES: &str = "The API did not return any images. The prompt might be too restrictive or violate safety policies.";
const NO_EDIT_CONTENT: &str = "The API did not return any content. The prompt might be too restrictive or violate safety policies.";
const NO_EDITED_IMAGES: &str = "The API did not return any images in the response.";

/// Builder for GeminiService.
#[derive(Debug, Clone)]
pub struct GeminiServiceBuilder {
    config: StudioConfig,
}

impl GeminiServiceBuilder {
    /// Creates a builder seeded from the environment.
    pub fn new() -> Self {
        Self {
            config: StudioConfig::from_env(),
        }
    }

    /// Creates a builder from an already-resolved config.
    pub fn from_config(config: StudioConfig) -> Self {
        Self { config }
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY`, then `API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Overrides the API host.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Sets the text-to-image model.
    pub fn generation_model(mut self, model: impl Into<String>) -> Self {
        self.config.generation_model = model.into();
        self
    }

    /// Sets the image editing model.
    pub fn edit_model(mut self, model: impl Into<String>) -> Self {
        self.config.edit_model = model.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Builds the service, resolving the API key.
    pub fn build(self) -> Result<GeminiService> {
        let api_key = self.config.require_api_key()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .build()?;

        Ok(GeminiService {
            client,
            api_key,
            base_url: self.config.base_url.trim_end_matches('/').to_string(),
            generation_model: self.config.generation_model,
            edit_model: self.config.edit_model,
        })
    }
}

impl Default for GeminiServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Image service backed by Google's Generative Language API.
pub struct GeminiService {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    generation_model: String,
    edit_model: String,
}

impl GeminiService {
    /// Creates a new `GeminiServiceBuilder`.
    pub fn builder() -> GeminiServiceBuilder {
        GeminiServiceBuilder::new()
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<R> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ImageService for GeminiService {
    async fn generate_images(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<Vec<GeneratedImage>> {
        let start = Instant::now();
        let url = self.model_url(&self.generation_model, "predict");
        let body = ImagenRequest::new(prompt, config);

        tracing::debug!(
            model = %self.generation_model,
            count = config.number_of_images(),
            aspect_ratio = %config.aspect_ratio(),
            "requesting image generation"
        );

        let response: ImagenResponse = self.post(&url, &body).await?;
        let images = response.into_images()?;

        tracing::debug!(
            images = images.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "image generation complete"
        );
        Ok(images)
    }

    async fn edit_image(&self, prompt: &str, image: &ImageData) -> Result<Vec<GeneratedImage>> {
        let start = Instant::now();
        let url = self.model_url(&self.edit_model, "generateContent");
        let body = GeminiRequest::edit(prompt, image);

        tracing::debug!(
            model = %self.edit_model,
            mime_type = %image.mime_type,
            "requesting image edit"
        );

        let response: GeminiResponse = self.post(&url, &body).await?;
        let images = response.into_images()?;

        tracing::debug!(
            images = images.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "image edit complete"
        );
        Ok(images)
    }

    fn name(&self) -> &str {
        "Google Gemini"
    }
}

fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> StudioError {
    let text = sanitize_error_message(text);
    if status == 402 {
        return StudioError::Billing(
            "Gemini billing issue: enable billing at https://aistudio.google.com".into(),
        );
    }
    if status == 404 {
        return StudioError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        );
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(Duration::from_secs);
        return StudioError::RateLimited { retry_after };
    }
    if status == 401 || status == 403 {
        return StudioError::Auth(text);
    }
    let lower = text.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return StudioError::ContentBlocked(text);
    }
    StudioError::Api {
        status,
        message: text,
    }
}

// Imagen `:predict` request/response types
#[derive(Debug, Serialize)]
struct ImagenRequest {
    instances: Vec<ImagenInstance>,
    parameters: ImagenParameters,
}

#[derive(Debug, Serialize)]
struct ImagenInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenParameters {
    sample_count: u8,
    aspect_ratio: &'static str,
    output_options: ImagenOutputOptions,
    include_rai_reason: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenOutputOptions {
    mime_type: &'static str,
}

impl ImagenRequest {
    fn new(prompt: &str, config: &GenerationConfig) -> Self {
        Self {
            instances: vec![ImagenInstance {
                prompt: prompt.to_string(),
            }],
            parameters: ImagenParameters {
                sample_count: config.number_of_images(),
                aspect_ratio: config.aspect_ratio().as_str(),
                output_options: ImagenOutputOptions {
                    mime_type: GENERATION_MIME_TYPE,
                },
                include_rai_reason: true,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ImagenResponse {
    #[serde(default)]
    predictions: Vec<ImagenPrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagenPrediction {
    #[serde(default)]
    bytes_base64_encoded: Option<String>,
    #[serde(default)]
    rai_filtered_reason: Option<String>,
}

impl ImagenResponse {
    fn into_images(self) -> Result<Vec<GeneratedImage>> {
        let mut filtered = None;
        let mut images = Vec::with_capacity(self.predictions.len());

        for prediction in self.predictions {
            match prediction.bytes_base64_encoded {
                Some(bytes) if !bytes.is_empty() => {
                    images.push(GeneratedImage::from_base64(GENERATION_MIME_TYPE, &bytes));
                }
                _ => {
                    if let Some(reason) = prediction.rai_filtered_reason {
                        filtered = Some(reason);
                    }
                }
            }
        }

        if images.is_empty() {
            return Err(match filtered {
                Some(reason) => StudioError::ContentBlocked(reason),
                None => StudioError::NoImages(NO_GENERATED_IMAGES.into()),
            });
        }
        Ok(images)
    }
}

// Gemini `:generateContent` request/response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - can be text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<&'static str>,
}

impl GeminiRequest {
    fn edit(prompt: &str, image: &ImageData) -> Self {
        // Image first, then the instruction
        let parts = vec![
            GeminiRequestPart::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: image.data.clone(),
                },
            },
            GeminiRequestPart::Text {
                text: prompt.to_string(),
            },
        ];

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE", "TEXT"],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Option<Vec<GeminiPartResponse>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GeminiResponse {
    fn into_images(self) -> Result<Vec<GeneratedImage>> {
        // Blocked prompts come back as HTTP 200
        if let Some(feedback) = self.prompt_feedback {
            if let Some(reason) = feedback.block_reason {
                let msg = feedback
                    .block_reason_message
                    .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
                return Err(StudioError::ContentBlocked(msg));
            }
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| StudioError::NoImages(NO_EDIT_CONTENT.into()))?;

        if let Some(ref finish_reason) = candidate.finish_reason {
            match finish_reason.as_str() {
                "SAFETY"
                | "IMAGE_SAFETY"
                | "IMAGE_PROHIBITED_CONTENT"
                | "IMAGE_RECITATION"
                | "RECITATION"
                | "PROHIBITED_CONTENT"
                | "BLOCKLIST" => {
                    return Err(StudioError::ContentBlocked(format!(
                        "Content blocked by Gemini safety filter: {}",
                        finish_reason
                    )));
                }
                _ => {}
            }
        }

        let parts = candidate
            .content
            .and_then(|c| c.parts)
            .ok_or_else(|| StudioError::NoImages(NO_EDIT_CONTENT.into()))?;

        let images: Vec<GeneratedImage> = parts
            .into_iter()
            .filter_map(|part| {
                if let Some(text) = part.text {
                    tracing::debug!(%text, "model returned text alongside edit");
                }
                part.inline_data
            })
            .map(|inline| GeneratedImage::from_base64(&inline.mime_type, &inline.data))
            .collect();

        if images.is_empty() {
            return Err(StudioError::NoImages(NO_EDITED_IMAGES.into()));
        }
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::types::AspectRatio;
    use reqwest::header::HeaderMap;

    fn service() -> GeminiService {
        GeminiServiceBuilder::from_config(StudioConfig::new())
            .api_key("test-key")
            .base_url("http://localhost:8080/")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_key() {
        let result = GeminiServiceBuilder::from_config(StudioConfig::new()).build();
        assert!(matches!(result, Err(StudioError::Auth(_))));
    }

    #[test]
    fn test_model_urls() {
        let service = service();
        assert_eq!(
            service.model_url(&service.generation_model, "predict"),
            "http://localhost:8080/v1beta/models/imagen-4.0-generate-001:predict"
        );
        assert_eq!(
            service.model_url(&service.edit_model, "generateContent"),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[test]
    fn test_imagen_request_serialization() {
        let config = GenerationConfig::new(3, AspectRatio::Widescreen).unwrap();
        let json = serde_json::to_value(ImagenRequest::new("A lighthouse", &config)).unwrap();

        assert_eq!(json["instances"][0]["prompt"], "A lighthouse");
        assert_eq!(json["parameters"]["sampleCount"], 3);
        assert_eq!(json["parameters"]["aspectRatio"], "16:9");
        assert_eq!(json["parameters"]["outputOptions"]["mimeType"], "image/jpeg");
    }

    #[test]
    fn test_imagen_response_to_data_urls() {
        let json = r#"{
            "predictions": [
                {"bytesBase64Encoded": "AAAA", "mimeType": "image/jpeg"},
                {"bytesBase64Encoded": "BBBB", "mimeType": "image/jpeg"}
            ]
        }"#;
        let resp: ImagenResponse = serde_json::from_str(json).unwrap();
        let images = resp.into_images().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url(), "data:image/jpeg;base64,AAAA");
        assert_eq!(images[1].url(), "data:image/jpeg;base64,BBBB");
    }

    #[test]
    fn test_imagen_empty_response() {
        let resp: ImagenResponse = serde_json::from_str("{}").unwrap();
        let err = resp.into_images().unwrap_err();
        assert!(matches!(err, StudioError::NoImages(_)));
        assert!(err.to_string().contains("did not return any images"));
    }

    #[test]
    fn test_imagen_all_filtered() {
        let json = r#"{"predictions": [{"raiFilteredReason": "Filtered for violence"}]}"#;
        let resp: ImagenResponse = serde_json::from_str(json).unwrap();
        let err = resp.into_images().unwrap_err();
        assert!(matches!(err, StudioError::ContentBlocked(ref r) if r == "Filtered for violence"));
    }

    #[test]
    fn test_edit_request_puts_image_before_text() {
        let image = ImageData::from_bytes(b"img", "image/png");
        let json = serde_json::to_value(GeminiRequest::edit("Add a hat", &image)).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "aW1n");
        assert_eq!(parts[1]["text"], "Add a hat");
        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn test_edit_response_keeps_every_image_part() {
        let json = r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here you go"},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}},
                        {"inlineData": {"mimeType": "image/webp", "data": "UklGRg=="}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let images = resp.into_images().unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url(), "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(images[1].mime_type(), "image/webp");
    }

    #[test]
    fn test_edit_response_without_candidates() {
        let resp: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        let err = resp.into_images().unwrap_err();
        assert!(err.to_string().contains("did not return any content"));
    }

    #[test]
    fn test_edit_response_text_only() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "I can't do that"}]}}]}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let err = resp.into_images().unwrap_err();
        assert_eq!(err.to_string(), NO_EDITED_IMAGES);
    }

    #[test]
    fn test_edit_response_prompt_blocked() {
        let json = r#"{
            "candidates": [],
            "promptFeedback": {
                "blockReason": "SAFETY",
                "blockReasonMessage": "Prompt was blocked due to safety"
            }
        }"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let err = resp.into_images().unwrap_err();
        assert!(
            matches!(err, StudioError::ContentBlocked(ref m) if m == "Prompt was blocked due to safety")
        );
    }

    #[test]
    fn test_edit_response_safety_finish_reason() {
        let json = r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            resp.into_images(),
            Err(StudioError::ContentBlocked(_))
        ));
    }

    #[test]
    fn test_rate_limit_carries_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::RETRY_AFTER,
            reqwest::header::HeaderValue::from_static("30"),
        );
        match parse_error(429, "Resource has been exhausted", &headers) {
            StudioError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(30)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_classification() {
        let headers = HeaderMap::new();
        assert!(matches!(
            parse_error(401, "bad key", &headers),
            StudioError::Auth(_)
        ));
        assert!(matches!(
            parse_error(402, "", &headers),
            StudioError::Billing(_)
        ));
        assert!(matches!(
            parse_error(404, "", &headers),
            StudioError::InvalidRequest(_)
        ));
        assert!(matches!(
            parse_error(429, "", &headers),
            StudioError::RateLimited { retry_after: None }
        ));
        assert!(matches!(
            parse_error(400, "Request blocked by safety settings", &headers),
            StudioError::ContentBlocked(_)
        ));
        assert!(matches!(
            parse_error(500, "boom", &headers),
            StudioError::Api { status: 500, .. }
        ));
    }
}
