//! Gemini (Google) provider for prompt analysis, image generation and editing.

use crate::credentials::{ApiKeyStore, CredentialSource};
use crate::error::{parse_retry_after, sanitize_error_message, Result, StudioError};
use crate::image::provider::ImageProvider;
use crate::image::request::{AnalysisRequest, EditRequest, GenerationRequest};
use crate::image::types::{GeneratedImage, GenerationMetadata, ImageFormat, PromptPart};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Text/vision model used to fuse the inputs into one prompt.
pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-3-pro-preview";

/// Thinking budget granted to the analysis model.
pub const DEFAULT_THINKING_BUDGET: u32 = 1024;

/// Longest refusal text carried into an error, in characters.
const REFUSAL_EXCERPT_CHARS: usize = 150;

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Nano Banana - Gemini 2.5 Flash Image (fast, economical).
    NanoBanana,
    /// Nano Banana 2 - Gemini 3.1 Flash Image.
    NanoBanana2,
    /// Nano Banana Pro - Gemini 3 Pro Image (highest quality).
    #[default]
    NanoBananaPro,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NanoBanana => "gemini-2.5-flash-image",
            Self::NanoBanana2 => "gemini-3.1-flash-image-preview",
            Self::NanoBananaPro => "gemini-3-pro-image-preview",
        }
    }
}

/// Builder for GeminiProvider.
#[derive(Clone)]
pub struct GeminiProviderBuilder {
    credentials: Option<Arc<dyn CredentialSource>>,
    model: GeminiModel,
    analysis_model: String,
    thinking_budget: u32,
    base_url: String,
}

impl Default for GeminiProviderBuilder {
    fn default() -> Self {
        Self {
            credentials: None,
            model: GeminiModel::default(),
            analysis_model: DEFAULT_ANALYSIS_MODEL.to_string(),
            thinking_budget: DEFAULT_THINKING_BUDGET,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl GeminiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a fixed API key. Without one, keys come from the environment.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.credentials = Some(Arc::new(ApiKeyStore::with_key(key)));
        self
    }

    /// Shares a credential source, typically the one the studio checks.
    pub fn credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the Gemini image model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Sets the text/vision model used for prompt analysis.
    pub fn analysis_model(mut self, model: impl Into<String>) -> Self {
        self.analysis_model = model.into();
        self
    }

    /// Sets the analysis thinking budget in tokens.
    pub fn thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = budget;
        self
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builds the provider.
    pub fn build(self) -> Result<GeminiProvider> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fusion-studio/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(GeminiProvider {
            client,
            credentials: self
                .credentials
                .unwrap_or_else(|| Arc::new(ApiKeyStore::from_env())),
            model: self.model,
            analysis_model: self.analysis_model,
            thinking_budget: self.thinking_budget,
            base_url: self.base_url,
        })
    }
}

/// Gemini provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
    model: GeminiModel,
    analysis_model: String,
    thinking_budget: u32,
    base_url: String,
}

impl GeminiProvider {
    /// Creates a new `GeminiProviderBuilder`.
    pub fn builder() -> GeminiProviderBuilder {
        GeminiProviderBuilder::new()
    }

    async fn api_key(&self) -> Result<String> {
        self.credentials
            .api_key()
            .await
            .ok_or_else(|| StudioError::Auth("no API key configured".into()))
    }

    async fn generate_content(&self, model: &str, body: &GeminiRequest) -> Result<GeminiResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let api_key = self.api_key().await?;

        tracing::debug!(model, parts = body.part_count(), "sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &text, &headers));
        }

        Ok(response.json().await?)
    }

    fn metadata(&self, start: Instant, prompt: &str) -> GenerationMetadata {
        GenerationMetadata {
            model: Some(self.model.as_str().to_string()),
            duration_ms: Some(start.elapsed().as_millis() as u64),
            prompt: Some(prompt.to_string()),
        }
    }
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<String> {
        let body = GeminiRequest::analysis(request, self.thinking_budget);
        let response = self.generate_content(&self.analysis_model, &body).await?;
        extract_text(response)
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let start = Instant::now();
        let body = GeminiRequest::generation(request);
        let response = self.generate_content(self.model.as_str(), &body).await?;
        parse_image_response(response, self.metadata(start, &request.prompt))
    }

    async fn edit(&self, request: &EditRequest) -> Result<GeneratedImage> {
        let start = Instant::now();
        let body = GeminiRequest::edit(request);
        let response = self.generate_content(self.model.as_str(), &body).await?;
        parse_image_response(response, self.metadata(start, &request.instruction))
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    fn image_model(&self) -> &str {
        self.model.as_str()
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models/{}", self.base_url, self.model.as_str());
        let api_key = self.api_key().await?;

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(StudioError::Auth("Invalid API key".into())),
            s if !(200..300).contains(&s) => {
                let headers = response.headers().clone();
                let text = response.text().await.unwrap_or_default();
                Err(classify_error(s, &text, &headers))
            }
            _ => Ok(()),
        }
    }
}

/// Maps an HTTP error response onto the error taxonomy.
fn classify_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> StudioError {
    let text = sanitize_error_message(text);
    if status == 401 || status == 403 {
        return StudioError::Auth(text);
    }
    // The API reports unusable keys as 400 or, for unbound projects, 404.
    if status == 400 && (text.contains("API key not valid") || text.contains("API_KEY_INVALID")) {
        return StudioError::Auth(text);
    }
    if status == 404 {
        if text.contains("Requested entity was not found") {
            return StudioError::Auth(text);
        }
        return StudioError::InvalidRequest(
            "Model not found. Verify the model name is correct.".into(),
        );
    }
    if status == 429 {
        let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
        return StudioError::RateLimited { retry_after };
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

/// Collects the answer text of the first candidate, skipping thoughts.
fn extract_text(response: GeminiResponse) -> Result<String> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(StudioError::ContentBlocked(format!("Prompt blocked: {reason}")));
        }
        return Ok(String::new());
    };

    let text = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|p| !p.thought.unwrap_or(false))
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    Ok(text.trim().to_string())
}

/// Turns a generation or edit response into an image or a typed failure.
///
/// Looks for an inline image first, then a refusal text, then an abnormal
/// finish reason.
fn parse_image_response(
    response: GeminiResponse,
    metadata: GenerationMetadata,
) -> Result<GeneratedImage> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(feedback) = response.prompt_feedback {
            let msg = feedback
                .block_reason_message
                .or_else(|| {
                    feedback
                        .block_reason
                        .map(|r| format!("Generation blocked by safety filters: {r}"))
                })
                .unwrap_or_else(|| "Generation blocked by safety filters.".to_string());
            return Err(StudioError::ContentBlocked(msg));
        }
        return Err(StudioError::NoImage(
            "No candidates returned from the model".into(),
        ));
    };

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    if let Some(inline) = parts.iter().find_map(|p| p.inline_data.as_ref()) {
        let data = base64::engine::general_purpose::STANDARD
            .decode(&inline.data)
            .map_err(|e| StudioError::Decode(e.to_string()))?;
        let format = ImageFormat::from_mime_type(&inline.mime_type)
            .or_else(|| ImageFormat::from_magic_bytes(&data))
            .unwrap_or_default();
        return Ok(GeneratedImage::new(data, format, metadata));
    }

    let refusal = parts
        .iter()
        .filter(|p| !p.thought.unwrap_or(false))
        .filter_map(|p| p.text.as_deref())
        .map(str::trim)
        .find(|t| !t.is_empty());
    if let Some(text) = refusal {
        return Err(StudioError::Refused(excerpt(text, REFUSAL_EXCERPT_CHARS)));
    }

    if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
        return Err(StudioError::Stopped(reason));
    }

    Err(StudioError::NoImage(
        "No image data received in response".into(),
    ))
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
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
    Text { text: String },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_size: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

impl GeminiContent {
    fn from_parts(parts: &[PromptPart]) -> Self {
        let parts = parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => GeminiRequestPart::Text { text: text.clone() },
                PromptPart::Image(image) => GeminiRequestPart::InlineData {
                    inline_data: GeminiInlineData {
                        mime_type: image.format.mime_type().to_string(),
                        data: image.to_base64(),
                    },
                },
            })
            .collect();
        Self { parts }
    }
}

/// Text and image modalities, so a refusal can come back as text.
fn image_modalities() -> Vec<String> {
    vec!["TEXT".to_string(), "IMAGE".to_string()]
}

impl GeminiRequest {
    fn analysis(req: &AnalysisRequest, thinking_budget: u32) -> Self {
        Self {
            contents: vec![GeminiContent::from_parts(&req.parts)],
            system_instruction: Some(GeminiContent {
                parts: vec![GeminiRequestPart::Text {
                    text: req.system_instruction.clone(),
                }],
            }),
            generation_config: GeminiConfig {
                thinking_config: Some(ThinkingConfig { thinking_budget }),
                ..Default::default()
            },
        }
    }

    fn generation(req: &GenerationRequest) -> Self {
        Self {
            contents: vec![GeminiContent::from_parts(&req.parts())],
            system_instruction: None,
            generation_config: GeminiConfig {
                response_modalities: image_modalities(),
                image_config: Some(ImageConfig {
                    aspect_ratio: req.aspect_ratio.as_str().to_string(),
                    image_size: Some(req.resolution.as_str().to_string()),
                }),
                thinking_config: None,
            },
        }
    }

    fn edit(req: &EditRequest) -> Self {
        Self {
            contents: vec![GeminiContent::from_parts(&req.parts())],
            system_instruction: None,
            generation_config: GeminiConfig {
                response_modalities: image_modalities(),
                image_config: Some(ImageConfig {
                    aspect_ratio: req.aspect_ratio.as_str().to_string(),
                    image_size: None,
                }),
                thinking_config: None,
            },
        }
    }

    fn part_count(&self) -> usize {
        self.contents.iter().map(|c| c.parts.len()).sum()
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
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
    #[serde(default)]
    thought: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::request::ReferenceImages;
    use crate::image::types::{AspectRatio, EncodedImage, Resolution};

    fn parse(json: &str) -> Result<GeneratedImage> {
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        parse_image_response(resp, GenerationMetadata::default())
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::NanoBanana.as_str(), "gemini-2.5-flash-image");
        assert_eq!(
            GeminiModel::NanoBanana2.as_str(),
            "gemini-3.1-flash-image-preview"
        );
        assert_eq!(GeminiModel::default().as_str(), "gemini-3-pro-image-preview");
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = GeminiProviderBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::NanoBanana)
            .base_url("http://localhost:9999/v1beta/")
            .build()
            .unwrap();
        assert_eq!(provider.image_model(), "gemini-2.5-flash-image");
        assert_eq!(provider.base_url, "http://localhost:9999/v1beta");
    }

    #[test]
    fn test_generation_request_serialization() {
        let style = EncodedImage::new(vec![0xFF, 0xD8, 0xFF], ImageFormat::Jpeg);
        let req = GenerationRequest::new("A puppy")
            .with_aspect_ratio(AspectRatio::Tall)
            .with_resolution(Resolution::TwoK)
            .with_references(ReferenceImages {
                composition: Some(style),
                ..Default::default()
            });
        let json = serde_json::to_value(GeminiRequest::generation(&req)).unwrap();

        assert_eq!(json["generationConfig"]["imageConfig"]["aspectRatio"], "9:16");
        assert_eq!(json["generationConfig"]["imageConfig"]["imageSize"], "2K");
        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["TEXT", "IMAGE"])
        );
        assert!(json.get("systemInstruction").is_none());

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "/9j/");
        assert!(parts[0].get("inline_data").is_none());
    }

    #[test]
    fn test_edit_request_omits_image_size() {
        let image = EncodedImage::new(vec![1, 2, 3], ImageFormat::Png);
        let req = EditRequest::new(image, "add a hat").with_aspect_ratio(AspectRatio::Square);
        let json = serde_json::to_value(GeminiRequest::edit(&req)).unwrap();

        let image_config = &json["generationConfig"]["imageConfig"];
        assert_eq!(image_config["aspectRatio"], "1:1");
        assert!(image_config.get("imageSize").is_none());
        assert_eq!(
            json["contents"][0]["parts"][1]["text"],
            "Edit this image: add a hat"
        );
    }

    #[test]
    fn test_analysis_request_serialization() {
        let req = AnalysisRequest {
            system_instruction: "You are a reconstructionist".into(),
            parts: vec![PromptPart::text("hello")],
        };
        let json = serde_json::to_value(GeminiRequest::analysis(&req, 1024)).unwrap();

        assert_eq!(
            json["systemInstruction"]["parts"][0]["text"],
            "You are a reconstructionist"
        );
        assert_eq!(
            json["generationConfig"]["thinkingConfig"]["thinkingBudget"],
            1024
        );
        assert!(json["generationConfig"].get("responseModalities").is_none());
    }

    #[test]
    fn test_parse_inline_image() {
        let image = parse(
            r#"{
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here you go"},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}}
                    ]
                },
                "finishReason": "STOP"
            }]
        }"#,
        )
        .unwrap();

        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.data[..4], [0x89, 0x50, 0x4E, 0x47]);
        assert!(image.to_data_url().starts_with("data:image/png;base64,iVBORw0KGgo"));
    }

    #[test]
    fn test_parse_refusal_text() {
        let err = parse(
            r#"{
            "candidates": [{
                "content": {"parts": [{"text": "I can't create images of real people."}]},
                "finishReason": "STOP"
            }]
        }"#,
        )
        .unwrap_err();

        assert!(matches!(err, StudioError::Refused(_)));
        assert!(err.to_string().contains("I can't create images of real people."));
    }

    #[test]
    fn test_parse_refusal_is_capped() {
        let long = "no ".repeat(200);
        let json = serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": long}]}}]
        });
        let resp: GeminiResponse = serde_json::from_value(json).unwrap();
        match parse_image_response(resp, GenerationMetadata::default()) {
            Err(StudioError::Refused(text)) => {
                assert_eq!(text.chars().count(), REFUSAL_EXCERPT_CHARS + 3);
                assert!(text.ends_with("..."));
            }
            other => panic!("expected refusal, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_thought_is_not_a_refusal() {
        let err = parse(
            r#"{
            "candidates": [{
                "content": {"parts": [{"text": "thinking...", "thought": true}]},
                "finishReason": "IMAGE_SAFETY"
            }]
        }"#,
        )
        .unwrap_err();

        assert!(matches!(err, StudioError::Stopped(ref r) if r == "IMAGE_SAFETY"));
        assert!(err.to_string().contains("IMAGE_SAFETY"));
    }

    #[test]
    fn test_parse_no_content_normal_stop() {
        let err = parse(r#"{"candidates": [{"finishReason": "STOP"}]}"#).unwrap_err();
        assert!(matches!(err, StudioError::NoImage(_)));
    }

    #[test]
    fn test_parse_no_candidates() {
        let err = parse(r#"{"candidates": []}"#).unwrap_err();
        assert!(matches!(err, StudioError::NoImage(_)));

        let err = parse(
            r#"{
            "candidates": [],
            "promptFeedback": {"blockReason": "SAFETY"}
        }"#,
        )
        .unwrap_err();
        assert!(matches!(err, StudioError::ContentBlocked(ref m) if m.contains("SAFETY")));
    }

    #[test]
    fn test_parse_bad_base64() {
        let err = parse(
            r#"{
            "candidates": [{
                "content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": "!!!"}}]}
            }]
        }"#,
        )
        .unwrap_err();
        assert!(matches!(err, StudioError::Decode(_)));
    }

    #[test]
    fn test_extract_text_skips_thoughts() {
        let resp: GeminiResponse = serde_json::from_str(
            r#"{
            "candidates": [{
                "content": {"parts": [
                    {"text": "planning", "thought": true},
                    {"text": "  A woman towering over Shibuya. "}
                ]}
            }]
        }"#,
        )
        .unwrap();
        assert_eq!(
            extract_text(resp).unwrap(),
            "A woman towering over Shibuya."
        );

        let empty: GeminiResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(extract_text(empty).unwrap(), "");
    }

    #[test]
    fn test_classify_error() {
        let headers = reqwest::header::HeaderMap::new();

        assert!(classify_error(403, "forbidden", &headers).is_auth());
        assert!(classify_error(400, "API key not valid. Please pass a valid API key.", &headers)
            .is_auth());
        assert!(classify_error(404, "Requested entity was not found.", &headers).is_auth());
        assert!(matches!(
            classify_error(404, "no such model", &headers),
            StudioError::InvalidRequest(_)
        ));
        assert!(matches!(
            classify_error(429, "slow down", &headers),
            StudioError::RateLimited { retry_after: None }
        ));
        assert!(matches!(
            classify_error(400, "Request blocked by safety settings", &headers),
            StudioError::ContentBlocked(_)
        ));
        assert!(matches!(
            classify_error(500, "boom", &headers),
            StudioError::Api { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_key_is_auth_error() {
        let provider = GeminiProvider::builder()
            .credentials(Arc::new(ApiKeyStore::empty()))
            .build()
            .unwrap();
        let err = provider.health_check().await.unwrap_err();
        assert!(err.is_auth());
    }
}
