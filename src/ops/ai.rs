// ============================================================================
// AI OPERATIONS — prompt → coloring page via an image-generation service
// ============================================================================
//
// The service is reached through the `ImageGenerator` trait so the session,
// the app and the tests never depend on a particular backend. The shipped
// backend talks to the Gemini `generateContent` REST endpoint.

use std::sync::{Arc, mpsc};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assets::{AppSettings, SYSTEM_PROMPT};
use crate::io::ImageRef;

/// Non-empty, trimmed prompt text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn new(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The one failure the gateway reports. `detail` is for the log only; the
/// user always sees the same retry message.
#[derive(Error, Debug)]
#[error("generation failed: {detail}")]
pub struct GenerationError {
    pub detail: String,
}

impl GenerationError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into() }
    }
}

/// Anything that can turn a prompt into a picture.
pub trait ImageGenerator: Send + Sync {
    fn generate(&self, prompt: &Prompt) -> Result<ImageRef, GenerationError>;
}

// ----------------------------------------------------------------------------
// Wire format
// ----------------------------------------------------------------------------

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
struct RequestContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<TextPart>,
}

#[derive(Serialize, Debug)]
struct TextPart {
    text: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Deserialize, Debug, Default)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
    file_data: Option<FileData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct FileData {
    file_uri: String,
}

pub(crate) fn build_request(prompt: &Prompt, style_preamble: bool) -> GenerateRequest {
    GenerateRequest {
        contents: vec![RequestContent {
            role: Some("user"),
            parts: vec![TextPart { text: prompt.as_str().to_string() }],
        }],
        system_instruction: style_preamble.then(|| RequestContent {
            role: None,
            parts: vec![TextPart { text: SYSTEM_PROMPT.to_string() }],
        }),
        generation_config: GenerationConfig {
            response_modalities: vec!["IMAGE", "TEXT"],
        },
    }
}

/// Pick the first image part out of a response.
pub(crate) fn extract_image(resp: GenerateResponse) -> Result<ImageRef, GenerationError> {
    let mut text_reply = None;
    for part in resp.candidates.into_iter().filter_map(|c| c.content).flat_map(|c| c.parts) {
        if let Some(inline) = part.inline_data {
            let data = BASE64
                .decode(inline.data.trim())
                .map_err(|e| GenerationError::new(format!("invalid base64 image payload: {}", e)))?;
            return Ok(ImageRef::Inline { mime_type: inline.mime_type, data });
        }
        if let Some(file) = part.file_data {
            return Ok(ImageRef::Url(file.file_uri));
        }
        if text_reply.is_none() {
            text_reply = part.text;
        }
    }
    Err(GenerationError::new(match text_reply {
        Some(text) => format!("response had no image (model said: {})", text),
        None => "response had no image".to_string(),
    }))
}

// ----------------------------------------------------------------------------
// Gemini backend
// ----------------------------------------------------------------------------

pub struct GeminiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    style_preamble: bool,
}

impl GeminiGenerator {
    pub fn from_settings(settings: &AppSettings) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| GenerationError::new(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: settings.api_endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.resolved_api_key(),
            style_preamble: settings.style_preamble,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

impl ImageGenerator for GeminiGenerator {
    fn generate(&self, prompt: &Prompt) -> Result<ImageRef, GenerationError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| GenerationError::new("no API key configured"))?;

        let resp = self
            .client
            .post(self.url())
            .header("x-goog-api-key", key)
            .json(&build_request(prompt, self.style_preamble))
            .send()
            .map_err(|e| GenerationError::new(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(GenerationError::new(format!(
                "service answered HTTP {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .map_err(|e| GenerationError::new(format!("malformed response: {}", e)))?;
        extract_image(parsed)
    }
}

// ----------------------------------------------------------------------------
// Background job
// ----------------------------------------------------------------------------

/// Outcome of one generation call, tagged with its submission token.
pub struct GenerationResult {
    pub token: u64,
    pub prompt: Prompt,
    pub result: Result<ImageRef, GenerationError>,
}

/// Run `generator` on a worker thread and post the result to `sender`.
pub fn spawn_generation(
    generator: Arc<dyn ImageGenerator>,
    prompt: Prompt,
    token: u64,
    sender: mpsc::Sender<GenerationResult>,
) {
    std::thread::spawn(move || {
        let result = generator.generate(&prompt);
        let _ = sender.send(GenerationResult { token, prompt, result });
    });
}
