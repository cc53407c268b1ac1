//! Client for the generative-language `generateContent` endpoint.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::CoreConfig;
use crate::model::{ApiCredential, Photo};

/// Error bodies beyond this are cut before they reach the UI.
pub const MAX_ERROR_BODY_BYTES: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("The assistant is not configured yet. Please try again in a moment.")]
    NotConfigured,

    #[error("Server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Received empty response.")]
    EmptyResponse,

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Unexpected response format: {0}")]
    MalformedResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GenerateError {
    /// Prefers the `error.message` of a structured error body, falling back
    /// to the raw text.
    pub fn http_status(status: u16, body: &[u8]) -> Self {
        let mut message = serde_json::from_slice::<ApiErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error.message)
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
        truncate_utf8_safe(&mut message, MAX_ERROR_BODY_BYTES);
        Self::HttpStatus {
            status,
            body: message,
        }
    }
}

impl From<reqwest::Error> for GenerateError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the credential, so never render it.
        let e = e.without_url();
        if e.is_decode() {
            GenerateError::MalformedResponse(e.to_string())
        } else {
            GenerateError::Transport(e.to_string())
        }
    }
}

fn truncate_utf8_safe(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }

    let mut truncate_at = max_bytes;
    while truncate_at > 0 && !s.is_char_boundary(truncate_at) {
        truncate_at -= 1;
    }
    s.truncate(truncate_at);
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<RequestContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestContent {
    pub parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64 (standard alphabet, padded).
    pub data: String,
}

impl GenerateContentRequest {
    /// One content entry: the prompt text, then the photo if any.
    pub fn new(prompt: &str, photo: Option<&Photo>) -> Self {
        let mut parts = vec![RequestPart::Text {
            text: prompt.to_string(),
        }];
        if let Some(photo) = photo {
            parts.push(RequestPart::InlineData {
                inline_data: InlineData {
                    mime_type: photo.mime_type().to_string(),
                    data: STANDARD.encode(photo.bytes()),
                },
            });
        }
        Self {
            contents: vec![RequestContent { parts }],
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    pub fn first_text(self) -> Option<String> {
        self.candidates?
            .into_iter()
            .next()?
            .content?
            .parts?
            .into_iter()
            .next()?
            .text
    }
}

/// Decodes a success body into the answer text.
pub fn parse_response(body: &[u8]) -> Result<String, GenerateError> {
    let response: GenerateContentResponse = serde_json::from_slice(body)
        .map_err(|e| GenerateError::MalformedResponse(e.to_string()))?;
    response.first_text().ok_or(GenerateError::EmptyResponse)
}

// ============================================================================
// Client
// ============================================================================

/// Anything that turns a prompt (and optional photo) into answer text.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Injects the credential. Until called, `generate` must fail with
    /// `NotConfigured` without touching the network.
    async fn configure(&self, credential: ApiCredential);

    async fn generate(&self, prompt: &str, photo: Option<&Photo>) -> Result<String, GenerateError>;
}

pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: Url,
    credential: RwLock<Option<ApiCredential>>,
}

impl GeminiClient {
    pub fn new(config: &CoreConfig) -> Result<Self, GenerateError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(GenerateError::from)?;
        Self::with_http(http, config)
    }

    pub fn with_http(http: reqwest::Client, config: &CoreConfig) -> Result<Self, GenerateError> {
        config
            .validate()
            .map_err(|e| GenerateError::InvalidRequest(e.to_string()))?;
        let endpoint = config
            .generate_url()
            .map_err(|e| GenerateError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            credential: RwLock::new(None),
        })
    }

    pub async fn is_configured(&self) -> bool {
        self.credential.read().await.is_some()
    }

    fn request_url(&self, credential: &ApiCredential) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("key", credential.expose());
        url
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn configure(&self, credential: ApiCredential) {
        *self.credential.write().await = Some(credential);
        info!(endpoint = %self.endpoint, "Generative client configured");
    }

    #[instrument(
        skip(self, prompt, photo),
        fields(
            request_id = %Uuid::new_v4(),
            prompt_len = prompt.len(),
            photo_bytes = photo.map(Photo::len).unwrap_or(0),
        )
    )]
    async fn generate(&self, prompt: &str, photo: Option<&Photo>) -> Result<String, GenerateError> {
        let credential = self
            .credential
            .read()
            .await
            .clone()
            .ok_or(GenerateError::NotConfigured)?;

        let payload = GenerateContentRequest::new(prompt, photo);
        let response = self
            .http
            .post(self.request_url(&credential))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "Generative response received");

        if status != StatusCode::OK {
            warn!(status = status.as_u16(), "Generative endpoint returned an error status");
            return Err(GenerateError::http_status(status.as_u16(), &body));
        }

        parse_response(&body)
    }
}
