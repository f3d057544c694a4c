//! Remote processing through the Gemini `generateContent` API.
//!
//! The session only sees the [`ImageProcessor`] trait; [`GeminiClient`] is
//! the production implementation and tests substitute their own.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::encoded::{strip_data_url_prefix, EncodedImage, OUTPUT_MEDIA_TYPE};
use crate::error::{Error, Result};
use crate::options::ProcessingOptions;

/// Environment variable holding the access credential.
pub const API_KEY_ENV: &str = "API_KEY";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// API base URL used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Something that turns an encoded image into a watermark-free one.
pub trait ImageProcessor {
    /// Process `image` according to `options`.
    ///
    /// Options are read once, when the call starts.
    fn process(
        &self,
        image: &EncodedImage,
        options: &ProcessingOptions,
    ) -> impl Future<Output = Result<EncodedImage>>;
}

/// Connection settings for [`GeminiClient`].
#[derive(Clone)]
pub struct GeminiConfig {
    /// Access credential. `None` makes every request fail fast.
    pub api_key: Option<String>,
    /// Model name, e.g. `gemini-2.5-flash-image`.
    pub model: String,
    /// API base URL without a trailing slash.
    pub endpoint: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GeminiConfig {
    /// Default settings with the credential taken from `API_KEY`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_api_key(std::env::var(API_KEY_ENV).ok())
    }

    /// Replace the credential. Blank keys count as absent.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

/// Client for the Gemini image model.
///
/// Build once and reuse; the underlying HTTP connection pool is shared
/// across calls.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Create a client from `config`.
    ///
    /// A missing credential is not an error here; it is reported when a
    /// request is attempted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be initialized.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    /// The settings this client was built with.
    #[must_use]
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    async fn send(&self, image: &EncodedImage, options: &ProcessingOptions) -> Result<EncodedImage> {
        let api_key = self.config.api_key.as_deref().ok_or(Error::MissingApiKey)?;

        let request = build_request(image, options);
        let url = self.config.generate_url();
        log::info!(
            "sending {} to {} ({:?} instruction)",
            image.media_type(),
            self.config.model,
            options.instruction()
        );

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(remote_error(status, &body));
        }

        let body: GenerateContentResponse = response.json().await?;
        interpret_response(body)
    }
}

impl ImageProcessor for GeminiClient {
    async fn process(
        &self,
        image: &EncodedImage,
        options: &ProcessingOptions,
    ) -> Result<EncodedImage> {
        self.send(image, options)
            .await
            .inspect_err(|e| log::warn!("gemini request failed: {e}"))
    }
}

/// Body of a `generateContent` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    /// Conversation turns; a single user turn here.
    pub contents: Vec<Content>,
}

/// One turn of content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Ordered parts of the turn.
    #[serde(default)]
    pub parts: Vec<Part>,
    /// Author role, set by the API on responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// A text or inline-data part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Inline binary content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

/// Base64 data with its media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// Media type, e.g. `image/png`.
    pub mime_type: String,
    /// Base64 payload without a data-URL prefix.
    pub data: String,
}

/// Body of a successful `generateContent` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Generated candidates, best first.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// One generated candidate.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Candidate content; absent when generation was blocked.
    #[serde(default)]
    pub content: Option<Content>,
    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Build the request for `image`: its payload with the prefix stripped,
/// followed by the instruction selected by `options`.
#[must_use]
pub fn build_request(image: &EncodedImage, options: &ProcessingOptions) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![
                Part {
                    inline_data: Some(InlineData {
                        mime_type: image.media_type().to_string(),
                        data: strip_data_url_prefix(image.as_str()).to_string(),
                    }),
                    ..Part::default()
                },
                Part {
                    text: Some(options.instruction().prompt().to_string()),
                    ..Part::default()
                },
            ],
            role: None,
        }],
    }
}

/// Extract the result image from a response.
///
/// The first inline-data part of the first candidate wins and is re-wrapped
/// as `image/png`.
///
/// # Errors
///
/// Returns [`Error::TextInsteadOfImage`] when only text came back, and
/// [`Error::NoImageData`] when nothing usable came back.
pub fn interpret_response(response: GenerateContentResponse) -> Result<EncodedImage> {
    let parts = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts)
        .unwrap_or_default();

    if let Some(data) = parts.iter().find_map(|p| p.inline_data.as_ref()) {
        log::debug!("received {} bytes of base64 image data", data.data.len());
        return Ok(EncodedImage::from_base64(OUTPUT_MEDIA_TYPE, &data.data));
    }

    let text: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
    if text.is_empty() {
        Err(Error::NoImageData)
    } else {
        Err(Error::TextInsteadOfImage { text })
    }
}

fn remote_error(status: reqwest::StatusCode, body: &str) -> Error {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.to_string());

    Error::Remote {
        status: status.as_u16(),
        message,
    }
}
