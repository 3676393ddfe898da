//! Gemini API client implementing [`LlmGateway`] over HTTPS.
//!
//! Maps the fast tier to the configured flash model and the deep tier to
//! the pro model. Research-augmented requests attach the
//! `googleSearchRetrieval` tool so the backend can ground its answer in
//! search results.
//!
//! # Security
//!
//! - API keys are read from environment variables at runtime, never
//!   hardcoded, and masked in all `Debug` and `Display` output.
//! - Endpoint URLs are validated against SSRF at configuration time.
//! - Response text is sanitized to strip control characters.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use warden_types::{mask_sensitive, GatewayConfig, WardenError};

use crate::backend::{GenerationRequest, LlmGateway, Tier};

/// API version path segment for the generateContent endpoint.
const GEMINI_API_VERSION: &str = "v1beta";

// ---------------------------------------------------------------------------
// MaskedApiKey
// ---------------------------------------------------------------------------

/// Holds the resolved API key; hides the value in Debug/Display output.
#[derive(Clone)]
pub struct MaskedApiKey(pub String);

impl fmt::Debug for MaskedApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaskedApiKey({})", mask_sensitive(&self.0))
    }
}

impl fmt::Display for MaskedApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", mask_sensitive(&self.0))
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A request to the Gemini generateContent endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    /// Conversation contents (messages with parts).
    pub contents: Vec<GeminiContent>,

    /// Optional system instruction shaping model behavior.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiSystemInstruction>,

    /// Optional generation parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,

    /// Optional tools (search grounding).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<GeminiTool>>,
}

/// A content block in a Gemini conversation (role + parts).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    /// The role: "user" or "model".
    pub role: String,
    /// Content parts.
    pub parts: Vec<GeminiPart>,
}

/// A system instruction block (parts without a role).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiSystemInstruction {
    pub parts: Vec<GeminiPart>,
}

/// A single part within a Gemini content block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeminiPart {
    /// Plain text content.
    #[serde(rename = "text")]
    Text(String),
}

/// Generation configuration for a Gemini request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    /// Sampling temperature (0.0 to 2.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Number of candidates to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,
}

/// A tool attachment for a Gemini request.
///
/// Only search grounding is used here; function calling is not part of
/// the supervision pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiTool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_search_retrieval: Option<serde_json::Value>,
}

impl GeminiTool {
    /// The search-grounding tool with default settings.
    pub fn search_retrieval() -> Self {
        Self {
            google_search_retrieval: Some(serde_json::json!({})),
        }
    }
}

/// Response from the Gemini generateContent endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    /// Generated candidates.
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,

    /// Token usage metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<GeminiUsageMetadata>,
}

/// A single candidate response from Gemini.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    /// The generated content.
    pub content: GeminiContent,

    /// Why generation stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Token usage metadata from a Gemini response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsageMetadata {
    #[serde(default)]
    pub prompt_token_count: u64,
    #[serde(default)]
    pub candidates_token_count: u64,
    #[serde(default)]
    pub total_token_count: u64,
}

impl GeminiResponse {
    /// Extract all text content from the first candidate, sanitized.
    pub fn text_content(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let texts: Vec<&str> = candidate
            .content
            .parts
            .iter()
            .map(|GeminiPart::Text(t)| t.as_str())
            .collect();

        if texts.is_empty() {
            None
        } else {
            Some(sanitize_text(&texts.join("")))
        }
    }
}

/// Strip ASCII control characters from model output, preserving common
/// whitespace (newline, tab, carriage return).
fn sanitize_text(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t' || *c == '\r')
        .collect()
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// HTTP client for the Gemini API.
#[derive(Debug)]
pub struct GeminiClient {
    config: GatewayConfig,
    api_key: MaskedApiKey,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a client, resolving the API key from the environment.
    pub fn new(config: GatewayConfig) -> Result<Self, WardenError> {
        let api_key = config.read_api_key()?;
        Self::with_api_key(config, api_key)
    }

    /// Create a client with an explicit API key.
    pub fn with_api_key(
        config: GatewayConfig,
        api_key: impl Into<String>,
    ) -> Result<Self, WardenError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WardenError::BackendUnavailable(format!("http client build: {e}")))?;
        Ok(Self {
            config,
            api_key: MaskedApiKey(api_key.into()),
            client,
        })
    }

    /// Model name backing the given tier.
    pub fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Fast => &self.config.fast_model,
            Tier::Deep => &self.config.deep_model,
        }
    }

    /// Full generateContent URL for the given tier.
    fn request_url(&self, tier: Tier) -> String {
        format!(
            "{}/{}/models/{}:generateContent",
            self.config.endpoint_url.trim_end_matches('/'),
            GEMINI_API_VERSION,
            self.model_for(tier)
        )
    }

    /// Assemble the wire request from a generation request.
    fn build_request(request: &GenerationRequest) -> GeminiRequest {
        let tools = request
            .research_augmented
            .then(|| vec![GeminiTool::search_retrieval()]);

        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart::Text(request.prompt.clone())],
            }],
            system_instruction: request.system_instruction.as_ref().map(|instruction| {
                GeminiSystemInstruction {
                    parts: vec![GeminiPart::Text(instruction.clone())],
                }
            }),
            generation_config: Some(GeminiGenerationConfig {
                temperature: Some(request.temperature),
                candidate_count: Some(1),
            }),
            tools,
        }
    }

    /// POST with retry: 429 and 5xx retry with exponential backoff, other
    /// failures are terminal. All failures map to backend-unavailable.
    async fn post_with_retry(
        &self,
        url: &str,
        body: &GeminiRequest,
    ) -> Result<GeminiResponse, WardenError> {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_millis(1000 * 2u64.pow(attempt));
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(url)
                .header("x-goog-api-key", &self.api_key.0)
                .header("content-type", "application/json")
                .json(body)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();

                    if status.is_success() {
                        return serde_json::from_str(&text).map_err(|e| {
                            WardenError::BackendUnavailable(format!(
                                "unparseable Gemini response: {e}"
                            ))
                        });
                    } else if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "gateway request failed; retrying"
                        );
                        last_error = Some(WardenError::BackendUnavailable(format!(
                            "Gemini API returned {status} (attempt {}): {text}",
                            attempt + 1
                        )));
                        continue;
                    } else {
                        return Err(WardenError::BackendUnavailable(format!(
                            "Gemini API returned {status}: {text}"
                        )));
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        "gateway request failed; retrying"
                    );
                    last_error = Some(WardenError::BackendUnavailable(format!(
                        "request failed (attempt {}): {e}",
                        attempt + 1
                    )));
                    continue;
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| WardenError::BackendUnavailable("all retry attempts failed".into())))
    }
}

#[async_trait]
impl LlmGateway for GeminiClient {
    async fn generate_text(
        &self,
        tier: Tier,
        request: GenerationRequest,
    ) -> Result<String, WardenError> {
        let url = self.request_url(tier);
        let body = Self::build_request(&request);
        tracing::debug!(model = self.model_for(tier), tier = %tier, "gateway request");

        let response = self.post_with_retry(&url, &body).await?;
        response.text_content().ok_or_else(|| {
            WardenError::BackendUnavailable("response contained no text candidates".into())
        })
    }
}
