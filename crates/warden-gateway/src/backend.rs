//! The inference backend boundary.
//!
//! [`LlmGateway`] is the seam between the detectors and the two-tier
//! backend: a fast/cheap tier for lightweight classification and a
//! deep/slow tier for semantic reasoning. Structured generation is a
//! provided method so every implementation shares the same JSON-forcing
//! prompt, code-fence stripping, and malformed-response sentinel.

use async_trait::async_trait;

use warden_types::WardenError;

/// Instruction appended to every structured-generation prompt.
const JSON_ONLY_SUFFIX: &str = "Respond ONLY with valid JSON. No markdown, no explanation.";

/// Temperature used for structured output.
const STRUCTURED_TEMPERATURE: f64 = 0.3;

// ---------------------------------------------------------------------------
// Tier and request
// ---------------------------------------------------------------------------

/// Which backend inference profile a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Cheap, low-latency classification.
    Fast,
    /// Slower structured reasoning, optionally research-augmented.
    Deep,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Fast => write!(f, "fast"),
            Tier::Deep => write!(f, "deep"),
        }
    }
}

/// A single generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The user-visible prompt text.
    pub prompt: String,
    /// Optional system instruction shaping model behavior.
    pub system_instruction: Option<String>,
    /// Sampling temperature.
    pub temperature: f64,
    /// Whether the backend may augment the call with research lookups.
    pub research_augmented: bool,
}

impl GenerationRequest {
    /// A request with the default temperature and no augmentation.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system_instruction: None,
            temperature: 0.7,
            research_augmented: false,
        }
    }

    /// Attach a system instruction.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Override the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Enable backend-side research augmentation.
    #[must_use]
    pub fn with_research(mut self, enabled: bool) -> Self {
        self.research_augmented = enabled;
        self
    }
}

// ---------------------------------------------------------------------------
// Gateway trait
// ---------------------------------------------------------------------------

/// Request/response boundary to the two-tier inference backend.
///
/// Errors out of `generate_text` mean the backend is unreachable or
/// refused the request; callers in the detection pipeline recover by
/// degrading to "no detection". `generate_structured` never fails on
/// unparseable output: it returns the sentinel mapping instead, so a
/// flaky model cannot abort the interaction loop.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Generate free-form text on the given tier.
    async fn generate_text(
        &self,
        tier: Tier,
        request: GenerationRequest,
    ) -> Result<String, WardenError>;

    /// Generate a parsed JSON mapping on the given tier.
    ///
    /// Appends a JSON-only instruction, forces a low temperature, strips
    /// surrounding code fences, and parses. A parse failure yields
    /// `{"error": "invalid structured response", "raw": <text>}` rather
    /// than an `Err`.
    async fn generate_structured(
        &self,
        tier: Tier,
        request: GenerationRequest,
    ) -> Result<serde_json::Value, WardenError> {
        let json_request = GenerationRequest {
            prompt: format!("{}\n\n{}", request.prompt, JSON_ONLY_SUFFIX),
            temperature: STRUCTURED_TEMPERATURE,
            ..request
        };
        let text = self.generate_text(tier, json_request).await?;
        match parse_structured(&text) {
            Ok(value) => Ok(value),
            Err(WardenError::MalformedResponse { raw }) => Ok(sentinel_response(&raw)),
            Err(other) => Err(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Structured parsing
// ---------------------------------------------------------------------------

/// Strip surrounding Markdown code-fence markers from model output.
pub fn strip_code_fences(text: &str) -> &str {
    let mut t = text.trim();
    if let Some(rest) = t.strip_prefix("```json") {
        t = rest;
    } else if let Some(rest) = t.strip_prefix("```") {
        t = rest;
    }
    if let Some(rest) = t.strip_suffix("```") {
        t = rest;
    }
    t.trim()
}

/// Parse fence-stripped model output as JSON.
fn parse_structured(text: &str) -> Result<serde_json::Value, WardenError> {
    let stripped = strip_code_fences(text);
    serde_json::from_str(stripped).map_err(|_| WardenError::MalformedResponse {
        raw: stripped.to_string(),
    })
}

/// The sentinel mapping returned for unparseable structured output.
pub fn sentinel_response(raw: &str) -> serde_json::Value {
    serde_json::json!({
        "error": "invalid structured response",
        "raw": raw,
    })
}

/// Whether a structured result is the malformed-response sentinel.
pub fn is_sentinel(value: &serde_json::Value) -> bool {
    value
        .get("error")
        .and_then(|e| e.as_str())
        .is_some_and(|e| e == "invalid structured response")
}
