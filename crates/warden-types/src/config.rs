//! Configuration for the Warden supervision engine.
//!
//! [`SupervisorConfig`] is the top-level configuration passed explicitly
//! into the supervisor: detector thresholds, intervention policy, the
//! background poll interval, and the [`GatewayConfig`] for the inference
//! backend. There is no implicit process-wide state; every component
//! receives its configuration at construction.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::WardenError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default fast-tier model for lightweight classification.
pub const DEFAULT_FAST_MODEL: &str = "gemini-2.0-flash-exp";

/// Default deep-tier model for semantic reasoning and structured analysis.
pub const DEFAULT_DEEP_MODEL: &str = "gemini-exp-1206";

/// Default Gemini API endpoint.
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Primary environment variable for the Gemini API key.
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_AI_API_KEY";

/// Fallback environment variable for the Gemini API key.
pub const FALLBACK_API_KEY_ENV: &str = "GEMINI_API_KEY";

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// Configuration for the two-tier inference backend.
///
/// The API key is never stored directly. Instead, `api_key_env` names the
/// environment variable that holds the key at runtime; the actual key is
/// read via [`GatewayConfig::read_api_key`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Name of the environment variable holding the API key.
    /// Defaults to `GOOGLE_AI_API_KEY`; falls back to `GEMINI_API_KEY`.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base endpoint URL (must be HTTPS outside of tests).
    #[serde(default = "default_endpoint")]
    pub endpoint_url: String,

    /// Fast-tier model name, used for lightweight classification.
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Deep-tier model name, used for structured reasoning.
    #[serde(default = "default_deep_model")]
    pub deep_model: String,

    /// Per-request timeout. Elapsed timers surface as backend-unavailable.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per request, counting the first. Only 429 and 5xx retry.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_GEMINI_ENDPOINT.to_string()
}

fn default_fast_model() -> String {
    DEFAULT_FAST_MODEL.to_string()
}

fn default_deep_model() -> String {
    DEFAULT_DEEP_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            endpoint_url: default_endpoint(),
            fast_model: default_fast_model(),
            deep_model: default_deep_model(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl GatewayConfig {
    /// Read the API key from the configured environment variable.
    ///
    /// Tries the primary `api_key_env` first, then falls back to
    /// `GEMINI_API_KEY` if the primary is the default and not set.
    /// Returns an error if neither variable is set or the value is empty.
    pub fn read_api_key(&self) -> Result<String, WardenError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.is_empty() => return Ok(key),
            _ => {}
        }

        if self.api_key_env == DEFAULT_API_KEY_ENV {
            match std::env::var(FALLBACK_API_KEY_ENV) {
                Ok(key) if !key.is_empty() => return Ok(key),
                _ => {}
            }
        }

        Err(WardenError::ConfigError(format!(
            "environment variable '{}' not set (required for Gemini API key, \
             see https://aistudio.google.com/apikey)",
            self.api_key_env
        )))
    }

    /// Validate that the endpoint URL is safe (HTTPS, no SSRF targets).
    pub fn validate_endpoint(&self) -> Result<(), WardenError> {
        validate_endpoint_url(&self.endpoint_url)
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Validate that a URL uses HTTPS and does not point to a private/loopback
/// address.
///
/// This blocks SSRF attacks where a malicious config might redirect backend
/// requests to internal services.
pub fn validate_endpoint_url(url: &str) -> Result<(), WardenError> {
    if !url.starts_with("https://") {
        return Err(WardenError::ConfigError(format!(
            "gateway endpoint URL must use HTTPS, got: {url}"
        )));
    }

    let host = extract_host(url).ok_or_else(|| {
        WardenError::ConfigError(format!("cannot parse host from gateway endpoint URL: {url}"))
    })?;

    if is_private_or_loopback(&host) {
        return Err(WardenError::ConfigError(format!(
            "gateway endpoint URL points to private/loopback address (SSRF blocked): {host}"
        )));
    }

    Ok(())
}

/// Extract the host portion from a URL string.
fn extract_host(url: &str) -> Option<String> {
    let after_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = after_scheme.split(['/', '?', '#']).next()?;
    // Strip port if present (but not IPv6 bracket notation).
    let host = if let Some((h, port)) = host.rsplit_once(':') {
        if port.chars().all(|c| c.is_ascii_digit()) {
            h
        } else {
            host
        }
    } else {
        host
    };
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Check if a hostname or IP address is private, loopback, or link-local.
fn is_private_or_loopback(host: &str) -> bool {
    if let Ok(addr) = host.parse::<std::net::Ipv4Addr>() {
        return addr.is_loopback()
            || addr.is_private()
            || addr.is_link_local()
            || addr.is_unspecified()
            || (addr.octets()[0] == 100 && addr.octets()[1] >= 64 && addr.octets()[1] <= 127);
    }

    if let Ok(addr) = host.parse::<std::net::Ipv6Addr>() {
        return addr.is_loopback() || addr.is_unspecified();
    }

    let lower = host.to_lowercase();
    lower == "localhost"
        || lower.ends_with(".local")
        || lower.ends_with(".internal")
        || lower.ends_with(".localhost")
}

/// Mask a sensitive value for display or logging.
///
/// Returns the first 4 characters followed by "***", or just "***" if the
/// value is shorter than 4 characters.
pub fn mask_sensitive(value: &str) -> String {
    if value.len() < 4 {
        "***".to_string()
    } else {
        let prefix: String = value.chars().take(4).collect();
        format!("{prefix}***")
    }
}

// ---------------------------------------------------------------------------
// Prompt-quality gate presets
// ---------------------------------------------------------------------------

/// Named threshold presets for the prompt quality gate fallback rule.
///
/// Used only when the backend omits an explicit approval; see
/// [`GateThresholds`] for the rule itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatePreset {
    /// 6/6/5: specificity and completeness at least 6, ambiguity at most 5.
    Standard,
    /// 4/4/7: looser cutoffs for exploratory sessions.
    Lenient,
}

impl Default for GatePreset {
    fn default() -> Self {
        GatePreset::Standard
    }
}

impl GatePreset {
    /// The concrete cutoffs for this preset.
    pub fn thresholds(self) -> GateThresholds {
        match self {
            GatePreset::Standard => GateThresholds {
                min_specificity: 6,
                min_completeness: 6,
                max_ambiguity: 5,
            },
            GatePreset::Lenient => GateThresholds {
                min_specificity: 4,
                min_completeness: 4,
                max_ambiguity: 7,
            },
        }
    }
}

/// Score cutoffs for the deterministic gate fallback.
///
/// A prompt passes when `specificity >= min_specificity`,
/// `completeness >= min_completeness`, and `ambiguity <= max_ambiguity`
/// (all scores 0-10; lower ambiguity is better).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateThresholds {
    pub min_specificity: u8,
    pub min_completeness: u8,
    pub max_ambiguity: u8,
}

impl GateThresholds {
    /// Apply the fallback rule to a score triple.
    pub fn approves(&self, specificity: u8, completeness: u8, ambiguity: u8) -> bool {
        specificity >= self.min_specificity
            && completeness >= self.min_completeness
            && ambiguity <= self.max_ambiguity
    }
}

// ---------------------------------------------------------------------------
// SupervisorConfig
// ---------------------------------------------------------------------------

/// Top-level configuration for a supervision session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupervisorConfig {
    /// Inference backend connection settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Number of recent errors the debug-loop detector examines. Minimum 2.
    #[serde(default = "default_loop_window")]
    pub loop_window: usize,

    /// Drift distance above which a drift detection is raised. Range [0, 1].
    #[serde(default = "default_drift_threshold")]
    pub drift_threshold: f64,

    /// Phrase matches at or above which sycophancy is flagged heuristically.
    #[serde(default = "default_sycophancy_threshold")]
    pub sycophancy_threshold: usize,

    /// Kill the agent and plan a pivot when a debug loop is confirmed.
    #[serde(default = "default_true")]
    pub auto_kill: bool,

    /// Run user prompts through the quality gate before forwarding.
    #[serde(default = "default_true")]
    pub gate_prompts: bool,

    /// Which threshold preset the gate fallback rule uses.
    #[serde(default)]
    pub gate_preset: GatePreset,

    /// Allow deep-tier planner calls to use backend-side research lookups.
    #[serde(default = "default_true")]
    pub enable_research: bool,

    /// Seconds between background drift checks.
    #[serde(default = "default_drift_poll_secs")]
    pub drift_poll_secs: u64,

    /// Write the session log to disk on shutdown.
    #[serde(default = "default_true")]
    pub save_session_logs: bool,

    /// Directory session logs are written into.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_loop_window() -> usize {
    5
}

fn default_drift_threshold() -> f64 {
    0.7
}

fn default_sycophancy_threshold() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_drift_poll_secs() -> u64 {
    10
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./warden_logs")
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            loop_window: default_loop_window(),
            drift_threshold: default_drift_threshold(),
            sycophancy_threshold: default_sycophancy_threshold(),
            auto_kill: true,
            gate_prompts: true,
            gate_preset: GatePreset::default(),
            enable_research: true,
            drift_poll_secs: default_drift_poll_secs(),
            save_session_logs: true,
            log_dir: default_log_dir(),
        }
    }
}

impl SupervisorConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, WardenError> {
        toml::from_str(content).map_err(|e| WardenError::ConfigError(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, WardenError> {
        toml::to_string_pretty(self).map_err(|e| WardenError::ConfigError(e.to_string()))
    }

    /// Build a configuration from `WARDEN_*` environment variables, using
    /// defaults for anything unset.
    ///
    /// Recognized variables: `WARDEN_FLASH_MODEL`, `WARDEN_PRO_MODEL`,
    /// `WARDEN_LOOP_WINDOW`, `WARDEN_DRIFT_THRESHOLD`,
    /// `WARDEN_SYCOPHANCY_THRESHOLD`, `WARDEN_AUTO_KILL`,
    /// `WARDEN_GATE_PROMPTS`, `WARDEN_GATE_PRESET`, `WARDEN_ENABLE_RESEARCH`,
    /// `WARDEN_DRIFT_POLL_SECS`, `WARDEN_LOG_DIR`. The API key itself is
    /// resolved later through [`GatewayConfig::read_api_key`].
    pub fn from_env() -> Result<Self, WardenError> {
        let mut config = Self::default();

        if let Ok(model) = std::env::var("WARDEN_FLASH_MODEL") {
            config.gateway.fast_model = model;
        }
        if let Ok(model) = std::env::var("WARDEN_PRO_MODEL") {
            config.gateway.deep_model = model;
        }
        if let Some(window) = env_parse::<usize>("WARDEN_LOOP_WINDOW")? {
            config.loop_window = window;
        }
        if let Some(threshold) = env_parse::<f64>("WARDEN_DRIFT_THRESHOLD")? {
            config.drift_threshold = threshold;
        }
        if let Some(threshold) = env_parse::<usize>("WARDEN_SYCOPHANCY_THRESHOLD")? {
            config.sycophancy_threshold = threshold;
        }
        if let Some(flag) = env_bool("WARDEN_AUTO_KILL") {
            config.auto_kill = flag;
        }
        if let Some(flag) = env_bool("WARDEN_GATE_PROMPTS") {
            config.gate_prompts = flag;
        }
        if let Ok(preset) = std::env::var("WARDEN_GATE_PRESET") {
            config.gate_preset = match preset.to_lowercase().as_str() {
                "standard" => GatePreset::Standard,
                "lenient" => GatePreset::Lenient,
                other => {
                    return Err(WardenError::ConfigError(format!(
                        "invalid WARDEN_GATE_PRESET value: {other:?} (expected standard or lenient)"
                    )))
                }
            };
        }
        if let Some(flag) = env_bool("WARDEN_ENABLE_RESEARCH") {
            config.enable_research = flag;
        }
        if let Some(secs) = env_parse::<u64>("WARDEN_DRIFT_POLL_SECS")? {
            config.drift_poll_secs = secs;
        }
        if let Ok(dir) = std::env::var("WARDEN_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate threshold ranges and the gateway endpoint.
    ///
    /// Fatal at session construction: an invalid configuration must not
    /// produce a half-working supervisor.
    pub fn validate(&self) -> Result<(), WardenError> {
        if !(0.0..=1.0).contains(&self.drift_threshold) {
            return Err(WardenError::ConfigError(
                "context_drift_threshold must be between 0 and 1".into(),
            ));
        }
        if self.loop_window < 2 {
            return Err(WardenError::ConfigError(
                "debug_loop_window must be at least 2".into(),
            ));
        }
        self.gateway.validate_endpoint()
    }
}

/// Parse an optional numeric environment variable, erroring on garbage.
fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>, WardenError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.parse::<T>().map(Some).map_err(|e| {
            WardenError::ConfigError(format!("environment variable {name} must be numeric: {e}"))
        }),
        Err(_) => Ok(None),
    }
}

/// Read a boolean environment variable; anything but "true" is false.
fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.eq_ignore_ascii_case("true"))
}
