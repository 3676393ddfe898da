//! Request/response boundary to the two-tier inference backend.
//!
//! - [`backend`]: the [`LlmGateway`] trait, tiers, generation requests,
//!   and the shared structured-output parsing.
//! - [`gemini`]: the Gemini HTTP client implementing the trait.

pub mod backend;
pub mod gemini;

pub use backend::{
    is_sentinel, sentinel_response, strip_code_fences, GenerationRequest, LlmGateway, Tier,
};
pub use gemini::{GeminiClient, MaskedApiKey};
