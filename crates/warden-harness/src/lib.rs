//! Test harness for the supervision engine: mocks and wire fixtures.
//!
//! This crate lets integration and unit tests exercise the supervisor,
//! detectors, and the real HTTP client without a live backend or a
//! writable session directory.
//!
//! # Overview
//!
//! - [`MockGateway`]: scripted inference backend that records every call
//! - [`MockRecorder`]: in-memory session recorder
//! - [`MockHttpServer`]: loopback HTTP server for Gemini client tests
//! - [`fixtures`]: canned generateContent payloads for the mock server
//!
//! # Example
//!
//! ```
//! use warden_harness::MockGateway;
//!
//! let gateway = MockGateway::new()
//!     .with_structured_response("drift", serde_json::json!({"drifted": false}));
//! assert_eq!(gateway.call_count(), 0);
//! ```

pub mod fixtures;
pub mod mocks;

pub use mocks::{MockGateway, MockHttpServer, MockRecorder, RecordedCall, RecordedRequest};
