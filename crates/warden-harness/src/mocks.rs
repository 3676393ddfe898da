//! Mock implementations of key traits for testing without real infrastructure.
//!
//! Provides lightweight, thread-safe test doubles for:
//! - [`MockGateway`]: scripted inference backend recording every call
//! - [`MockRecorder`]: in-memory session recorder (no filesystem)
//! - [`MockHttpServer`]: lightweight HTTP server recording requests
//!
//! All mocks use `Arc<Mutex<_>>` for thread-safe interior mutability,
//! so they can be shared across async tasks or threads safely.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use warden_gateway::{GenerationRequest, LlmGateway, Tier};
use warden_types::{SessionLog, SessionRecorder, WardenError};

// ---------------------------------------------------------------------------
// MockGateway
// ---------------------------------------------------------------------------

/// A recorded generation call made through the mock gateway.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// Which tier the caller targeted.
    pub tier: Tier,
    /// The full prompt text, including any appended JSON instruction.
    pub prompt: String,
    /// The system instruction, if the caller set one.
    pub system_instruction: Option<String>,
    /// The effective sampling temperature.
    pub temperature: f64,
    /// Whether research augmentation was requested.
    pub research_augmented: bool,
}

/// Thread-safe inner state for [`MockGateway`].
#[derive(Debug)]
struct MockGatewayInner {
    /// Structured responses keyed by prompt substring, matched in order.
    structured: Vec<(String, serde_json::Value)>,
    /// Plain text responses returned when no structured key matches.
    texts: VecDeque<String>,
    /// When set, every call fails with a backend-unavailable error.
    failing: bool,
    /// All calls made through the gateway, in order.
    calls: Vec<RecordedCall>,
}

/// A scripted inference backend for supervisor and detector tests.
///
/// Structured responses are registered against a prompt substring and
/// serialized to text, so calls flow through the real fence-stripping and
/// sentinel logic of `generate_structured`. Unscripted calls fail like an
/// unreachable backend.
///
/// # Example
///
/// ```
/// use warden_harness::MockGateway;
///
/// let gateway = MockGateway::new()
///     .with_structured_response("repetitive patterns", serde_json::json!({"in_loop": false}))
///     .with_text_response("a plain reply");
/// assert_eq!(gateway.call_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockGateway {
    inner: Arc<Mutex<MockGatewayInner>>,
}

impl MockGateway {
    /// Create a gateway with no scripted responses.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockGatewayInner {
                structured: Vec::new(),
                texts: VecDeque::new(),
                failing: false,
                calls: Vec::new(),
            })),
        }
    }

    /// A gateway whose every call fails as backend-unavailable.
    #[must_use]
    pub fn failing(self) -> Self {
        self.lock().failing = true;
        self
    }

    /// Register a structured response for prompts containing `key`.
    ///
    /// Responses are persistent: the same key answers repeated calls.
    #[must_use]
    pub fn with_structured_response(self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.lock().structured.push((key.into(), value));
        self
    }

    /// Queue a plain text response, used when no structured key matches.
    #[must_use]
    pub fn with_text_response(self, text: impl Into<String>) -> Self {
        self.lock().texts.push_back(text.into());
        self
    }

    /// Toggle failure mode at runtime.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Queue a plain text response at runtime.
    pub fn enqueue_text_response(&self, text: impl Into<String>) {
        self.lock().texts.push_back(text.into());
    }

    /// Get a snapshot of all recorded calls.
    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Get the total number of calls made through the gateway.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Clear all recorded calls.
    pub fn reset(&self) {
        self.lock().calls.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockGatewayInner> {
        self.inner.lock().expect("mock gateway lock poisoned")
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmGateway for MockGateway {
    async fn generate_text(
        &self,
        tier: Tier,
        request: GenerationRequest,
    ) -> Result<String, WardenError> {
        let mut inner = self.lock();
        inner.calls.push(RecordedCall {
            tier,
            prompt: request.prompt.clone(),
            system_instruction: request.system_instruction.clone(),
            temperature: request.temperature,
            research_augmented: request.research_augmented,
        });

        if inner.failing {
            return Err(WardenError::BackendUnavailable(
                "mock backend unavailable".into(),
            ));
        }

        if let Some((_, value)) = inner
            .structured
            .iter()
            .find(|(key, _)| request.prompt.contains(key.as_str()))
        {
            return Ok(value.to_string());
        }

        if let Some(text) = inner.texts.pop_front() {
            return Ok(text);
        }

        Err(WardenError::BackendUnavailable(
            "no scripted response for prompt".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// MockRecorder
// ---------------------------------------------------------------------------

/// Thread-safe inner state for [`MockRecorder`].
#[derive(Debug)]
struct MockRecorderInner {
    logs: Vec<SessionLog>,
    failing: bool,
}

/// An in-memory session recorder for testing without touching the filesystem.
#[derive(Debug, Clone)]
pub struct MockRecorder {
    inner: Arc<Mutex<MockRecorderInner>>,
}

impl MockRecorder {
    /// Create an empty mock recorder.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockRecorderInner {
                logs: Vec::new(),
                failing: false,
            })),
        }
    }

    /// A recorder whose every write fails.
    #[must_use]
    pub fn failing(self) -> Self {
        self.lock().failing = true;
        self
    }

    /// Get a snapshot of all recorded session logs.
    pub fn recorded(&self) -> Vec<SessionLog> {
        self.lock().logs.clone()
    }

    /// Get the number of logs recorded.
    pub fn record_count(&self) -> usize {
        self.lock().logs.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockRecorderInner> {
        self.inner.lock().expect("mock recorder lock poisoned")
    }
}

impl Default for MockRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRecorder for MockRecorder {
    fn record(&self, log: &SessionLog) -> Result<PathBuf, WardenError> {
        let mut inner = self.lock();
        if inner.failing {
            return Err(WardenError::RecorderError(
                "mock recorder unavailable".into(),
            ));
        }
        let path = PathBuf::from(format!("warden_{}.json", log.session_id));
        inner.logs.push(log.clone());
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// MockHttpServer
// ---------------------------------------------------------------------------

/// A recorded HTTP request received by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method (GET, POST, etc.).
    pub method: String,
    /// Request path (e.g., "/v1beta/models/gemini:generateContent").
    pub path: String,
    /// Request headers as (name, value) pairs.
    pub headers: Vec<(String, String)>,
    /// Request body as bytes.
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Look up a header value, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body as JSON.
    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// A configured response for a specific path.
#[derive(Debug, Clone)]
struct ConfiguredResponse {
    status: u16,
    body: Vec<u8>,
}

/// Thread-safe inner state for the mock HTTP server.
#[derive(Debug)]
struct MockHttpInner {
    /// All requests received, in order.
    requests: Vec<RecordedRequest>,
    /// Sticky response per path, used once any queued responses run out.
    responses: HashMap<String, ConfiguredResponse>,
    /// One-shot responses per path, consumed in order before the sticky one.
    queued: HashMap<String, VecDeque<ConfiguredResponse>>,
}

/// A lightweight HTTP server for exercising the real Gemini client without
/// network access.
///
/// Uses `std::net::TcpListener` on a random port. The server runs on a
/// background thread and shuts down when the `MockHttpServer` is dropped.
/// One-shot responses queued with [`queue_response`](Self::queue_response)
/// are served before the sticky response, which makes retry sequences
/// (429 then 200) straightforward to script.
///
/// # Security
///
/// - Binds only to `127.0.0.1` (loopback), never to all interfaces.
/// - Requests are capped at 10 MB to prevent memory exhaustion.
/// - The server thread terminates when the stop flag is set on drop.
pub struct MockHttpServer {
    inner: Arc<Mutex<MockHttpInner>>,
    addr: SocketAddr,
    stop_flag: Arc<std::sync::atomic::AtomicBool>,
    _thread: Option<std::thread::JoinHandle<()>>,
}

impl MockHttpServer {
    /// Start a mock HTTP server on a random loopback port.
    ///
    /// The server immediately begins accepting connections on a background
    /// thread.
    pub fn start() -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")
            .expect("failed to bind mock HTTP server to loopback");
        let addr = listener.local_addr().expect("failed to get local addr");

        // Non-blocking accept so the thread can check the stop flag.
        listener
            .set_nonblocking(true)
            .expect("failed to set non-blocking");

        let inner = Arc::new(Mutex::new(MockHttpInner {
            requests: Vec::new(),
            responses: HashMap::new(),
            queued: HashMap::new(),
        }));
        let stop_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let inner_clone = Arc::clone(&inner);
        let stop_clone = Arc::clone(&stop_flag);

        let thread = std::thread::spawn(move || {
            run_mock_server(listener, inner_clone, stop_clone);
        });

        Self {
            inner,
            addr,
            stop_flag,
            _thread: Some(thread),
        }
    }

    /// Get the base URL of the mock server (e.g., `http://127.0.0.1:12345`).
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Set the sticky JSON response for a path.
    pub fn configure_json_response(&self, path: impl Into<String>, status: u16, body: &serde_json::Value) {
        let mut inner = self.lock();
        inner.responses.insert(
            path.into(),
            ConfiguredResponse {
                status,
                body: body.to_string().into_bytes(),
            },
        );
    }

    /// Queue a one-shot JSON response for a path, served before the sticky
    /// response.
    pub fn queue_response(&self, path: impl Into<String>, status: u16, body: &serde_json::Value) {
        let mut inner = self.lock();
        inner
            .queued
            .entry(path.into())
            .or_default()
            .push_back(ConfiguredResponse {
                status,
                body: body.to_string().into_bytes(),
            });
    }

    /// Get a snapshot of all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Get the total number of requests received.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Clear all recorded requests.
    pub fn reset(&self) {
        self.lock().requests.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockHttpInner> {
        self.inner.lock().expect("mock http lock poisoned")
    }
}

impl Drop for MockHttpServer {
    fn drop(&mut self) {
        self.stop_flag
            .store(true, std::sync::atomic::Ordering::SeqCst);
        // Connect to the listener to wake it up so the thread can exit.
        let _ = std::net::TcpStream::connect(self.addr);
        if let Some(thread) = self._thread.take() {
            let _ = thread.join();
        }
    }
}

/// Run the mock HTTP server loop, accepting connections until the stop flag
/// is set.
fn run_mock_server(
    listener: std::net::TcpListener,
    inner: Arc<Mutex<MockHttpInner>>,
    stop_flag: Arc<std::sync::atomic::AtomicBool>,
) {
    use std::io::{BufRead, BufReader, Write};

    loop {
        if stop_flag.load(std::sync::atomic::Ordering::SeqCst) {
            break;
        }

        let stream = match listener.accept() {
            Ok((stream, _addr)) => stream,
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(10));
                continue;
            }
            Err(_) => break,
        };

        if stop_flag.load(std::sync::atomic::Ordering::SeqCst) {
            break;
        }

        // Read timeout prevents hanging on malformed requests.
        let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(5)));

        let mut reader = BufReader::new(&stream);

        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            continue;
        }
        let parts: Vec<&str> = request_line.trim().splitn(3, ' ').collect();
        if parts.len() < 2 {
            continue;
        }
        let method = parts[0].to_string();
        let path = parts[1].to_string();

        let mut headers = Vec::new();
        let mut content_length: usize = 0;
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).is_err() {
                break;
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                break;
            }
            if let Some((name, value)) = trimmed.split_once(':') {
                let name = name.trim().to_string();
                let value = value.trim().to_string();
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.parse().unwrap_or(0);
                }
                headers.push((name, value));
            }
        }

        // Body capped at 10 MB.
        let cap = content_length.min(10 * 1024 * 1024);
        let mut body = vec![0u8; cap];
        if cap > 0 {
            let _ = std::io::Read::read_exact(&mut reader, &mut body);
        }

        let recorded = RecordedRequest {
            method,
            path: path.clone(),
            headers,
            body,
        };

        let response = {
            let mut guard = inner.lock().expect("mock http lock poisoned");
            guard.requests.push(recorded);
            let queued = guard
                .queued
                .get_mut(&path)
                .and_then(|queue| queue.pop_front());
            queued.or_else(|| guard.responses.get(&path).cloned())
        };

        let (status, resp_body) = match response {
            Some(r) => (r.status, r.body),
            None => (404, b"not found".to_vec()),
        };

        let status_text = match status {
            200 => "OK",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Unknown",
        };

        let mut response_buf = format!("HTTP/1.1 {status} {status_text}\r\n");
        response_buf.push_str("Content-Type: application/json\r\n");
        response_buf.push_str(&format!("Content-Length: {}\r\n", resp_body.len()));
        response_buf.push_str("\r\n");

        let mut writer = &stream;
        let _ = writer.write_all(response_buf.as_bytes());
        let _ = writer.write_all(&resp_body);
        let _ = writer.flush();
        // Shut down the write half so the client sees EOF.
        let _ = stream.shutdown(std::net::Shutdown::Both);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
