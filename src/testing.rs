//! Test doubles: a loopback HTTP stub and scripted collaborators.

use crate::auth::{Authenticator, ImagePayload, Verdict};
use crate::decode::{DecodeOptions, DecodeResult, Point, SymbolDecoder, SymbolLocation};
use crate::error::AuthError;
use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::error;

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub method: String,
    /// Path and query as sent
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

type Responder = dyn Fn(&RecordedRequest) -> (u16, String) + Send + Sync;

#[derive(Clone)]
struct StubState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    respond: Arc<Responder>,
}

/// Loopback HTTP server answering every route from one closure
pub(crate) struct StubServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl StubServer {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&RecordedRequest) -> (u16, String) + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            requests: Arc::clone(&requests),
            respond: Arc::new(respond),
        };

        let app = Router::new().fallback(record_handler).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Stub server error: {}", e);
            }
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn record_handler(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let request = RecordedRequest {
        method: method.to_string(),
        path: uri
            .path_and_query()
            .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string()),
        headers: headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect(),
        body: body.to_vec(),
    };

    let (status, payload) = (state.respond)(&request);
    state.requests.lock().push(request);

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], payload)
}

/// Scripted authenticator step
#[derive(Debug, Clone, Copy)]
pub(crate) enum AuthStep {
    Verdict(Verdict),
    Status(u16),
    Invalid,
}

/// Answers from a fixed script, repeating the last step once exhausted
pub(crate) struct ScriptedAuthenticator {
    script: Mutex<VecDeque<AuthStep>>,
    last: Mutex<Option<AuthStep>>,
    calls: AtomicUsize,
}

impl ScriptedAuthenticator {
    pub fn new(steps: impl IntoIterator<Item = AuthStep>) -> Self {
        Self {
            script: Mutex::new(steps.into_iter().collect()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn verdicts(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        Self::new(verdicts.into_iter().map(AuthStep::Verdict))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for ScriptedAuthenticator {
    async fn submit(&self, payload: ImagePayload) -> Result<Verdict, AuthError> {
        assert!(!payload.is_empty());
        self.calls.fetch_add(1, Ordering::SeqCst);

        let step = match self.script.lock().pop_front() {
            Some(step) => {
                *self.last.lock() = Some(step);
                step
            }
            None => (*self.last.lock()).unwrap_or(AuthStep::Status(503)),
        };

        match step {
            AuthStep::Verdict(verdict) => Ok(verdict),
            AuthStep::Status(status) => Err(AuthError::Status { status }),
            AuthStep::Invalid => Err(AuthError::InvalidResponse {
                details: "scripted".to_string(),
            }),
        }
    }
}

/// Decoder answering from a script of per-frame results, then misses
pub(crate) struct ScriptedDecoder {
    script: Mutex<VecDeque<Option<DecodeResult>>>,
    calls: AtomicUsize,
}

impl ScriptedDecoder {
    pub fn new(script: impl IntoIterator<Item = Option<DecodeResult>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SymbolDecoder for ScriptedDecoder {
    fn decode(
        &self,
        _rgba: &[u8],
        _width: u32,
        _height: u32,
        _options: &DecodeOptions,
    ) -> Option<DecodeResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().flatten()
    }
}

/// Axis-aligned square symbol
pub(crate) fn square_symbol(payload: &str, origin: f32, side: f32) -> DecodeResult {
    DecodeResult {
        payload: payload.to_string(),
        location: SymbolLocation {
            top_left: Point::new(origin, origin),
            top_right: Point::new(origin + side, origin),
            bottom_right: Point::new(origin + side, origin + side),
            bottom_left: Point::new(origin, origin + side),
        },
    }
}
