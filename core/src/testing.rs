//! Scripted in-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;

use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{Transport, TransportError};

/// What a scripted backend does with the next request it receives.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Respond(u16, String),
    Fail(TransportError),
    /// Never answer; the caller's deadline has to fire.
    Hang,
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub base: String,
    pub method: HttpMethod,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub at: Instant,
}

/// Per-base-URL queues of steps. A base with an empty queue refuses the
/// connection, so unscripted candidates behave like dead hosts.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, base: &str, steps: impl IntoIterator<Item = Step>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(base.to_string())
            .or_default()
            .extend(steps);
    }

    pub fn respond(&self, base: &str, status: u16, body: &str) {
        self.script(base, [Step::Respond(status, body.to_string())]);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn bases_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.base).collect()
    }
}

pub(crate) fn refused() -> Step {
    Step::Fail(TransportError::Network("connection refused".to_string()))
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, base_url: &str, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(Call {
            base: base_url.to_string(),
            method: request.method,
            path: request.path.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            at: Instant::now(),
        });

        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(base_url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(refused);

        match step {
            Step::Respond(status, body) => Ok(HttpResponse {
                status,
                headers: vec![("content-type".to_string(), "application/json".to_string())],
                body,
            }),
            Step::Fail(err) => Err(err),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// A raw HTTP listener that answers every request with `status` and a body
/// cut short of its declared length. Returns the base URL and a connection
/// counter.
pub(crate) async fn spawn_truncating_backend(status: u16) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            read_request(&mut socket).await;
            let head = format!(
                "HTTP/1.1 {status} OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{{\"id\""
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    (base, hits)
}

/// Consume the request head and its declared body.
async fn read_request(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let len = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if buf.len() >= end + 4 + len {
            return;
        }
    }
}
