//! Mock LMS API Server for testing
//!
//! Provides a [`MockLmsServer`] that answers the REST collections the client
//! talks to (`/courses`, `/tests`, ...) from canned routes. Tests point a
//! [`Config`](crate::config::Config) at [`MockLmsServer::url`] and then
//! inspect the recorded requests.
//!
//! # Example
//! ```ignore
//! let server = MockLmsServer::builder()
//!     .route("GET", "/courses", &[], 200, r#"{"courses":[]}"#)
//!     .build()
//!     .await?;
//! let config = server.config();
//! // ... drive an ApiClient built from `config` ...
//! let requests = server.requests().await;
//! server.stop().await;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A canned HTTP reply.
#[derive(Debug, Clone, PartialEq)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
}

/// One route: method + path, plus query pairs that must all be present.
#[derive(Debug, Clone)]
pub struct MockRoute {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Served in order; the last one repeats once the others are used up.
    pub replies: Vec<MockReply>,
    pub latency_ms: u64,
}

impl MockRoute {
    fn matches(&self, request: &RecordedRequest) -> bool {
        self.method.eq_ignore_ascii_case(&request.method)
            && self.path == request.path
            && self
                .query
                .iter()
                .all(|(k, v)| request.query.get(k).map(|q| q == v).unwrap_or(false))
    }

    /// More query constraints means a more specific route.
    fn specificity(&self) -> usize {
        self.query.len()
    }
}

/// A request as the server saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, String>,
    /// Header names are lower-cased.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Mock LMS backend bound to a local port.
pub struct MockLmsServer {
    url: String,
    state: Arc<ServerState>,
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

struct ServerState {
    routes: Vec<MockRoute>,
    served: Mutex<Vec<usize>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockLmsServer {
    pub fn builder() -> MockLmsServerBuilder {
        MockLmsServerBuilder::default()
    }

    /// Bind to `127.0.0.1:0` and spawn the accept loop.
    pub async fn start(routes: Vec<MockRoute>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let url = format!("http://{}", addr);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let served = vec![0usize; routes.len()];
        let state = Arc::new(ServerState {
            routes,
            served: Mutex::new(served),
            requests: Mutex::new(Vec::new()),
        });

        let handle = tokio::spawn(accept_loop(listener, Arc::clone(&state), shutdown_rx));

        Ok(Self {
            url,
            state,
            shutdown_tx,
            handle,
        })
    }

    /// Base URL, e.g. `"http://127.0.0.1:54321"`. Collections live under it.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// A client config whose every collection points at this server.
    pub fn config(&self) -> crate::config::Config {
        crate::config::Config {
            base_url: self.url.clone(),
            ..crate::config::Config::default()
        }
    }

    /// Every request received so far, in arrival order.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().await.clone()
    }

    /// Requests for one method + path.
    pub async fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .await
            .into_iter()
            .filter(|r| r.method.eq_ignore_ascii_case(method) && r.path == path)
            .collect()
    }

    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockLmsServerBuilder {
    routes: Vec<MockRoute>,
}

impl MockLmsServerBuilder {
    /// Add a route answering with a fixed status and JSON body.
    pub fn route(
        mut self,
        method: &str,
        path: &str,
        query: &[(&str, &str)],
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        self.routes.push(MockRoute {
            method: method.to_string(),
            path: path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            replies: vec![MockReply {
                status,
                body: body.into(),
            }],
            latency_ms: 0,
        });
        self
    }

    /// Add a route serving `replies` in order.
    pub fn route_sequence(
        mut self,
        method: &str,
        path: &str,
        query: &[(&str, &str)],
        replies: Vec<MockReply>,
    ) -> Self {
        self.routes.push(MockRoute {
            method: method.to_string(),
            path: path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            replies,
            latency_ms: 0,
        });
        self
    }

    /// Delay replies of the most recently added route.
    pub fn with_latency(mut self, ms: u64) -> Self {
        if let Some(last) = self.routes.last_mut() {
            last.latency_ms = ms;
        }
        self
    }

    pub async fn build(self) -> std::io::Result<MockLmsServer> {
        MockLmsServer::start(self.routes).await
    }
}

// ---------------------------------------------------------------------------
// Internal: accept loop & request handling
// ---------------------------------------------------------------------------

async fn accept_loop(
    listener: TcpListener,
    state: Arc<ServerState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, state).await {
                                tracing::debug!("mock server connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::debug!("mock server accept error: {}", e);
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: tokio::net::TcpStream,
    state: Arc<ServerState>,
) -> std::io::Result<()> {
    let Some(request) = read_request(&mut stream).await? else {
        return Ok(());
    };

    // Most specific matching route wins; ties go to the first registered.
    let route_idx = state
        .routes
        .iter()
        .enumerate()
        .filter(|(_, r)| r.matches(&request))
        .max_by(|(ia, a), (ib, b)| a.specificity().cmp(&b.specificity()).then(ib.cmp(ia)))
        .map(|(i, _)| i);

    state.requests.lock().await.push(request);

    let Some(idx) = route_idx else {
        return write_http_response(&mut stream, 404, r#"{"error":"route not found"}"#).await;
    };

    let route = &state.routes[idx];
    let reply = {
        let mut served = state.served.lock().await;
        let n = served[idx];
        served[idx] += 1;
        route
            .replies
            .get(n)
            .or_else(|| route.replies.last())
            .cloned()
    };

    if route.latency_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(route.latency_ms)).await;
    }

    match reply {
        Some(reply) => write_http_response(&mut stream, reply.status, &reply.body).await,
        None => write_http_response(&mut stream, 500, r#"{"error":"no reply configured"}"#).await,
    }
}

/// Read headers up to the blank line, then `Content-Length` bytes of body.
async fn read_request(
    stream: &mut tokio::net::TcpStream,
) -> std::io::Result<Option<RecordedRequest>> {
    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            break find_header_end(&buf).unwrap_or(buf.len());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or("/").to_string();

    let mut headers = BTreeMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let body_start = (header_end + 4).min(buf.len());
    let mut body = buf[body_start..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    let (path, query) = split_target(&target);
    Ok(Some(RecordedRequest {
        method,
        path,
        query,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    }))
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn split_target(target: &str) -> (String, BTreeMap<String, String>) {
    // Parse against a dummy origin so `url` handles percent-decoding.
    match url::Url::parse(&format!("http://mock{}", target)) {
        Ok(url) => (
            url.path().to_string(),
            url.query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        ),
        Err(_) => (target.to_string(), BTreeMap::new()),
    }
}

async fn write_http_response(
    stream: &mut tokio::net::TcpStream,
    status: u16,
    body: &str,
) -> std::io::Result<()> {
    let status_text = match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    };

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body,
    );

    stream.write_all(response.as_bytes()).await?;
    stream.flush().await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
