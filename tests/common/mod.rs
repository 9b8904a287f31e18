//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use chain_view::config::{ChainConfig, EndpointConfig, GlobalSettings};

/// A mock RPC endpoint on an ephemeral port.
pub struct MockBackend {
    pub addr: SocketAddr,
    hits: Arc<AtomicU32>,
}

impl MockBackend {
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Requests answered so far.
    pub fn hits(&self) -> u32 {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn endpoint(&self, name: &str) -> EndpointConfig {
        EndpointConfig {
            name: name.to_string(),
            url: self.url(),
            timeout_ms: None,
        }
    }
}

/// Start a mock backend that always answers `status`.
pub async fn start_status_backend(status: u16) -> MockBackend {
    start_programmable_backend(move |_| async move { (status, "{}".to_string()) }).await
}

/// Start a programmable mock backend. `f` gets the zero-based hit number.
pub async fn start_programmable_backend<F, Fut>(f: F) -> MockBackend
where
    F: Fn(u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicU32::new(0));
    let f = Arc::new(f);

    let counter = hits.clone();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            let counter = counter.clone();
            tokio::spawn(async move {
                if !read_request(&mut socket).await {
                    return;
                }
                let hit = counter.fetch_add(1, Ordering::SeqCst);
                let (status, body) = f(hit).await;

                let response = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    reason(status),
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    MockBackend { addr, hits }
}

/// Read one request (headers and Content-Length body). False on early close.
async fn read_request(socket: &mut TcpStream) -> bool {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return false,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let headers = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        if buf.len() >= end + 4 + length {
            return true;
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Chain with `retry_count` and a short backoff over `endpoints`.
pub fn chain(network: &str, retry_count: u32, endpoints: Vec<EndpointConfig>) -> ChainConfig {
    ChainConfig {
        chain_id: 1,
        network: network.to_string(),
        pooling_strategy: String::new(),
        retry_count: Some(retry_count),
        retry_backoff_ms: Some(50),
        endpoints,
    }
}

/// Settings tuned for fast tests.
pub fn fast_settings(tick: Duration) -> GlobalSettings {
    let mut settings = GlobalSettings {
        request_timeout_ms: 2_000,
        tick_interval_ms: tick.as_millis() as u64,
        ..Default::default()
    };
    settings.rate_limit.interval_ms = 5;
    settings.rate_limit.burst_size = 10;
    settings
}

/// Poll `check` every 10 ms until it holds or `limit` passes.
pub async fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
