//! Shared utilities for integration tests.
//!
//! A raw-TCP HTTP/1.1 server that records every request it receives. It answers
//! origin-form and absolute-form requests alike, so it doubles as a plain HTTP proxy.
//! `start_tls_server` serves the same protocol over TLS with a self-signed certificate.

#![allow(dead_code)]

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

use outbound_dispatcher::{DispatchEvent, EventStream};

/// One request as seen on the wire.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    /// Request target exactly as sent: `/path` or `http://host/path` through a proxy.
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl SeenRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_count(&self, name: &str) -> usize {
        self.headers.iter().filter(|(n, _)| n.eq_ignore_ascii_case(name)).count()
    }
}

/// What the mock answers.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    scheme: &'static str,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockServer {
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn url(&self, path: &str) -> url::Url {
        url::Url::parse(&format!("{}://{}{}", self.scheme, self.addr, path)).unwrap()
    }
}

/// Start a mock server on an ephemeral port. `handler` picks the reply for each request.
pub async fn start_server<F>(handler: F) -> MockServer
where
    F: Fn(&SeenRequest) -> Reply + Send + Sync + 'static,
{
    start(handler, None).await
}

/// Like `start_server`, but over TLS with the certificate in `tests/fixtures`.
pub async fn start_tls_server<F>(handler: F) -> MockServer
where
    F: Fn(&SeenRequest) -> Reply + Send + Sync + 'static,
{
    let acceptor = TlsAcceptor::from(Arc::new(self_signed_config()));
    start(handler, Some(acceptor)).await
}

fn self_signed_config() -> rustls::ServerConfig {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let certs = rustls_pemfile::certs(&mut BufReader::new(File::open(dir.join("self_signed.crt")).unwrap()))
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(dir.join("self_signed.key")).unwrap()))
        .unwrap()
        .unwrap();
    rustls::ServerConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .unwrap()
}

async fn start<F>(handler: F, tls: Option<TlsAcceptor>) -> MockServer
where
    F: Fn(&SeenRequest) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(handler);
    let scheme = if tls.is_some() { "https" } else { "http" };

    let recorded = seen.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let handler = handler.clone();
                    let recorded = recorded.clone();
                    let tls = tls.clone();
                    tokio::spawn(async move {
                        match tls {
                            Some(acceptor) => {
                                // a client that rejects the certificate aborts the handshake
                                if let Ok(stream) = acceptor.accept(socket).await {
                                    let _ = serve(stream, handler, recorded).await;
                                }
                            }
                            None => {
                                let _ = serve(socket, handler, recorded).await;
                            }
                        }
                    });
                }
                Err(_) => break,
            }
        }
    });

    MockServer {
        addr,
        scheme,
        seen,
    }
}

/// Serve requests on one connection until the peer closes it.
async fn serve<S, F>(
    mut socket: S,
    handler: Arc<F>,
    recorded: Arc<Mutex<Vec<SeenRequest>>>,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: Fn(&SeenRequest) -> Reply + Send + Sync + 'static,
{
    let mut buf = Vec::new();
    loop {
        let Some(request) = read_request(&mut socket, &mut buf).await? else {
            return Ok(());
        };
        recorded.lock().unwrap().push(request.clone());
        let reply = handler(&request);

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        let mut head = format!("HTTP/1.1 {} {}\r\n", reply.status, reason(reply.status));
        for (name, value) in &reply.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str(&format!("Content-Length: {}\r\n\r\n", reply.body.len()));
        socket.write_all(head.as_bytes()).await?;
        socket.write_all(reply.body.as_bytes()).await?;
        socket.flush().await?;
    }
}

async fn read_request<S>(socket: &mut S, buf: &mut Vec<u8>) -> std::io::Result<Option<SeenRequest>>
where
    S: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    let length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = head_end + 4;
    while buf.len() < body_start + length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = buf[body_start..body_start + length].to_vec();
    buf.drain(..body_start + length);

    Ok(Some(SeenRequest {
        method,
        target,
        headers,
        body,
    }))
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        407 => "Proxy Authentication Required",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Wait for the next terminal event, skipping log events.
pub async fn next_terminal(events: &mut EventStream) -> DispatchEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("timed out waiting for a terminal event")
            .expect("event stream closed");
        if event.is_terminal() {
            return event;
        }
    }
}

/// Drain whatever is queued right now.
pub fn drain(events: &mut mpsc::UnboundedReceiver<DispatchEvent>) -> Vec<DispatchEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
