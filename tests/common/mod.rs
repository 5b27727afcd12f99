//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use upstream_connector::EndpointConfig;

/// A request as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Mock upstream service bound to an ephemeral port.
///
/// Routes:
/// - `/users`: 200 JSON `{"id":1,"name":"ada"}`
/// - `/echo`: 200 JSON describing the received request
/// - `/missing`: 404 JSON
/// - `/broken`: 500 text
/// - `/page.xml`: 200 XML
/// - `/empty`: 204
/// - `/slow`: 200 after 500ms
/// - `/negotiated`: 200 JSON, or gzip-framed bytes when the request
///   advertises `accept-encoding: gzip`
#[derive(Clone)]
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    pub fn base_uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    /// Endpoint entry pointing at this upstream.
    pub fn endpoint(&self, name: &str) -> EndpointConfig {
        EndpointConfig {
            name: name.into(),
            endpoint: self.base_uri(),
            auth: false,
            auth_type: "none".into(),
            auth_user: String::new(),
            auth_pass: String::new(),
            proxy: true,
        }
    }
}

/// Start the mock upstream.
pub async fn start_upstream() -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream = MockUpstream {
        addr: listener.local_addr().unwrap(),
        hits: Arc::new(AtomicUsize::new(0)),
        requests: Arc::new(Mutex::new(Vec::new())),
    };

    let state = upstream.clone();
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    let state = state.clone();
                    tokio::spawn(async move {
                        let _ = serve(socket, state).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    upstream
}

async fn serve(mut socket: TcpStream, state: MockUpstream) -> std::io::Result<()> {
    let Some(request) = read_request(&mut socket).await? else {
        return Ok(());
    };
    state.hits.fetch_add(1, Ordering::SeqCst);
    state.requests.lock().unwrap().push(request.clone());

    let route = request.path.split('?').next().unwrap_or_default().to_string();
    let mut extra_headers = String::new();
    let (status, content_type, body): (&str, &str, Vec<u8>) = match route.as_str() {
        "/users" => ("200 OK", "application/json", br#"{"id":1,"name":"ada"}"#.to_vec()),
        "/echo" => {
            let headers: serde_json::Map<String, serde_json::Value> = request
                .headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), json!(v)))
                .collect();
            let body = json!({
                "method": request.method,
                "path": request.path,
                "headers": headers,
                "body": request.body,
            });
            ("200 OK", "application/json", body.to_string().into_bytes())
        }
        "/negotiated" => {
            let wants_gzip = request
                .header("accept-encoding")
                .is_some_and(|value| value.contains("gzip"));
            if wants_gzip {
                extra_headers.push_str("Content-Encoding: gzip\r\n");
                // gzip member header followed by deflate data, not decodable as text
                let body = vec![0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xab, 0x56, 0xca];
                ("200 OK", "application/json", body)
            } else {
                ("200 OK", "application/json", br#"{"encoded":false}"#.to_vec())
            }
        }
        "/broken" => ("500 Internal Server Error", "text/plain", b"boom".to_vec()),
        "/page.xml" => ("200 OK", "application/xml", b"<page>1</page>".to_vec()),
        "/empty" => ("204 No Content", "text/plain", Vec::new()),
        "/slow" => {
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            ("200 OK", "text/plain", b"finally".to_vec())
        }
        _ => ("404 Not Found", "application/json", br#"{"error":"missing"}"#.to_vec()),
    };

    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nX-Upstream: mock\r\n{}Connection: close\r\n\r\n",
        status,
        content_type,
        body.len(),
        extra_headers
    );
    socket.write_all(head.as_bytes()).await?;
    socket.write_all(&body).await?;
    socket.shutdown().await
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<Option<RecordedRequest>> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let read = socket.read(&mut chunk).await?;
        if read == 0 {
            return Ok(None);
        }
        buffer.extend_from_slice(&chunk[..read]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();

    let headers: Vec<(String, String)> = lines
        .filter(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buffer.len() < header_end + content_length {
        let read = socket.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
    let body_end = buffer.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buffer[header_end..body_end]).to_string();

    Ok(Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    }))
}
