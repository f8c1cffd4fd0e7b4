//! Integration tests for the HTTP submission protocols.
//!
//! Each test spins up a one-shot HTTP server on a loopback port, points a
//! `ConversionConfig` at it and checks both what went over the wire and how
//! the response was interpreted. No external service is needed.
//!
//! Run with:
//!   cargo test --test http_client -- --nocapture

use hand2excal::{
    convert_text, ConversionConfig, ConversionService, HttpConversionClient, ImageCandidate,
    WorkflowController, WorkflowPhase, STATUS_MESSAGES,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("hand2excal=debug")
        .with_test_writer()
        .try_init();
}

/// One request as the server saw it.
struct Captured {
    head: String,
    body: Vec<u8>,
}

impl Captured {
    fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim()
                .eq_ignore_ascii_case(name)
                .then(|| v.trim().to_string())
        })
    }

    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Serve exactly one request with `status` and `body`, then close.
async fn serve_once(status: u16, body: String) -> (String, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];

        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                break pos + 4;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
        let mut captured = Captured {
            head,
            body: Vec::new(),
        };

        let chunked = captured
            .header("transfer-encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));
        let length: usize = captured
            .header("content-length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        loop {
            let body = &buf[head_end..];
            let complete = if chunked {
                find(body, b"0\r\n\r\n").is_some()
            } else {
                body.len() >= length
            };
            if complete {
                break;
            }
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
        captured.body = buf[head_end..].to_vec();

        let reason = if status < 400 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = tx.send(captured);
    });

    (url, rx)
}

fn client_for(url: &str) -> HttpConversionClient {
    let config = ConversionConfig::builder()
        .base_url(url)
        .request_timeout_secs(10)
        .build()
        .unwrap();
    HttpConversionClient::new(&config).unwrap()
}

fn success_body() -> Value {
    json!({
        "success": true,
        "excalidraw": { "type": "excalidraw", "version": 2, "elements": [] },
        "metadata": { "nodes_count": 3, "arrows_count": 2 },
    })
}

// ── Image protocol ───────────────────────────────────────────────────────────

#[tokio::test]
async fn image_is_uploaded_as_multipart_file() {
    init_tracing();
    let (url, seen) = serve_once(200, success_body().to_string()).await;
    let client = client_for(&url);

    let image = ImageCandidate::from_bytes(b"\x89PNGfake".to_vec(), "image/png", "flow.png");
    let result = client.submit_image(image).await.unwrap();
    assert_eq!(result.payload(), &success_body());

    let req = seen.await.unwrap();
    assert_eq!(req.request_line(), "POST /api/convert HTTP/1.1");
    assert!(req
        .header("content-type")
        .unwrap()
        .starts_with("multipart/form-data"));
    let body = req.body_text();
    assert!(body.contains(r#"name="file""#), "body: {body}");
    assert!(body.contains(r#"filename="flow.png""#), "body: {body}");
    assert!(
        body.to_ascii_lowercase().contains("content-type: image/png"),
        "body: {body}"
    );
    assert!(body.contains("PNGfake"));
}

#[tokio::test]
async fn image_server_error_surfaces_detail() {
    init_tracing();
    let (url, _seen) = serve_once(500, json!({ "detail": "OOM" }).to_string()).await;
    let client = client_for(&url);

    let image = ImageCandidate::from_bytes(vec![1, 2, 3], "image/jpeg", "a.jpg");
    let err = client.submit_image(image).await.unwrap_err();
    assert_eq!(err.message, "OOM");
}

// ── Text protocol ────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_is_posted_as_json() {
    init_tracing();
    let (url, seen) = serve_once(200, success_body().to_string()).await;
    let client = client_for(&url);

    client
        .submit_text("Order -> Pay -> Ship".into())
        .await
        .unwrap();

    let req = seen.await.unwrap();
    assert_eq!(req.request_line(), "POST /api/convert-text HTTP/1.1");
    assert_eq!(req.header("content-type").as_deref(), Some("application/json"));
    let sent: Value = serde_json::from_slice(&req.body).unwrap();
    assert_eq!(sent, json!({ "text": "Order -> Pay -> Ship" }));
}

#[tokio::test]
async fn text_logical_failure() {
    init_tracing();
    let (url, _seen) = serve_once(200, json!({ "success": false }).to_string()).await;
    let client = client_for(&url);

    let err = client.submit_text("a -> b".into()).await.unwrap_err();
    assert_eq!(err.message, "Conversion failed. Please try again.");
}

#[tokio::test]
async fn text_gateway_error_without_json() {
    init_tracing();
    let (url, _seen) = serve_once(502, "upstream down".to_string()).await;
    let client = client_for(&url);

    let err = client.submit_text("a -> b".into()).await.unwrap_err();
    assert!(err.message.contains("502"), "got: {}", err.message);
}

// ── Health ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_ok() {
    let (url, seen) = serve_once(200, json!({ "status": "ok" }).to_string()).await;
    client_for(&url).health().await.unwrap();
    assert_eq!(seen.await.unwrap().request_line(), "GET /api/health HTTP/1.1");
}

#[tokio::test]
async fn health_rejects_unexpected_status() {
    let (url, _seen) = serve_once(200, json!({ "status": "degraded" }).to_string()).await;
    let err = client_for(&url).health().await.unwrap_err();
    assert!(err.to_string().contains("not healthy"), "got: {err}");
}

// ── Full workflow over HTTP ──────────────────────────────────────────────────

#[tokio::test]
async fn controller_round_trip_over_http() {
    init_tracing();
    let (url, _seen) = serve_once(200, success_body().to_string()).await;
    let config = ConversionConfig::builder().base_url(&url).build().unwrap();
    let client = Arc::new(HttpConversionClient::new(&config).unwrap());
    let mut controller = WorkflowController::new(client, &config);

    let image = ImageCandidate::from_bytes(vec![0u8; 2048], "image/webp", "board.webp");
    controller.select_image(image).unwrap();
    assert_eq!(controller.live_previews(), 1);

    controller.confirm().unwrap();
    assert_eq!(controller.progress_message(), Some(STATUS_MESSAGES[0]));

    assert_eq!(controller.settle().await, WorkflowPhase::Done);
    let metadata = controller.result().unwrap().metadata().unwrap();
    assert_eq!((metadata.nodes_count, metadata.arrows_count), (3, 2));
    assert_eq!(controller.live_previews(), 0);
}

#[tokio::test]
async fn convert_text_entry_point() {
    init_tracing();
    let (url, _seen) = serve_once(200, success_body().to_string()).await;
    let config = ConversionConfig::builder().base_url(&url).build().unwrap();

    let result = convert_text("Start -> End", &config).await.unwrap();
    assert_eq!(result.excalidraw().unwrap()["type"], "excalidraw");
}
