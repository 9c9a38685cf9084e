//! `GeminiGenerator` against a one-shot loopback HTTP server.
//!
//! The server captures the raw request and answers with a canned response,
//! so the wire format is checked without network access.

use std::net::SocketAddr;

use cgen_agent::{ApiKey, CodeGenerator, CodegenError, GeminiGenerator, LoopConfig};
use coordination::Transcript;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Captured {
    head: String,
    body: String,
}

/// Serve exactly one request, then report what was received.
async fn serve_once(status: u16, body: &'static str) -> (SocketAddr, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let (head_end, content_length) = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                break (pos + 4, len);
            }
        };
        while buf.len() < head_end + content_length {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let reason = if status == 200 { "OK" } else { "Error" };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();

        let _ = tx.send(Captured {
            head: String::from_utf8_lossy(&buf[..head_end]).to_string(),
            body: String::from_utf8_lossy(&buf[head_end..]).to_string(),
        });
    });

    (addr, rx)
}

fn generator_for(addr: SocketAddr, response_log: Option<std::path::PathBuf>) -> GeminiGenerator {
    let config = LoopConfig {
        api_base: format!("http://{addr}/v1beta"),
        model: "gemini-test".into(),
        request_timeout_secs: 10,
        response_log,
        ..LoopConfig::default()
    };
    let key = ApiKey::from_lookup("GEMINI_API_KEY", |_| Some("secret-key".into())).unwrap();
    GeminiGenerator::new(&config, key).unwrap()
}

const TWO_PART_REPLY: &str = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"```c\nint main(void) "},{"text":"{ return 0; }\n```"}]},"finishReason":"STOP"}]}"#;

#[tokio::test]
async fn test_request_shape_and_multi_part_reply() {
    let (addr, captured) = serve_once(200, TWO_PART_REPLY).await;
    let generator = generator_for(addr, None);

    let mut transcript = Transcript::seed("Write C.");
    transcript.push_reply("int main(void) { return 0 }").unwrap();
    transcript.push_request("fix it").unwrap();

    let reply = generator.generate(&transcript).await.unwrap();
    assert_eq!(reply.segments.len(), 2);
    assert_eq!(reply.text(), "```c\nint main(void) { return 0; }\n```");

    let captured = captured.await.unwrap();
    let head = captured.head.to_lowercase();
    assert!(
        head.starts_with("post /v1beta/models/gemini-test:generatecontent "),
        "unexpected request line: {}",
        captured.head.lines().next().unwrap_or_default()
    );
    assert!(head.contains("x-goog-api-key: secret-key"));
    assert!(!head.contains("key=secret-key"), "key must not be in the URL");

    let body: serde_json::Value = serde_json::from_str(&captured.body).unwrap();
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[0]["parts"][0]["text"], "Write C.");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[2]["role"], "user");
    assert_eq!(contents[2]["parts"][0]["text"], "fix it");
}

#[tokio::test]
async fn test_error_status_is_transport_failure() {
    let (addr, _captured) =
        serve_once(500, r#"{"error":{"code":500,"message":"backend unavailable"}}"#).await;
    let generator = generator_for(addr, None);

    let err = generator
        .generate(&Transcript::seed("Write C."))
        .await
        .unwrap_err();

    assert!(matches!(err, CodegenError::Transport(_)));
    assert_eq!(err.exit_code(), 3);
    let msg = err.to_string();
    assert!(msg.contains("500"));
    assert!(msg.contains("backend unavailable"));
}

#[tokio::test]
async fn test_empty_candidates_is_malformed() {
    let (addr, _captured) = serve_once(200, r#"{"candidates":[]}"#).await;
    let generator = generator_for(addr, None);

    let err = generator
        .generate(&Transcript::seed("Write C."))
        .await
        .unwrap_err();
    assert!(matches!(err, CodegenError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_response_log_holds_latest_body() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("response.json");
    std::fs::write(&log, "stale").unwrap();

    let (addr, _captured) = serve_once(200, TWO_PART_REPLY).await;
    let generator = generator_for(addr, Some(log.clone()));
    generator.generate(&Transcript::seed("Write C.")).await.unwrap();

    assert_eq!(std::fs::read_to_string(&log).unwrap(), TWO_PART_REPLY);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_failure() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let generator = generator_for(addr, None);

    let err = generator
        .generate(&Transcript::seed("Write C."))
        .await
        .unwrap_err();
    assert!(matches!(err, CodegenError::Transport(_)));
}
