//! One-shot HTTP server for provider client tests

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// What the client sent
pub struct Captured {
    pub head: String,
    pub body: serde_json::Value,
}

/// Serve a single canned response on a random local port
///
/// Returns the base URL and a receiver for the captured request.
pub async fn serve_once(status_line: &str, content_type: &str, payload: String) -> (String, oneshot::Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {status_line}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{payload}",
        payload.len()
    );
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let (head, body) = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_string();
                let len = content_length(&head);
                if buf.len() >= pos + 4 + len || n == 0 {
                    let end = (pos + 4 + len).min(buf.len());
                    break (head, buf[pos + 4..end].to_vec());
                }
            }
            if n == 0 {
                break (String::from_utf8_lossy(&buf).to_string(), Vec::new());
            }
        };

        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        let body = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        let _ = tx.send(Captured { head, body });
    });

    (format!("http://{addr}"), rx)
}

/// Render `data:` lines as a server-sent event body
pub fn sse(events: &[&str]) -> String {
    events.iter().map(|e| format!("data: {e}\n\n")).collect()
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.trim().eq_ignore_ascii_case("content-length") {
                value.trim().parse().ok()
            } else {
                None
            }
        })
        .unwrap_or(0)
}
