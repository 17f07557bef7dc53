//! Integration tests for the shared HTTP plumbing, against a minimal
//! local HTTP server.

use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use ratehub::error::Error;
use ratehub::transport::Http;

#[derive(Debug, Deserialize)]
struct Ticker {
    ask: String,
    bid: String,
}

/// Serve one HTTP request with a fixed response.
async fn spawn_http_server(status_line: &'static str, body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        // read until the end of the request headers
        let mut seen = Vec::new();
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            seen.extend_from_slice(&buf[..n]);
            if n == 0 || seen.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        let response = format!(
            "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn get_json_decodes_the_response() {
    let url = spawn_http_server("HTTP/1.1 200 OK", r#"{"ask":"6501","bid":"6500"}"#).await;

    let http = Http::new();
    let ticker: Ticker = http.get_json(&url).await.unwrap();
    assert_eq!(ticker.ask, "6501");
    assert_eq!(ticker.bid, "6500");
}

#[tokio::test]
async fn http_error_status_is_a_transport_error() {
    let url = spawn_http_server("HTTP/1.1 503 Service Unavailable", "{}").await;

    let http = Http::new();
    let result: Result<Ticker, _> = http.get_json(&url).await;
    assert!(matches!(result, Err(Error::Transport(_))));
}

#[tokio::test]
async fn post_form_carries_signed_headers() {
    let url = spawn_http_server("HTTP/1.1 200 OK", r#"{"ask":"1","bid":"1"}"#).await;

    let signer = ratehub::testkit::trading::test_signer("transport");
    let signed = signer.sign("/0/private/Balance", &[]).unwrap();

    let http = Http::new();
    let headers = signed.header_map().unwrap();
    let ticker: Ticker = http
        .post_form(&url, signed.body, headers)
        .await
        .unwrap();
    assert_eq!(ticker.ask, "1");
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    let http = Http::new();
    let result: Result<Ticker, _> = http.get_json("http://127.0.0.1:9/ticker").await;
    assert!(matches!(result, Err(Error::Transport(_))));
}
