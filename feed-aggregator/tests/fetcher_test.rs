use feed_aggregator::{AggregatorError, FeedTransport, FetchConfig, Fetcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const MB: usize = 1024 * 1024;

fn response(status: &str, headers: &[(&str, String)], body: &[u8]) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {}\r\n", status);
    for (name, value) in headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("Connection: close\r\n\r\n");

    let mut bytes = head.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

fn with_length(status: &str, body: &[u8]) -> Vec<u8> {
    response(status, &[("Content-Length", body.len().to_string())], body)
}

/// Local HTTP/1.1 server answering each request path through `handler`.
/// `None` leaves the connection open without replying.
async fn spawn_server<F>(handler: F) -> String
where
    F: Fn(&str) -> Option<Vec<u8>> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }

                let text = String::from_utf8_lossy(&request);
                let path = text.split_whitespace().nth(1).unwrap_or("/").to_string();
                match handler(&path) {
                    Some(reply) => {
                        let _ = socket.write_all(&reply).await;
                        let _ = socket.shutdown().await;
                    }
                    None => tokio::time::sleep(Duration::from_secs(3600)).await,
                }
            });
        }
    });

    format!("http://{}", addr)
}

fn fetcher(max_feed_size_mb: usize) -> Fetcher {
    Fetcher::new(FetchConfig {
        max_feed_size_mb,
        ..FetchConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_fetch_returns_body() {
    let base = spawn_server(|path| match path {
        "/rss" => Some(with_length("200 OK", b"<rss version=\"2.0\"></rss>")),
        _ => Some(with_length("404 Not Found", b"")),
    })
    .await;

    let body = fetcher(10)
        .fetch_document(&format!("{}/rss", base), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(body, b"<rss version=\"2.0\"></rss>".to_vec());
}

#[tokio::test]
async fn test_non_success_status_is_reported() {
    let base = spawn_server(|_| Some(with_length("503 Service Unavailable", b"busy"))).await;
    let url = format!("{}/rss", base);

    let result = fetcher(10).fetch_document(&url, Duration::from_secs(5)).await;

    match result {
        Err(AggregatorError::HttpStatus { url: failed, status }) => {
            assert_eq!(failed, url);
            assert_eq!(status, 503);
        }
        other => panic!("expected HTTP status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let base = spawn_server(|_| None).await;

    let result = fetcher(10)
        .fetch_document(&format!("{}/rss", base), Duration::from_millis(200))
        .await;

    assert!(matches!(result, Err(AggregatorError::Timeout { .. })));
}

#[tokio::test]
async fn test_declared_length_over_limit_is_rejected() {
    let base = spawn_server(|_| {
        Some(response(
            "200 OK",
            &[("Content-Length", (2 * MB).to_string())],
            b"<rss/>",
        ))
    })
    .await;

    let result = fetcher(1)
        .fetch_document(&format!("{}/rss", base), Duration::from_secs(5))
        .await;

    match result {
        Err(AggregatorError::FeedTooLarge { size_bytes, limit_bytes }) => {
            assert_eq!(size_bytes, (2 * MB) as u64);
            assert_eq!(limit_bytes, MB as u64);
        }
        other => panic!("expected size error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_undeclared_body_over_limit_is_rejected() {
    // No Content-Length; the body ends when the connection closes.
    let base = spawn_server(|_| Some(response("200 OK", &[], &vec![b'x'; MB + MB / 2]))).await;

    let result = fetcher(1)
        .fetch_document(&format!("{}/rss", base), Duration::from_secs(5))
        .await;

    assert!(matches!(result, Err(AggregatorError::FeedTooLarge { .. })));
}

#[tokio::test]
async fn test_fraction_of_a_megabyte_over_limit_is_rejected() {
    let body = vec![b'x'; MB + 1];
    let base = spawn_server(move |_| Some(with_length("200 OK", &body))).await;

    let result = fetcher(1)
        .fetch_document(&format!("{}/rss", base), Duration::from_secs(5))
        .await;

    assert!(matches!(result, Err(AggregatorError::FeedTooLarge { .. })));
}

#[tokio::test]
async fn test_resolve_follows_redirects() {
    let base = spawn_server(|path| match path {
        "/~r/site/1" => Some(response(
            "302 Found",
            &[("Location", "/articles/1".to_string()), ("Content-Length", "0".to_string())],
            b"",
        )),
        "/articles/1" => Some(with_length("200 OK", b"article")),
        _ => Some(with_length("404 Not Found", b"")),
    })
    .await;

    let final_url = fetcher(10)
        .resolve_final_url(&format!("{}/~r/site/1", base), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(final_url, format!("{}/articles/1", base));
}
