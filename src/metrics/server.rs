use anyhow::Context;
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// Binds the metrics listener and serves it in the background
pub async fn start_metrics_server(port: u16) -> anyhow::Result<SocketAddr> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind metrics server to {addr}"))?;
    let local_addr = listener.local_addr()?;

    info!(
        "Starting Prometheus metrics server on http://{}/metrics",
        local_addr
    );

    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(listener).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn run_metrics_server(listener: TcpListener) -> anyhow::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!("Metrics request from {}", peer);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream).await {
                error!("Failed to serve metrics request: {}", e);
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream) -> anyhow::Result<()> {
    let mut buffer = [0; 1024];
    let read = stream.read(&mut buffer).await?;
    let request = String::from_utf8_lossy(&buffer[..read]);

    let response = match request_path(&request) {
        Some("/metrics") => {
            let encoder = TextEncoder::new();
            let mut body = Vec::new();
            encoder.encode(&prometheus::gather(), &mut body)?;
            http_response("200 OK", encoder.format_type(), &String::from_utf8_lossy(&body))
        }
        Some("/health") => http_response("200 OK", "text/plain", "ok"),
        _ => http_response("404 Not Found", "text/plain", "not found"),
    };

    stream.write_all(response.as_bytes()).await?;
    Ok(())
}

fn request_path(request: &str) -> Option<&str> {
    let mut parts = request.lines().next()?.split_whitespace();
    let _method = parts.next()?;
    parts.next()
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path() {
        assert_eq!(request_path("GET /metrics HTTP/1.1\r\nHost: x\r\n"), Some("/metrics"));
        assert_eq!(request_path(""), None);
    }

    #[tokio::test]
    async fn test_serves_metrics_and_404() {
        crate::metrics::PriceMetrics::record_adjustment(true);
        let addr = start_metrics_server(0).await.unwrap();
        let base = format!("http://127.0.0.1:{}", addr.port());

        let body = reqwest::get(format!("{base}/metrics"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("marketguard_price_adjustments_total"));

        let status = reqwest::get(format!("{base}/other")).await.unwrap().status();
        assert_eq!(status.as_u16(), 404);
    }
}
