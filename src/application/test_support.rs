//! Shared fixtures for application tests.

use std::io::Cursor;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::PipelineConfig;
use crate::http::HttpClient;

pub fn http_client(config: &PipelineConfig) -> HttpClient {
    HttpClient::new(config).expect("client should build")
}

/// A real PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::new(width, height);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)
        .expect("png encoding should succeed");
    buf.into_inner()
}

/// Address of a server that accepts connections and never answers.
pub async fn silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("listener has an address");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

/// Address of a server answering every request with `body` sent as chunked
/// transfer encoding, so the response carries no `Content-Length`.
pub async fn chunked_server(content_type: &'static str, body: Vec<u8>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("listener has an address");
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;

                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
                    content_type
                );
                let mut response = head.into_bytes();
                for chunk in body.chunks(512) {
                    response.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
                    response.extend_from_slice(chunk);
                    response.extend_from_slice(b"\r\n");
                }
                response.extend_from_slice(b"0\r\n\r\n");
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{}", addr)
}

/// Config rooted in a scratch directory, accepting article URLs on localhost.
pub fn local_config(root: &std::path::Path) -> PipelineConfig {
    PipelineConfig {
        download_dir: root.join("downloads"),
        temp_dir: root.join("temp"),
        request_timeout_secs: 1,
        article_url_pattern: r"^http://127\.0\.0\.1".to_string(),
        ..Default::default()
    }
}
