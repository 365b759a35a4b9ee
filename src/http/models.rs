use bytes::Bytes;
use futures::stream::BoxStream;

use super::client::Result;

/// An image response whose body has not been read yet.
pub struct ImageStream {
    pub content_type: Option<String>,
    /// Declared `Content-Length`, if the server sent one.
    pub content_length: Option<u64>,
    pub stream: BoxStream<'static, Result<Bytes>>,
}

/// Image bytes relayed by the proxy.
#[derive(Debug, Clone)]
pub struct ProxiedImage {
    pub content_type: String,
    pub data: Bytes,
}

impl ProxiedImage {
    /// Headers the serving layer should attach when relaying the image.
    pub fn response_headers(&self) -> [(&'static str, String); 4] {
        [
            ("Content-Type", self.content_type.clone()),
            ("Content-Length", self.data.len().to_string()),
            ("Cache-Control", "public, max-age=3600".to_string()),
            ("Access-Control-Allow-Origin", "*".to_string()),
        ]
    }
}
