use std::time::Duration;

use bytes::BytesMut;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;
use tracing::{debug, warn};

use super::models::{ImageStream, ProxiedImage};
use crate::config::PipelineConfig;

const PROXY_REFERER: &str = "https://mp.weixin.qq.com/";
const DESKTOP_WECHAT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36 MicroMessenger/7.0.20.1781(0x6700143B) NetType/WIFI MiniProgramEnv/Windows WindowsWechat/WMPF";
const MOBILE_WECHAT_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_7_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.2 Mobile/15E148 Safari/604.1 wechatdevtools/1.05.2109300 MicroMessenger/8.0.5 Language/zh_CN webview/";

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    RequestError(reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(StatusCode),

    #[error("content too large: {size} bytes exceeds limit of {limit}")]
    TooLarge { size: u64, limit: u64 },

    #[error("invalid content: {0}")]
    InvalidContent(String),
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpError::Timeout
        } else {
            HttpError::RequestError(e)
        }
    }
}

impl HttpError {
    /// Status the serving layer should answer with when relaying this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            HttpError::Timeout => 504,
            HttpError::InvalidContent(_) => 400,
            HttpError::TooLarge { .. } => 413,
            HttpError::RequestError(_) | HttpError::Status(_) => 502,
        }
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;

#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    proxy_timeout: Duration,
    proxy_max_size: u64,
    proxy_min_size: u64,
}

impl HttpClient {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en;q=0.8"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            proxy_timeout: config.proxy_timeout(),
            proxy_max_size: config.proxy_max_size,
            proxy_min_size: config.proxy_min_size,
        })
    }

    /// Fetch an article page as text. Bodies are decoded as UTF-8 regardless of the
    /// declared charset.
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = check_status(self.client.get(url).send().await?)?;
        let body = response.bytes().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Start an image download and hand back the body as a stream.
    pub async fn open_image(&self, url: &str) -> Result<ImageStream> {
        let response = check_status(self.client.get(url).send().await?)?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let content_length = response.content_length();
        let stream = response.bytes_stream().map_err(HttpError::from).boxed();

        Ok(ImageStream {
            content_type,
            content_length,
            stream,
        })
    }

    /// Fetch one external image on behalf of a browser that cannot load it directly.
    pub async fn relay_image(&self, url: &str) -> Result<ProxiedImage> {
        debug!(url, "proxying image");

        let mut response = self.proxy_request(url, DESKTOP_WECHAT_UA).await?;
        if response.status() != StatusCode::OK {
            warn!(
                url,
                status = %response.status(),
                "proxy request rejected, retrying with mobile user agent"
            );
            response = self.proxy_request(url, MOBILE_WECHAT_UA).await?;
        }
        let response = check_status(response)?;

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(HttpError::InvalidContent(format!(
                "not an image: {}",
                content_type
            )));
        }

        if let Some(size) = response.content_length() {
            if size > self.proxy_max_size {
                return Err(HttpError::TooLarge {
                    size,
                    limit: self.proxy_max_size,
                });
            }
        }

        let mut data = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            data.extend_from_slice(&chunk?);
            if data.len() as u64 > self.proxy_max_size {
                return Err(HttpError::TooLarge {
                    size: data.len() as u64,
                    limit: self.proxy_max_size,
                });
            }
        }

        if (data.len() as u64) < self.proxy_min_size {
            return Err(HttpError::InvalidContent(format!(
                "image data too small: {} bytes",
                data.len()
            )));
        }

        debug!(url, size = data.len(), %content_type, "proxied image");
        Ok(ProxiedImage {
            content_type,
            data: data.freeze(),
        })
    }

    async fn proxy_request(&self, url: &str, user_agent: &'static str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, user_agent)
            .header(header::REFERER, PROXY_REFERER)
            .timeout(self.proxy_timeout)
            .send()
            .await?;
        Ok(response)
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(HttpError::Status(status))
    }
}
