use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::AppError;

pub const DEFAULT_ARTICLE_URL_PATTERN: &str = r"^https?://mp\.weixin\.qq\.com/s[/?]";

/// Runtime settings for the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Where finished archives are written.
    pub download_dir: PathBuf,
    /// Per-task scratch folders for downloaded images.
    pub temp_dir: PathBuf,
    pub max_workers: usize,
    pub request_timeout_secs: u64,
    pub max_image_size: u64,
    pub proxy_timeout_secs: u64,
    pub proxy_max_size: u64,
    pub proxy_min_size: u64,
    pub article_url_pattern: String,
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("downloads"),
            temp_dir: PathBuf::from("temp"),
            max_workers: 5,
            request_timeout_secs: 30,
            max_image_size: 50 * 1024 * 1024,
            proxy_timeout_secs: 15,
            proxy_max_size: 10 * 1024 * 1024,
            proxy_min_size: 100,
            article_url_pattern: DEFAULT_ARTICLE_URL_PATTERN.to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| AppError::InvalidInput(format!("config {}: {}", path.display(), e)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }

    /// Worker ceiling, never below one.
    pub fn workers(&self) -> usize {
        self.max_workers.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: PipelineConfig =
            serde_json::from_str(r#"{"max_workers": 8, "download_dir": "/tmp/downloads"}"#)
                .unwrap();
        assert_eq!(cfg.max_workers, 8);
        assert_eq!(cfg.download_dir, PathBuf::from("/tmp/downloads"));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.max_image_size, 50 * 1024 * 1024);
    }

    #[test]
    fn test_zero_workers_clamped() {
        let cfg = PipelineConfig {
            max_workers: 0,
            ..Default::default()
        };
        assert_eq!(cfg.workers(), 1);
    }
}
