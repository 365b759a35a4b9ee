use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One image candidate discovered in an article, before any download happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub index: usize,
    pub source_url: String,
    pub preferred_url: String,
    pub alt_text: String,
    pub declared_width: String,
    pub declared_height: String,
    /// Set once from the downloaded bytes.
    pub byte_size: Option<u64>,
    pub detected_format: Option<String>,
    pub detected_width: Option<u32>,
    pub detected_height: Option<u32>,
}

impl ImageDescriptor {
    pub fn new(index: usize, source_url: String, preferred_url: String) -> Self {
        Self {
            index,
            source_url,
            preferred_url,
            alt_text: String::new(),
            declared_width: String::new(),
            declared_height: String::new(),
            byte_size: None,
            detected_format: None,
            detected_width: None,
            detected_height: None,
        }
    }

    /// Record what the download revealed. Fields that are already set are left alone.
    pub fn record_download(&mut self, saved: &SavedImage) {
        self.byte_size.get_or_insert(saved.byte_size);
        if let Some(format) = &saved.format {
            self.detected_format.get_or_insert_with(|| format.clone());
        }
        if let Some((width, height)) = saved.dimensions {
            self.detected_width.get_or_insert(width);
            self.detected_height.get_or_insert(height);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterOptions {
    pub exclude_avatar: bool,
    pub exclude_gif: bool,
    pub exclude_small: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadOptions {
    /// Download the high-quality variant instead of the URL found in the page.
    pub get_original: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self { get_original: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Analyzing,
    Ready,
    Downloading,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Analyzing => "analyzing",
            TaskStatus::Ready => "ready",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Status record for one analyze-then-download lifecycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTask {
    pub id: String,
    pub status: TaskStatus,
    pub completed: usize,
    pub total: usize,
    pub message: String,
    pub images: Vec<ImageDescriptor>,
    pub archive_path: Option<PathBuf>,
    pub successful_count: usize,
    pub errors: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl DownloadTask {
    pub fn new(id: String) -> Self {
        Self {
            id,
            status: TaskStatus::Analyzing,
            completed: 0,
            total: 0,
            message: "Analyzing article...".to_string(),
            images: Vec::new(),
            archive_path: None,
            successful_count: 0,
            errors: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn progress(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f32 / self.total as f32 * 100.0
        }
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
        self.touch();
    }

    pub fn mark_ready(&mut self, images: Vec<ImageDescriptor>) {
        self.status = TaskStatus::Ready;
        self.total = images.len();
        self.message = format!("Analysis complete, found {} images", images.len());
        self.images = images;
        self.touch();
    }

    pub fn begin_download(&mut self, total: usize) {
        self.status = TaskStatus::Downloading;
        self.completed = 0;
        self.total = total;
        self.successful_count = 0;
        self.errors.clear();
        self.message = "Starting download...".to_string();
        self.touch();
    }

    /// Count one finished item, successful or not.
    pub fn record_progress(&mut self, message: impl Into<String>) {
        self.completed = (self.completed + 1).min(self.total);
        self.message = message.into();
        self.touch();
    }

    pub fn complete(&mut self, archive_path: PathBuf, successful_count: usize, errors: Vec<String>) {
        self.status = TaskStatus::Completed;
        self.message = format!("Download complete, {} images saved", successful_count);
        self.archive_path = Some(archive_path);
        self.successful_count = successful_count;
        self.errors = errors;
        self.touch();
    }

    pub fn fail(&mut self, message: impl Into<String>, errors: Vec<String>) {
        self.status = TaskStatus::Error;
        self.message = message.into();
        self.archive_path = None;
        self.errors = errors;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A downloaded image persisted on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedImage {
    pub path: PathBuf,
    pub filename: String,
    pub byte_size: u64,
    pub format: Option<String>,
    pub dimensions: Option<(u32, u32)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Saved(SavedImage),
    Failed(String),
}

/// Per-image result of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    pub index: usize,
    pub outcome: DownloadOutcome,
}

impl DownloadResult {
    pub fn saved(index: usize, image: SavedImage) -> Self {
        Self {
            index,
            outcome: DownloadOutcome::Saved(image),
        }
    }

    pub fn failed(index: usize, error: impl Into<String>) -> Self {
        Self {
            index,
            outcome: DownloadOutcome::Failed(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DownloadOutcome::Saved(_))
    }

    pub fn artifact_path(&self) -> Option<&PathBuf> {
        match &self.outcome {
            DownloadOutcome::Saved(image) => Some(&image.path),
            DownloadOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            DownloadOutcome::Saved(_) => None,
            DownloadOutcome::Failed(e) => Some(e),
        }
    }
}
