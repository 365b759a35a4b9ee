use std::path::PathBuf;

use regex::Regex;
use tracing::{info, warn};
use url::Url;

use crate::{
    application::{download_coordinator::DownloadCoordinator, task_registry::TaskRegistry},
    config::PipelineConfig,
    domain::{AppError, DownloadOptions, DownloadTask, FilterOptions, ImageDescriptor, TaskStatus},
    filter, resolver,
    http::{HttpClient, HttpError, ProxiedImage},
    utils::{generate_task_id, generate_unique_task_id},
};

/// Outcome of analysing an article.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub task_id: String,
    pub images: Vec<ImageDescriptor>,
}

/// A finished archive opened for streaming back to a client.
#[derive(Debug)]
pub struct ArchiveDownload {
    pub file: tokio::fs::File,
    pub path: PathBuf,
    /// Name a client should save the archive under.
    pub file_name: String,
    pub size: u64,
}

/// The operations the request layer builds on.
#[derive(Clone)]
pub struct ImagePipeline {
    article_pattern: Regex,
    client: HttpClient,
    registry: TaskRegistry,
    coordinator: DownloadCoordinator,
}

impl ImagePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, AppError> {
        Self::with_registry(config, TaskRegistry::new())
    }

    pub fn with_registry(config: PipelineConfig, registry: TaskRegistry) -> Result<Self, AppError> {
        let article_pattern = Regex::new(&config.article_url_pattern).map_err(|e| {
            AppError::InvalidInput(format!("article_url_pattern is not a valid regex: {}", e))
        })?;
        let client = HttpClient::new(&config)
            .map_err(|e| AppError::FetchFailure(format!("failed to build HTTP client: {}", e)))?;
        let coordinator = DownloadCoordinator::from_config(&config, client.clone(), registry.clone());

        Ok(Self {
            article_pattern,
            client,
            registry,
            coordinator,
        })
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Fetch an article, extract and filter its images, and register a `ready` task.
    pub async fn analyze(&self, url: &str, filters: &FilterOptions) -> Result<Analysis, AppError> {
        let url = url.trim();
        let base = self.validate_url(url)?;

        let task_id = self.register_task(url);
        info!(task_id, url, "analyzing article");

        let html = match self.client.fetch_page(url).await {
            Ok(html) => html,
            Err(e) => return Err(self.fail_task(&task_id, AppError::FetchFailure(e.to_string()))),
        };

        self.registry
            .update(&task_id, |task| task.set_message("Extracting images..."));
        let images = resolver::extract_images(&html, &base);
        if images.is_empty() {
            return Err(self.fail_task(
                &task_id,
                AppError::NoContentFound("the article contains no images".to_string()),
            ));
        }

        self.registry
            .update(&task_id, |task| task.set_message("Filtering images..."));
        let accepted = filter::filter_images(&images, filters);
        if accepted.is_empty() {
            return Err(self.fail_task(
                &task_id,
                AppError::NoContentFound(format!("all {} images were filtered out", images.len())),
            ));
        }

        self.registry
            .update(&task_id, |task| task.mark_ready(accepted.clone()));
        info!(task_id, found = images.len(), accepted = accepted.len(), "analysis complete");

        Ok(Analysis {
            task_id,
            images: accepted,
        })
    }

    /// Move a `ready` task to `downloading` and run the batch in the background.
    ///
    /// `selected` holds descriptor indices; `None` or an empty slice selects everything.
    /// Returns the number of images queued. Outside a Tokio runtime the task is left
    /// untouched and `Unavailable` is returned.
    pub fn start_download(
        &self,
        task_id: &str,
        selected: Option<&[usize]>,
        options: DownloadOptions,
    ) -> Result<usize, AppError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::Unavailable(e.to_string()))?;

        let batch = self
            .registry
            .update(task_id, |task| {
                if task.status != TaskStatus::Ready {
                    return Err(AppError::InvalidState {
                        task_id: task.id.clone(),
                        expected: TaskStatus::Ready,
                        actual: task.status,
                    });
                }

                let batch: Vec<ImageDescriptor> = match selected {
                    Some(indices) if !indices.is_empty() => task
                        .images
                        .iter()
                        .filter(|image| indices.contains(&image.index))
                        .cloned()
                        .collect(),
                    _ => task.images.clone(),
                };
                if batch.is_empty() {
                    return Err(AppError::InvalidInput(
                        "no images selected for download".to_string(),
                    ));
                }

                task.begin_download(batch.len());
                Ok(batch)
            })
            .ok_or_else(|| AppError::NotFound(task_id.to_string()))??;

        let count = batch.len();
        info!(task_id, count, get_original = options.get_original, "download started");

        let coordinator = self.coordinator.clone();
        let id = task_id.to_string();
        runtime.spawn(async move {
            if let Err(e) = coordinator.run(&id, batch, options).await {
                warn!(task_id = %id, error = %e, "background download ended with an error");
            }
        });

        Ok(count)
    }

    pub fn status(&self, task_id: &str) -> Result<DownloadTask, AppError> {
        self.registry
            .get(task_id)
            .ok_or_else(|| AppError::NotFound(task_id.to_string()))
    }

    /// Open the archive of a `completed` task.
    pub async fn fetch_archive(&self, task_id: &str) -> Result<ArchiveDownload, AppError> {
        let task = self.status(task_id)?;
        if task.status != TaskStatus::Completed {
            return Err(AppError::InvalidState {
                task_id: task.id,
                expected: TaskStatus::Completed,
                actual: task.status,
            });
        }

        let path = task
            .archive_path
            .ok_or_else(|| AppError::NotFound(format!("archive for task {}", task_id)))?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!("archive {}", path.display())));
            }
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata().await?.len();

        Ok(ArchiveDownload {
            file,
            path,
            file_name: format!("article_images_{}.zip", task_id),
            size,
        })
    }

    /// Relay one external image, independent of any task.
    pub async fn proxy_image(&self, url: &str) -> Result<ProxiedImage, HttpError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(HttpError::InvalidContent("missing image url".to_string()));
        }
        self.client.relay_image(url).await
    }

    fn validate_url(&self, url: &str) -> Result<Url, AppError> {
        if url.is_empty() {
            return Err(AppError::InvalidInput("please provide an article URL".to_string()));
        }
        if !self.article_pattern.is_match(url) {
            return Err(AppError::InvalidInput(format!(
                "not a supported article link: {}",
                url
            )));
        }
        Url::parse(url).map_err(|e| AppError::InvalidInput(format!("{}: {}", url, e)))
    }

    fn register_task(&self, url: &str) -> String {
        let mut task_id = generate_task_id(url);
        while !self.registry.insert(DownloadTask::new(task_id.clone())) {
            task_id = generate_unique_task_id(url);
        }
        task_id
    }

    fn fail_task(&self, task_id: &str, e: AppError) -> AppError {
        warn!(task_id, error = %e, "analysis failed");
        self.registry
            .update(task_id, |task| task.fail(e.to_string(), Vec::new()));
        e
    }
}
