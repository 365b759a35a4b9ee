use std::path::{Path, PathBuf};

use futures::StreamExt;
use tracing::{error, info, warn};

use crate::{
    application::{
        archiver::{Archiver, PackagedArchive},
        fetcher::Fetcher,
        task_registry::TaskRegistry,
    },
    config::PipelineConfig,
    domain::{AppError, DownloadOptions, DownloadOutcome, ImageDescriptor, SavedImage},
    http::HttpClient,
};

/// Everything a batch produced. `saved.len() + errors.len()` equals the batch size.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub saved: Vec<SavedImage>,
    pub errors: Vec<String>,
}

/// Runs a batch of fetches with a bounded number of workers and reports progress
/// into the task registry.
#[derive(Clone)]
pub struct DownloadCoordinator {
    fetcher: Fetcher,
    archiver: Archiver,
    registry: TaskRegistry,
    temp_dir: PathBuf,
    max_workers: usize,
}

impl DownloadCoordinator {
    pub fn new(
        fetcher: Fetcher,
        archiver: Archiver,
        registry: TaskRegistry,
        temp_dir: PathBuf,
        max_workers: usize,
    ) -> Self {
        Self {
            fetcher,
            archiver,
            registry,
            temp_dir,
            max_workers: max_workers.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig, client: HttpClient, registry: TaskRegistry) -> Self {
        Self::new(
            Fetcher::new(client, config.max_image_size),
            Archiver::new(config.download_dir.clone()),
            registry,
            config.temp_dir.clone(),
            config.workers(),
        )
    }

    /// Download `images`, pack the successes and leave the task `completed` or `error`.
    pub async fn run(
        &self,
        task_id: &str,
        images: Vec<ImageDescriptor>,
        options: DownloadOptions,
    ) -> Result<PackagedArchive, AppError> {
        let batch = match self.download_batch(task_id, images, options).await {
            Ok(batch) => batch,
            Err(e) => {
                self.fail(task_id, &e, Vec::new());
                return Err(e);
            }
        };

        self.package(task_id, batch).await
    }

    /// Pack the saved files of `batch` and move the task to its terminal state.
    ///
    /// The recorded success count is the number of files that made it into the archive.
    pub async fn package(&self, task_id: &str, batch: BatchOutcome) -> Result<PackagedArchive, AppError> {
        if batch.saved.is_empty() {
            let e = AppError::BatchFailed(batch.errors.len());
            self.fail(task_id, &e, batch.errors);
            return Err(e);
        }

        self.registry
            .update(task_id, |task| task.set_message("Packing files..."));

        let files: Vec<PathBuf> = batch.saved.iter().map(|s| s.path.clone()).collect();
        let archiver = self.archiver.clone();
        let id = task_id.to_string();
        let packaged = tokio::task::spawn_blocking(move || archiver.create_archive(&files, &id))
            .await
            .map_err(|e| AppError::PackagingFailure(e.to_string()))
            .and_then(|result| result);

        match packaged {
            Ok(archive) => {
                info!(
                    task_id,
                    archived = archive.entry_count,
                    failed = batch.errors.len(),
                    "task completed"
                );
                self.registry.update(task_id, |task| {
                    task.complete(archive.path.clone(), archive.entry_count, batch.errors)
                });
                Ok(archive)
            }
            Err(e) => {
                self.fail(task_id, &e, batch.errors);
                Err(e)
            }
        }
    }

    /// Fetch every image, at most `max_workers` at a time, recording progress as each
    /// one finishes.
    pub async fn download_batch(
        &self,
        task_id: &str,
        images: Vec<ImageDescriptor>,
        options: DownloadOptions,
    ) -> Result<BatchOutcome, AppError> {
        let task_dir = self.temp_dir.join(task_id);
        tokio::fs::create_dir_all(&task_dir).await?;

        let total = images.len();
        info!(task_id, total, workers = self.max_workers, "starting image downloads");

        let fetcher = &self.fetcher;
        let dest: &Path = &task_dir;
        let prefer_hd = options.get_original;
        let mut results = futures::stream::iter(images)
            .map(move |image| async move { fetcher.fetch(&image, dest, prefer_hd).await })
            .buffer_unordered(self.max_workers);

        let mut outcome = BatchOutcome::default();
        while let Some(result) = results.next().await {
            match result.outcome {
                DownloadOutcome::Saved(image) => {
                    let message = format!("Downloaded: {}", image.filename);
                    self.registry.update(task_id, |task| {
                        if let Some(d) = task.images.iter_mut().find(|d| d.index == result.index) {
                            d.record_download(&image);
                        }
                        task.record_progress(message);
                    });
                    outcome.saved.push(image);
                }
                DownloadOutcome::Failed(reason) => {
                    let e = AppError::ItemFailure {
                        index: result.index,
                        reason,
                    }
                    .to_string();
                    self.registry
                        .update(task_id, |task| task.record_progress(format!("Failed: {}", e)));
                    outcome.errors.push(e);
                }
            }
        }

        info!(
            task_id,
            saved = outcome.saved.len(),
            failed = outcome.errors.len(),
            "image downloads finished"
        );
        if !outcome.errors.is_empty() {
            warn!(task_id, errors = ?outcome.errors, "some images failed");
        }
        Ok(outcome)
    }

    fn fail(&self, task_id: &str, e: &AppError, errors: Vec<String>) {
        error!(task_id, error = %e, "download task failed");
        self.registry
            .update(task_id, |task| task.fail(format!("Download failed: {}", e), errors));
    }
}
