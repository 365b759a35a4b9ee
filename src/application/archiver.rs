use std::collections::HashSet;
use std::fs::File;
use std::io;
use std::path::PathBuf;

use tracing::{info, warn};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

use crate::domain::AppError;
use crate::utils::archive_filename;

/// Result of packing a batch.
#[derive(Debug, Clone)]
pub struct PackagedArchive {
    pub path: PathBuf,
    pub entry_count: usize,
    /// Inputs that were missing or unreadable when the archive was written.
    pub skipped: Vec<PathBuf>,
}

/// Packs downloaded images into one zip per task.
#[derive(Debug, Clone)]
pub struct Archiver {
    output_dir: PathBuf,
}

impl Archiver {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write `files` into `images_{task_id}.zip`, keeping only their base names.
    ///
    /// Files that disappeared since download are skipped. Blocking; run it off the
    /// async executor.
    pub fn create_archive(&self, files: &[PathBuf], task_id: &str) -> Result<PackagedArchive, AppError> {
        std::fs::create_dir_all(&self.output_dir).map_err(packaging)?;
        let path = self.output_dir.join(archive_filename(task_id));
        let file = File::create(&path).map_err(packaging)?;

        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut names = HashSet::new();
        let mut skipped = Vec::new();
        for src in files {
            let Some(name) = src.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                warn!(task_id, path = %src.display(), "skipping path without a file name");
                skipped.push(src.clone());
                continue;
            };
            if !names.insert(name.clone()) {
                warn!(task_id, %name, "skipping duplicate archive entry");
                skipped.push(src.clone());
                continue;
            }

            let mut input = match File::open(src) {
                Ok(f) => f,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    warn!(task_id, path = %src.display(), "file vanished before archiving, skipping");
                    names.remove(&name);
                    skipped.push(src.clone());
                    continue;
                }
                Err(e) => return Err(packaging(e)),
            };

            zip.start_file(name.as_str(), options).map_err(packaging)?;
            io::copy(&mut input, &mut zip).map_err(packaging)?;
        }
        zip.finish().map_err(packaging)?;

        let entry_count = names.len();
        if entry_count == 0 {
            let _ = std::fs::remove_file(&path);
            warn!(task_id, requested = files.len(), "no file left to archive");
            return Err(AppError::PackagingFailure(format!(
                "none of the {} downloaded files could be archived",
                files.len()
            )));
        }
        info!(task_id, entries = entry_count, skipped = skipped.len(), path = %path.display(), "archive created");
        Ok(PackagedArchive {
            path,
            entry_count,
            skipped,
        })
    }
}

fn packaging(e: impl std::fmt::Display) -> AppError {
    AppError::PackagingFailure(e.to_string())
}
