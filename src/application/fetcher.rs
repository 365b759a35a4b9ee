use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt};
use image::ImageReader;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::{
    domain::{DownloadResult, ImageDescriptor, SavedImage},
    http::{HttpClient, ImageStream},
    utils::{extension_for, image_filename},
};

/// Downloads a single image into a task folder.
#[derive(Clone)]
pub struct Fetcher {
    client: HttpClient,
    max_image_size: u64,
}

impl Fetcher {
    pub fn new(client: HttpClient, max_image_size: u64) -> Self {
        Self {
            client,
            max_image_size,
        }
    }

    /// Download `image` into `dest_dir`. Every failure is folded into the returned result.
    pub async fn fetch(&self, image: &ImageDescriptor, dest_dir: &Path, prefer_hd: bool) -> DownloadResult {
        let url = if prefer_hd {
            &image.preferred_url
        } else {
            &image.source_url
        };

        match self.download(image.index, url, dest_dir).await {
            Ok(saved) => {
                debug!(index = image.index, url = %url, size = saved.byte_size, "image saved");
                DownloadResult::saved(image.index, saved)
            }
            Err(reason) => {
                warn!(index = image.index, url = %url, %reason, "image download failed");
                DownloadResult::failed(image.index, reason)
            }
        }
    }

    async fn download(&self, index: usize, url: &str, dest_dir: &Path) -> Result<SavedImage, String> {
        let ImageStream {
            content_type,
            content_length,
            mut stream,
        } = self.client.open_image(url).await.map_err(|e| e.to_string())?;

        if let Some(size) = content_length {
            if size > self.max_image_size {
                return Err(format!(
                    "Image too large: {} bytes exceeds limit of {}",
                    size, self.max_image_size
                ));
            }
        }

        let filename = image_filename(index, extension_for(content_type.as_deref(), url));
        let path = dest_dir.join(&filename);

        let byte_size = match write_stream(&path, &mut stream, self.max_image_size).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e);
            }
        };

        let (format, dimensions) = match probe_image(path.clone()).await {
            Some((format, dimensions)) => (format, Some(dimensions)),
            None => (None, None),
        };

        Ok(SavedImage {
            path,
            filename,
            byte_size,
            format,
            dimensions,
        })
    }
}

async fn write_stream(
    path: &Path,
    stream: &mut BoxStream<'static, crate::http::client::Result<Bytes>>,
    limit: u64,
) -> Result<u64, String> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| format!("Failed to create file: {}", e))?;

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| e.to_string())?;
        written += chunk.len() as u64;
        if written > limit {
            return Err(format!("Image too large: exceeds limit of {} bytes", limit));
        }
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("Write error: {}", e))?;
    }

    file.sync_all()
        .await
        .map_err(|e| format!("Failed to sync file: {}", e))?;
    Ok(written)
}

/// Sniff the format and read the pixel dimensions of a saved file.
///
/// Returns `None` when the bytes are not a readable image; the file is kept either way.
async fn probe_image(path: PathBuf) -> Option<(Option<String>, (u32, u32))> {
    let shown = path.display().to_string();
    let probed = tokio::task::spawn_blocking(move || -> image::ImageResult<_> {
        let reader = ImageReader::open(&path)?.with_guessed_format()?;
        let format = reader.format();
        let dimensions = reader.into_dimensions()?;
        Ok((format, dimensions))
    })
    .await;

    match probed {
        Ok(Ok((format, dimensions))) => {
            let format = format.map(|f| format!("{:?}", f).to_uppercase());
            Some((format, dimensions))
        }
        Ok(Err(e)) => {
            debug!(path = %shown, error = %e, "saved file is not a decodable image");
            None
        }
        Err(e) => {
            warn!(path = %shown, error = %e, "image probe task failed");
            None
        }
    }
}
