use chrono::Utc;
use url::Url;

const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// Derive a 16-character task id from the article URL and the current time.
pub fn generate_task_id(url: &str) -> String {
    let digest = md5::compute(format!("{}{}", url, Utc::now().timestamp()));
    format!("{:x}", digest)[..16].to_string()
}

/// Same as [`generate_task_id`] but mixes in sub-second precision, used when the
/// second-resolution id is already taken.
pub fn generate_unique_task_id(url: &str) -> String {
    let now = Utc::now();
    let digest = md5::compute(format!(
        "{}{}{}",
        url,
        now.timestamp(),
        now.timestamp_subsec_nanos()
    ));
    format!("{:x}", digest)[..16].to_string()
}

/// Pick a file extension from the response content type, then the URL path, then `jpg`.
pub fn extension_for(content_type: Option<&str>, url: &str) -> &'static str {
    if let Some(content_type) = content_type {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("image/jpeg") {
            return "jpg";
        } else if content_type.contains("image/png") {
            return "png";
        } else if content_type.contains("image/webp") {
            return "webp";
        } else if content_type.contains("image/gif") {
            return "gif";
        }
    }

    Url::parse(url)
        .ok()
        .and_then(|u| {
            let last = u.path_segments()?.last()?.to_string();
            let (_, ext) = last.rsplit_once('.')?;
            let ext = ext.to_ascii_lowercase();
            KNOWN_EXTENSIONS.iter().copied().find(|known| *known == ext)
        })
        .unwrap_or("jpg")
}

/// Stable, zero-padded file name for the image at `index`.
pub fn image_filename(index: usize, extension: &str) -> String {
    format!("image_{:03}.{}", index + 1, extension)
}

pub fn archive_filename(task_id: &str) -> String {
    format!("images_{}.zip", task_id)
}
