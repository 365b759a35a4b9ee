//! Heuristic image filtering.
//!
//! Every enabled toggle is an independent exclusion rule; an image is dropped as soon
//! as one of them matches. Surviving images keep their order and original indices.

use tracing::debug;

use crate::domain::{FilterOptions, ImageDescriptor};

/// Alt-text keywords marking avatars, logos and QR codes.
const DECORATION_KEYWORDS: &[&str] = &["avatar", "logo", "qrcode", "二维码", "头像", "扫码"];
const DECORATION_URL_MARKERS: &[&str] = &["avatar", "logo"];
const THUMBNAIL_MARKERS: &[&str] = &["/64", "/32"];
const SMALL_EDGE: u32 = 100;

pub fn filter_images(images: &[ImageDescriptor], options: &FilterOptions) -> Vec<ImageDescriptor> {
    let kept: Vec<ImageDescriptor> = images
        .iter()
        .filter(|image| !should_skip(image, options))
        .cloned()
        .collect();

    debug!(
        total = images.len(),
        kept = kept.len(),
        skipped = images.len() - kept.len(),
        "filtered images"
    );
    kept
}

pub fn should_skip(image: &ImageDescriptor, options: &FilterOptions) -> bool {
    (options.exclude_avatar && is_decoration(image))
        || (options.exclude_gif && is_animated(image))
        || (options.exclude_small && is_small(image))
}

pub fn is_decoration(image: &ImageDescriptor) -> bool {
    let alt = image.alt_text.to_lowercase();
    DECORATION_KEYWORDS.iter().any(|k| alt.contains(k))
        || DECORATION_URL_MARKERS
            .iter()
            .any(|m| image.source_url.contains(m))
}

pub fn is_animated(image: &ImageDescriptor) -> bool {
    let url = image.source_url.to_lowercase();
    url.contains("gif") || url.ends_with(".gif") || url.contains("wx_fmt=gif")
}

/// Small either by declared size (both edges under 100px) or by a thumbnail-looking URL.
/// The two checks are independent.
pub fn is_small(image: &ImageDescriptor) -> bool {
    let declared_small = match (
        parse_dimension(&image.declared_width),
        parse_dimension(&image.declared_height),
    ) {
        (Some(w), Some(h)) => w < SMALL_EDGE && h < SMALL_EDGE,
        _ => false,
    };

    declared_small || has_thumbnail_url(&image.source_url)
}

fn has_thumbnail_url(url: &str) -> bool {
    url.to_lowercase().contains("thumb") || THUMBNAIL_MARKERS.iter().any(|m| url.contains(m))
}

/// Positive integer dimension, or `None` for anything else.
fn parse_dimension(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(index: usize, url: &str) -> ImageDescriptor {
        ImageDescriptor::new(index, url.to_string(), url.to_string())
    }

    fn sized(index: usize, url: &str, w: &str, h: &str) -> ImageDescriptor {
        let mut img = image(index, url);
        img.declared_width = w.to_string();
        img.declared_height = h.to_string();
        img
    }

    const ALL: FilterOptions = FilterOptions {
        exclude_avatar: true,
        exclude_gif: true,
        exclude_small: true,
    };

    #[test]
    fn test_no_toggles_keeps_everything() {
        let images = vec![image(0, "https://h/logo.gif"), image(1, "https://h/thumb.png")];
        assert_eq!(filter_images(&images, &FilterOptions::default()), images);
    }

    #[test]
    fn test_decoration_by_alt_and_url() {
        let mut qr = image(0, "https://h/a.png");
        qr.alt_text = "扫码关注".to_string();
        let mut upper = image(1, "https://h/b.png");
        upper.alt_text = "Company LOGO".to_string();
        let by_url = image(2, "https://h/user_avatar/c.png");
        let plain = image(3, "https://h/d.png");

        assert!(is_decoration(&qr));
        assert!(is_decoration(&upper));
        assert!(is_decoration(&by_url));
        assert!(!is_decoration(&plain));
    }

    #[test]
    fn test_animated() {
        assert!(is_animated(&image(0, "https://h/a.GIF")));
        assert!(is_animated(&image(0, "https://mmbiz.qpic.cn/x/640?wx_fmt=gif")));
        assert!(!is_animated(&image(0, "https://mmbiz.qpic.cn/x/640?wx_fmt=png")));
    }

    #[test]
    fn test_small_by_declared_size() {
        assert!(is_small(&sized(0, "https://h/a.png", "50", "80")));
        assert!(!is_small(&sized(0, "https://h/a.png", "50", "120")));
        assert!(!is_small(&sized(0, "https://h/a.png", "0", "10")));
        assert!(!is_small(&sized(0, "https://h/a.png", "50", "")));
    }

    #[test]
    fn test_malformed_size_still_checks_url() {
        assert!(!is_small(&sized(0, "https://h/a.png", "50px", "auto")));
        assert!(is_small(&sized(0, "https://h/thumb/a.png", "100%", "x")));
        assert!(is_small(&sized(0, "https://h/icons/64/a.png", "wide", "")));
    }

    #[test]
    fn test_thumbnail_markers() {
        assert!(is_small(&image(0, "https://h/img/32")));
        assert!(is_small(&image(0, "https://h/img/64/a.png")));
        assert!(is_small(&image(0, "https://h/icons/64x64.png")));
        assert!(is_small(&image(0, "https://mmbiz.qpic.cn/mmbiz_png/x/640?wx_fmt=png")));
        assert!(!is_small(&image(0, "https://h/img/128/a.png")));
    }

    #[test]
    fn test_preserves_order_and_indices() {
        let images = vec![
            image(0, "https://h/a.png"),
            image(1, "https://h/logo.png"),
            image(2, "https://h/b.png"),
            image(3, "https://h/c.gif"),
            image(4, "https://h/d.png"),
        ];
        let kept = filter_images(&images, &ALL);
        let indices: Vec<usize> = kept.iter().map(|i| i.index).collect();
        assert_eq!(indices, vec![0, 2, 4]);
    }

    #[test]
    fn test_idempotent() {
        let images = vec![
            sized(0, "https://h/a.png", "20", "20"),
            image(1, "https://h/avatar.png"),
            sized(2, "https://h/b.png", "640", "480"),
            image(3, "https://h/anim.gif"),
        ];
        let once = filter_images(&images, &ALL);
        assert_eq!(filter_images(&once, &ALL), once);
    }

    #[test]
    fn test_small_survivors_are_not_small() {
        let images = vec![
            sized(0, "https://h/a.png", "20", "20"),
            sized(1, "https://h/b.png", "20", "200"),
            sized(2, "https://h/thumb_c.png", "800", "600"),
            sized(3, "https://h/d.png", "", ""),
        ];
        let options = FilterOptions {
            exclude_small: true,
            ..Default::default()
        };
        for kept in filter_images(&images, &options) {
            let w = parse_dimension(&kept.declared_width);
            let h = parse_dimension(&kept.declared_height);
            if let (Some(w), Some(h)) = (w, h) {
                assert!(w >= SMALL_EDGE || h >= SMALL_EDGE);
            }
            assert!(!has_thumbnail_url(&kept.source_url));
        }
    }

    #[test]
    fn test_toggles_commute() {
        let images = vec![
            image(0, "https://h/logo.gif"),
            image(1, "https://h/thumb.png"),
            image(2, "https://h/a.png"),
        ];
        let avatar_then_gif = filter_images(
            &filter_images(
                &images,
                &FilterOptions {
                    exclude_avatar: true,
                    ..Default::default()
                },
            ),
            &FilterOptions {
                exclude_gif: true,
                ..Default::default()
            },
        );
        let both = filter_images(
            &images,
            &FilterOptions {
                exclude_avatar: true,
                exclude_gif: true,
                exclude_small: false,
            },
        );
        assert_eq!(avatar_then_gif, both);
    }
}
