//! Image discovery in article markup.
//!
//! Walks every `<img>` element in document order and turns it into an
//! [`ImageDescriptor`]. Lazy-loaded images keep their real address in `data-src`,
//! so that attribute wins over `src`. Nothing here touches the network.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::domain::ImageDescriptor;

/// Host of the platform's image CDN.
const CDN_HOST: &str = "mmbiz.qpic.cn";
/// Query parameter the CDN uses to select the output format.
const FORMAT_PARAM: &str = "wx_fmt";

/// Extract image descriptors from `html`, resolving relative URLs against `base_url`.
///
/// Indices are dense and follow document order. Elements without a usable URL are
/// skipped and do not consume an index.
pub fn extract_images(html: &str, base_url: &Url) -> Vec<ImageDescriptor> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };

    let mut images = Vec::new();
    for element in document.select(&selector) {
        if let Some(image) = describe_image(element, base_url, images.len()) {
            images.push(image);
        }
    }

    debug!(count = images.len(), base = %base_url, "extracted images");
    images
}

fn describe_image(element: ElementRef<'_>, base_url: &Url, index: usize) -> Option<ImageDescriptor> {
    let raw = non_empty_attr(element, "data-src").or_else(|| non_empty_attr(element, "src"))?;

    let source = match base_url.join(raw) {
        Ok(url) => url,
        Err(e) => {
            debug!(raw, error = %e, "skipping unresolvable image url");
            return None;
        }
    };
    let preferred = hd_variant(&source);

    let attr = |name: &str| element.value().attr(name).unwrap_or_default().to_string();
    let mut image = ImageDescriptor::new(index, source.to_string(), preferred.to_string());
    image.alt_text = attr("alt");
    image.declared_width = attr("width");
    image.declared_height = attr("height");
    Some(image)
}

fn non_empty_attr<'a>(element: ElementRef<'a>, name: &str) -> Option<&'a str> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Best guess at the full-quality variant of a CDN image.
///
/// CDN URLs carry resize and crop hints in the query string; dropping everything but
/// the format parameter returns the original upload. Other URLs are returned as is.
pub fn hd_variant(url: &Url) -> Url {
    let on_cdn = url.host_str().is_some_and(|host| host.contains(CDN_HOST));
    if !on_cdn {
        return url.clone();
    }

    let Some(format) = url
        .query_pairs()
        .find(|(key, _)| key == FORMAT_PARAM)
        .map(|(_, value)| value.into_owned())
    else {
        return url.clone();
    };

    let mut hd = url.clone();
    hd.set_fragment(None);
    hd.set_query(None);
    hd.query_pairs_mut().append_pair(FORMAT_PARAM, &format);
    hd
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://mp.weixin.qq.com/s/abc").unwrap()
    }

    #[test]
    fn test_prefers_data_src_and_skips_missing() {
        let html = r#"
            <img data-src="https://mmbiz.qpic.cn/a/640?wx_fmt=jpeg" src="data:image/gif;base64,xx">
            <img alt="no source">
            <img src="  ">
            <img src="/img/b.png" alt="second" width="300" height="200">
        "#;
        let images = extract_images(html, &base());

        assert_eq!(images.len(), 2);
        assert_eq!(images[0].index, 0);
        assert_eq!(images[0].source_url, "https://mmbiz.qpic.cn/a/640?wx_fmt=jpeg");
        assert_eq!(images[1].index, 1);
        assert_eq!(images[1].source_url, "https://mp.weixin.qq.com/img/b.png");
        assert_eq!(images[1].alt_text, "second");
        assert_eq!(images[1].declared_width, "300");
        assert_eq!(images[1].declared_height, "200");
    }

    #[test]
    fn test_indices_dense_in_document_order() {
        let html: String = (0..10)
            .map(|i| {
                if i % 3 == 0 {
                    "<img>".to_string()
                } else {
                    format!("<p><img src=\"/{}.png\"></p>", i)
                }
            })
            .collect();
        let images = extract_images(&html, &base());

        assert_eq!(images.len(), 6);
        for (pos, image) in images.iter().enumerate() {
            assert_eq!(image.index, pos);
        }
        assert!(images[0].source_url.ends_with("/1.png"));
        assert!(images[5].source_url.ends_with("/8.png"));
    }

    #[test]
    fn test_protocol_relative_urls() {
        let images = extract_images(r#"<img src="//cdn.example.com/x.jpg">"#, &base());
        assert_eq!(images[0].source_url, "https://cdn.example.com/x.jpg");
        assert_eq!(images[0].preferred_url, images[0].source_url);
    }

    #[test]
    fn test_hd_variant_keeps_only_format() {
        let url =
            Url::parse("https://mmbiz.qpic.cn/mmbiz_jpg/xyz/640?wx_fmt=jpeg&tp=webp&wxfrom=5&wx_lazy=1#imgIndex=0")
                .unwrap();
        assert_eq!(
            hd_variant(&url).as_str(),
            "https://mmbiz.qpic.cn/mmbiz_jpg/xyz/640?wx_fmt=jpeg"
        );
    }

    #[test]
    fn test_hd_variant_leaves_other_urls() {
        let no_format = Url::parse("https://mmbiz.qpic.cn/a/640?tp=webp").unwrap();
        assert_eq!(hd_variant(&no_format), no_format);

        let other = Url::parse("https://example.com/a.png?w=100&wx_fmt=png").unwrap();
        assert_eq!(hd_variant(&other), other);
    }

    #[test]
    fn test_deterministic() {
        let html = r#"<img src="/a.png"><img data-src="/b.png">"#;
        assert_eq!(extract_images(html, &base()), extract_images(html, &base()));
    }
}
