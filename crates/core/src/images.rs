//! Image collection and download.
//!
//! [`collect_images`] lists the images a page references, in document
//! order and without duplicates. With the `fetch` feature,
//! [`download_images`] saves them under `<dir>/images/<host>/` named by a
//! content hash and returns the URL to local path map that the formatters
//! substitute into their output.

use indexmap::IndexMap;
use serde::Serialize;

use crate::FormatContext;
use crate::dom::{DomTree, NodeId};
use crate::postprocess::normalize_whitespace;

/// Alt text given to the page's OpenGraph image
pub const OPEN_GRAPH_ALT: &str = "OpenGraph image";

/// An image referenced by the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    /// Absolute URL when a base URL was known, otherwise the raw `src`
    pub url: String,
    pub alt: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

impl ImageRef {
    /// Alt text, `Image` when missing
    pub fn alt_text(&self) -> &str {
        self.alt.as_deref().unwrap_or("Image")
    }

    /// ` (Width: w, Height: h)` when both dimensions are known
    pub fn dimensions_suffix(&self) -> String {
        match (&self.width, &self.height) {
            (Some(w), Some(h)) => format!(" (Width: {}, Height: {})", w, h),
            _ => String::new(),
        }
    }
}

/// Collect every `<img src>` under `root`, plus the OpenGraph image
///
/// The first occurrence of a URL wins.
pub fn collect_images(tree: &DomTree, root: NodeId, cx: &FormatContext, og_image: Option<&str>) -> Vec<ImageRef> {
    let mut images: IndexMap<String, ImageRef> = IndexMap::new();

    for id in tree.descendants(root) {
        if tree.tag(id) != "img" {
            continue;
        }
        let Some(src) = tree.attr(id, "src").map(str::trim).filter(|s| !s.is_empty()) else {
            continue;
        };

        let url = cx.resolve(src);
        let attr = |name: &str| {
            tree.attr(id, name)
                .map(normalize_whitespace)
                .filter(|v| !v.is_empty())
        };
        images.entry(url.clone()).or_insert_with(|| ImageRef {
            url,
            alt: attr("alt"),
            width: attr("width"),
            height: attr("height"),
        });
    }

    if let Some(og) = og_image.map(str::trim).filter(|s| !s.is_empty()) {
        let url = cx.resolve(og);
        images.entry(url.clone()).or_insert_with(|| ImageRef {
            url,
            alt: Some(OPEN_GRAPH_ALT.to_string()),
            width: None,
            height: None,
        });
    }

    images.into_values().collect()
}

/// File extensions kept as-is; anything else is saved as `.jpg`
#[cfg(feature = "fetch")]
const IMAGE_EXTENSIONS: [&str; 9] = ["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "avif", "ico"];

/// Extension for a downloaded image, taken from the URL path
#[cfg(feature = "fetch")]
fn image_extension(url: &url::Url) -> String {
    std::path::Path::new(url.path())
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .filter(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or_else(|| "jpg".to_string())
}

/// Download `images` into `<dir>/images/<host>/`
///
/// Files are named by the first 16 hex digits of their SHA-256, so the same
/// bytes served from two URLs are stored once. Images that fail to download
/// are logged and left out of the returned map, whose values are paths
/// relative to `dir`.
#[cfg(feature = "fetch")]
pub async fn download_images(
    images: &[ImageRef], dir: &std::path::Path, config: &crate::FetchConfig,
) -> crate::Result<std::collections::HashMap<String, String>> {
    use sha2::{Digest, Sha256};
    use std::collections::HashMap;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.timeout))
        .build()?;

    let mut saved: HashMap<String, String> = HashMap::new();
    let mut by_hash: HashMap<String, String> = HashMap::new();

    for image in images {
        let Ok(url) = url::Url::parse(&image.url) else {
            tracing::warn!(url = %image.url, "skipping image with a relative or invalid URL");
            continue;
        };

        let bytes = match fetch_bytes(&client, &url, config).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(url = %image.url, error = %e, "image download failed");
                continue;
            }
        };

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = format!("{:x}", hasher.finalize());
        let hash = &digest[..16];

        if let Some(existing) = by_hash.get(hash) {
            saved.insert(image.url.clone(), existing.clone());
            continue;
        }

        let host = url.host_str().unwrap_or("local");
        let relative = format!("images/{}/{}.{}", host, hash, image_extension(&url));
        let path = dir.join(&relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &bytes)?;
        tracing::debug!(url = %image.url, path = %path.display(), "saved image");

        by_hash.insert(hash.to_string(), relative.clone());
        saved.insert(image.url.clone(), relative);
    }

    Ok(saved)
}

#[cfg(feature = "fetch")]
async fn fetch_bytes(client: &reqwest::Client, url: &url::Url, config: &crate::FetchConfig) -> crate::Result<Vec<u8>> {
    let response = client
        .get(url.clone())
        .header("User-Agent", &config.user_agent)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    #[test]
    fn test_collect_images_in_order_without_duplicates() {
        let tree = DomTree::parse(
            r#"<main>
                <img src="/a.png" alt="First" width="10" height="20">
                <img src="b.png">
                <img src="/a.png" alt="Again">
                <img alt="no source">
            </main>"#,
        );
        let cx = FormatContext::builder()
            .base_url(Url::parse("https://example.com/post/").ok())
            .build();

        let images = collect_images(&tree, tree.main_content(), &cx, None);
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url, "https://example.com/a.png");
        assert_eq!(images[0].alt_text(), "First");
        assert_eq!(images[0].dimensions_suffix(), " (Width: 10, Height: 20)");
        assert_eq!(images[1].url, "https://example.com/post/b.png");
        assert_eq!(images[1].alt_text(), "Image");
        assert_eq!(images[1].dimensions_suffix(), "");
    }

    #[test]
    fn test_collect_open_graph_image() {
        let tree = DomTree::parse(r#"<body><img src="https://x.org/a.png"></body>"#);
        let cx = FormatContext::default();

        let images = collect_images(&tree, tree.main_content(), &cx, Some("https://x.org/og.png"));
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].alt_text(), OPEN_GRAPH_ALT);

        let images = collect_images(&tree, tree.main_content(), &cx, Some("https://x.org/a.png"));
        assert_eq!(images.len(), 1);
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn test_image_extension() {
        let ext = |u: &str| image_extension(&Url::parse(u).unwrap());
        assert_eq!(ext("https://x.org/a/photo.PNG"), "png");
        assert_eq!(ext("https://x.org/a/photo.webp?size=2"), "webp");
        assert_eq!(ext("https://x.org/a/photo"), "jpg");
        assert_eq!(ext("https://x.org/a/script.php"), "jpg");
    }

    #[cfg(feature = "fetch")]
    #[test]
    fn test_download_skips_relative_urls() {
        let dir = tempfile::tempdir().unwrap();
        let images = vec![ImageRef { url: "relative.png".to_string(), alt: None, width: None, height: None }];
        let config = crate::FetchConfig::default();
        let path = dir.path().to_path_buf();

        let result = std::thread::spawn(move || {
            tokio::runtime::Runtime::new()
                .unwrap()
                .block_on(download_images(&images, &path, &config))
        })
        .join()
        .unwrap();

        assert!(result.unwrap().is_empty());
    }
}
