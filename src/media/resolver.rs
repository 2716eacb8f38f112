/// Identifier Resolver - maps an annotation target URL to an image id
use crate::{error::AnnoResult, media::catalog::ImageLookup};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use url::Url;

fn size_variant_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Pattern is a literal; compilation cannot fail
    PATTERN.get_or_init(|| Regex::new(r"-\d+x\d+(\.[A-Za-z0-9]+)$").expect("valid size pattern"))
}

/// Canonical form of an image URL
///
/// Scheme and host are lowercased by the parser; query string and fragment
/// are dropped. Returns `None` when the input is not an absolute URL.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    Some(url.to_string())
}

/// Strip a `-WIDTHxHEIGHT` size suffix before the file extension
///
/// `http://x/photo-300x200.jpg` becomes `http://x/photo.jpg`.
pub fn strip_size_variant(url: &str) -> Option<String> {
    let pattern = size_variant_pattern();
    if pattern.is_match(url) {
        Some(pattern.replace(url, "$1").into_owned())
    } else {
        None
    }
}

/// Resolves target source URLs against the image catalog
#[derive(Clone)]
pub struct ImageResolver {
    lookup: Arc<dyn ImageLookup>,
}

impl ImageResolver {
    pub fn new(lookup: Arc<dyn ImageLookup>) -> Self {
        Self { lookup }
    }

    /// Resolve a URL to an image id
    ///
    /// Tries the URL as given, then its normalized form, then the normalized
    /// form with any size variant removed. `Ok(None)` means no match.
    pub async fn resolve(&self, source: &str) -> AnnoResult<Option<i64>> {
        let source = source.trim();
        if source.is_empty() {
            return Ok(None);
        }

        let mut candidates = vec![source.to_string()];
        if let Some(normalized) = normalize_url(source) {
            if let Some(original) = strip_size_variant(&normalized) {
                candidates.push(normalized);
                candidates.push(original);
            } else {
                candidates.push(normalized);
            }
        }
        candidates.dedup();

        for candidate in &candidates {
            if let Some(image_id) = self.lookup.find_by_url(candidate).await? {
                tracing::debug!(source, candidate = %candidate, image_id, "resolved image");
                return Ok(Some(image_id));
            }
        }

        tracing::debug!(source, "no image registered for source");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, media::catalog::ImageCatalog};

    async fn create_test_resolver() -> (ImageResolver, ImageCatalog) {
        let catalog = ImageCatalog::new(db::memory_pool().await.unwrap());
        (ImageResolver::new(Arc::new(catalog.clone())), catalog)
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("HTTPS://Example.COM/a/b.png?ver=2#top").as_deref(),
            Some("https://example.com/a/b.png")
        );
        assert_eq!(normalize_url("relative/path.png"), None);
    }

    #[test]
    fn test_strip_size_variant() {
        assert_eq!(
            strip_size_variant("http://x/photo-300x200.jpg").as_deref(),
            Some("http://x/photo.jpg")
        );
        assert_eq!(strip_size_variant("http://x/photo.jpg"), None);
        assert_eq!(strip_size_variant("http://x/2020-10x.jpg"), None);
    }

    #[tokio::test]
    async fn test_resolve_exact_and_normalized() {
        let (resolver, catalog) = create_test_resolver().await;
        let id = catalog.register_image("http://x/42.jpg").await.unwrap();

        assert_eq!(resolver.resolve("http://x/42.jpg").await.unwrap(), Some(id));
        assert_eq!(resolver.resolve("http://X/42.jpg?w=1").await.unwrap(), Some(id));
        assert_eq!(resolver.resolve(" http://x/42.jpg ").await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_resolve_size_variant() {
        let (resolver, catalog) = create_test_resolver().await;
        let id = catalog.register_image("http://x/photo.jpg").await.unwrap();

        assert_eq!(
            resolver.resolve("http://x/photo-1024x768.jpg").await.unwrap(),
            Some(id)
        );
    }

    #[tokio::test]
    async fn test_resolve_miss() {
        let (resolver, _) = create_test_resolver().await;
        assert_eq!(resolver.resolve("http://x/none.jpg").await.unwrap(), None);
        assert_eq!(resolver.resolve("").await.unwrap(), None);
    }
}
