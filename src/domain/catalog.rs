use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::errors::RepositoryError;

// ============================================================================
// Catalog - reference data read during order assembly
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogItemId(pub i64);

impl fmt::Display for CatalogItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: CatalogItemId,
    pub name: String,
    /// Raw picture reference as stored; may contain the base-url placeholder
    pub picture_uri: String,
}

impl CatalogItem {
    pub fn new(id: CatalogItemId, name: impl Into<String>, picture_uri: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            picture_uri: picture_uri.into(),
        }
    }
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Batch lookup; ids with no catalog item are simply absent from the result
    async fn list_by_ids(&self, ids: &BTreeSet<CatalogItemId>) -> Result<Vec<CatalogItem>, RepositoryError>;
}

// ============================================================================
// Picture URI resolution
// ============================================================================

pub trait PictureUriResolver: Send + Sync {
    /// Turn a stored picture reference into a publicly resolvable absolute URI
    fn compose(&self, raw_picture_uri: &str) -> String;
}

/// Placeholder host written into catalog seed data
pub const CATALOG_BASE_URL_PLACEHOLDER: &str = "http://catalogbaseurltobereplaced";

/// Replaces the catalog placeholder host with the configured base URL
#[derive(Debug, Clone)]
pub struct CatalogUriComposer {
    base_url: String,
}

impl CatalogUriComposer {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl PictureUriResolver for CatalogUriComposer {
    fn compose(&self, raw_picture_uri: &str) -> String {
        raw_picture_uri.replace(CATALOG_BASE_URL_PLACEHOLDER, &self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_replaced() {
        let composer = CatalogUriComposer::new("https://cdn.example.com/");

        assert_eq!(
            composer.compose("http://catalogbaseurltobereplaced/images/products/1.png"),
            "https://cdn.example.com/images/products/1.png"
        );
    }

    #[test]
    fn test_absolute_uri_left_untouched() {
        let composer = CatalogUriComposer::new("https://cdn.example.com");
        let raw = "https://other.example.com/2.png";

        assert_eq!(composer.compose(raw), raw);
    }
}
