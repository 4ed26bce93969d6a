//! Catalog metadata boundary
//!
//! Titles and posters come from an external metadata service. The pipeline
//! never needs them; they are only used to label playback in the UI.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{CatalogId, ContentType};

/// Display metadata for one catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDetails {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
}

/// Metadata lookup implemented by the host application
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Returns `Ok(None)` for unknown IDs
    async fn get_details(
        &self,
        catalog_id: &CatalogId,
        content_type: ContentType,
    ) -> Result<Option<CatalogDetails>>;
}

/// Fixed in-memory catalog, for offline use and tests
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<(CatalogId, ContentType), CatalogDetails>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        catalog_id: impl Into<CatalogId>,
        content_type: ContentType,
        details: CatalogDetails,
    ) -> &mut Self {
        self.entries.insert((catalog_id.into(), content_type), details);
        self
    }
}

#[async_trait]
impl CatalogService for StaticCatalog {
    async fn get_details(
        &self,
        catalog_id: &CatalogId,
        content_type: ContentType,
    ) -> Result<Option<CatalogDetails>> {
        Ok(self
            .entries
            .get(&(catalog_id.clone(), content_type))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details(title: &str) -> CatalogDetails {
        CatalogDetails {
            title: title.to_string(),
            poster_url: None,
            year: Some(2024),
            overview: None,
        }
    }

    #[tokio::test]
    async fn test_static_catalog_lookup() {
        let mut catalog = StaticCatalog::new();
        catalog
            .insert(574475, ContentType::Movie, details("Final Destination Bloodlines"))
            .insert("tt0944947", ContentType::Series, details("Game of Thrones"));

        let movie = catalog
            .get_details(&CatalogId::Number(574475), ContentType::Movie)
            .await
            .unwrap();
        assert_eq!(movie.unwrap().title, "Final Destination Bloodlines");

        // Same ID, different content type
        let missing = catalog
            .get_details(&CatalogId::Number(574475), ContentType::Series)
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_details_serialize_camel_case() {
        let json = serde_json::to_value(CatalogDetails {
            poster_url: Some("https://img.example/p.jpg".to_string()),
            ..details("Dune")
        })
        .unwrap();
        assert_eq!(json["posterUrl"], "https://img.example/p.jpg");
        assert_eq!(json["year"], 2024);
        assert!(json.get("overview").is_none());
    }
}
