//! Request and response shapes for the product catalog API.
//!
//! The catalog answers `GET <base>?page=<n>&limit=<size>&category=<name>` with a
//! [`ProductResponse`]: one page of [`Product`]s plus [`Pagination`] metadata.

use serde::{Deserialize, Serialize};

/// One page of catalog results as returned by the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductResponse {
    pub data: Vec<Product>,
    pub pagination: Pagination,
}

/// Pagination metadata attached to every [`ProductResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Zero-based index of the returned page.
    pub page: u32,
    /// Requested page size.
    pub limit: u32,
    /// Total number of items matching the query across all pages.
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub title: String,
    pub price: f64,
    pub description: String,
    pub category: String,
    pub brand: String,
    pub stock: u32,
    /// Address of the product image; used as the image cache key.
    pub image: String,
    #[serde(default)]
    pub specs: ProductSpecs,
    pub rating: ProductRating,
}

/// Free-form technical attributes. Every field is optional since the catalog
/// mixes product kinds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductSpecs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waterproof: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
}

impl ProductSpecs {
    /// Present attributes as `(label, value)` pairs in a stable order.
    /// Blank text attributes are skipped.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let mut entries = Vec::new();
        let text = [
            ("color", &self.color),
            ("weight", &self.weight),
            ("storage", &self.storage),
            ("battery", &self.battery),
            ("screen", &self.screen),
            ("ram", &self.ram),
            ("capacity", &self.capacity),
            ("output", &self.output),
            ("connection", &self.connection),
        ];
        for (label, value) in text {
            if let Some(value) = value
                && !value.trim().is_empty()
            {
                entries.push((label, value.trim().to_string()));
            }
        }
        if let Some(waterproof) = self.waterproof {
            let value = if waterproof { "yes" } else { "no" };
            entries.push(("waterproof", value.to_string()));
        }
        entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductRating {
    pub rate: f64,
    pub count: u32,
}
