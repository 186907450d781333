//! HTTP catalog source.

use async_trait::async_trait;
use reqwest::Url;
use tracing::instrument;
use vitrine_api_types::{Product, ProductResponse};

use crate::{
    application::{error::FetchError, pagination::Page, sources::PageSource},
    config::CatalogSettings,
    infra::client::HttpContext,
};

/// Fetches catalog pages for one category at a fixed page size.
#[derive(Clone, Debug)]
pub struct CatalogClient {
    http: HttpContext,
    endpoint: Url,
    page_size: u32,
    category: String,
}

impl CatalogClient {
    pub fn new(http: HttpContext, settings: &CatalogSettings) -> Self {
        Self {
            http,
            endpoint: settings.base_url.clone(),
            page_size: settings.page_size.get(),
            category: settings.category.clone(),
        }
    }

    /// `<endpoint>?page=<page>&limit=<page_size>&category=<category>`
    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &self.page_size.to_string())
            .append_pair("category", &self.category);
        url
    }
}

#[async_trait]
impl PageSource<Product> for CatalogClient {
    #[instrument(skip(self), fields(category = %self.category))]
    async fn fetch_page(&self, page: u32) -> Result<Page<Product>, FetchError> {
        let body = self.http.get_bytes(self.page_url(page)).await?;
        let response: ProductResponse =
            serde_json::from_slice(&body).map_err(|err| FetchError::decode(err.to_string()))?;
        Ok(Page::from(response))
    }
}
