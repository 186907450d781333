//! One browsing session: a product loader plus the shared image resolver.

use std::{ops::Range, sync::Arc};

use futures::future::join_all;
use tracing::debug;
use vitrine_api_types::Product;

use crate::{
    application::{
        error::FetchError,
        images::{DecodedImage, ImageResolver},
        loader::{PagedLoader, RequestOutcome},
        sources::PageSource,
    },
    cache::CacheError,
};

pub type ImageResult = Result<DecodedImage, CacheError<FetchError>>;

/// Owns the loader for one session. The image resolver is injected so list
/// rows, detail views, and later sessions can share one cache.
pub struct BrowseSession {
    loader: PagedLoader<Product>,
    images: Arc<ImageResolver>,
}

impl BrowseSession {
    pub fn new(
        source: Arc<dyn PageSource<Product>>,
        images: Arc<ImageResolver>,
        prefetch_distance: usize,
    ) -> Self {
        Self {
            loader: PagedLoader::new(source).with_prefetch_distance(prefetch_distance),
            images,
        }
    }

    pub fn loader(&self) -> &PagedLoader<Product> {
        &self.loader
    }

    pub fn images(&self) -> &Arc<ImageResolver> {
        &self.images
    }

    /// Load the first page.
    pub async fn start(&self) -> RequestOutcome {
        self.loader.request_next_page().await
    }

    pub async fn on_item_visible(&self, index: usize) -> RequestOutcome {
        self.loader.on_item_visible(index).await
    }

    pub async fn retry(&self) -> RequestOutcome {
        self.loader.retry().await
    }

    pub fn product(&self, index: usize) -> Option<Product> {
        self.loader.item(index)
    }

    /// Resolve the images of the products in `rows` concurrently. Each row
    /// gets its own result; one failure does not affect the others.
    pub async fn thumbnails(&self, rows: Range<usize>) -> Vec<(String, ImageResult)> {
        let items = self.loader.items();
        let end = rows.end.min(items.len());
        let start = rows.start.min(end);
        let addresses: Vec<String> = items[start..end]
            .iter()
            .map(|product| product.image.clone())
            .collect();
        debug!(start, end, "resolving thumbnails");

        let results = join_all(
            addresses
                .iter()
                .map(|address| self.images.resolve(address)),
        )
        .await;
        addresses.into_iter().zip(results).collect()
    }

    /// Image for the detail view of the product at `index`.
    pub async fn detail_image(&self, index: usize) -> Option<ImageResult> {
        let product = self.product(index)?;
        Some(self.images.resolve(&product.image).await)
    }

    pub fn close(&self) {
        self.loader.close();
    }
}

impl Drop for BrowseSession {
    fn drop(&mut self) {
        self.loader.close();
    }
}
