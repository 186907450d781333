//! Capabilities the browsing core consumes from the outside world.

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::{error::FetchError, pagination::Page};

/// Remote source of paginated items for one fixed query.
#[async_trait]
pub trait PageSource<T>: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<Page<T>, FetchError>;
}

/// Remote source of raw resource bytes keyed by address.
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn fetch_bytes(&self, address: &str) -> Result<Bytes, FetchError>;
}
