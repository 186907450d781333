//! Image resolution through the shared keyed cache.

use std::sync::Arc;

use bytes::Bytes;
use tracing::instrument;
use url::Url;

use crate::{
    application::{error::FetchError, sources::ByteSource},
    cache::{CacheError, KeyedCache},
};

/// Image bytes whose header has been parsed far enough to know the size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// Lowercase container name as sniffed from the header, e.g. `png`.
    pub format: String,
    pub width: usize,
    pub height: usize,
    pub bytes: Bytes,
}

/// Parse the image header in `bytes`. Pixel decoding is left to the consumer.
pub fn decode_image(bytes: Bytes) -> Result<DecodedImage, FetchError> {
    if bytes.is_empty() {
        return Err(FetchError::NoData);
    }
    let kind = imagesize::image_type(&bytes).map_err(|err| FetchError::decode(err.to_string()))?;
    let size = imagesize::blob_size(&bytes).map_err(|err| FetchError::decode(err.to_string()))?;
    Ok(DecodedImage {
        format: format!("{kind:?}").to_lowercase(),
        width: size.width,
        height: size.height,
        bytes,
    })
}

/// Canonical cache key for an image address; only absolute http(s) URLs qualify.
pub fn canonical_address(address: &str) -> Result<String, FetchError> {
    let url = Url::parse(address.trim()).map_err(|_| FetchError::invalid_address(address))?;
    match url.scheme() {
        "http" | "https" => Ok(url.into()),
        _ => Err(FetchError::invalid_address(address)),
    }
}

/// Resolves image addresses to [`DecodedImage`]s, fetching each address at
/// most once while it is cached. One resolver is shared by every view.
pub struct ImageResolver {
    cache: Arc<KeyedCache<DecodedImage>>,
    source: Arc<dyn ByteSource>,
}

impl ImageResolver {
    pub fn new(cache: Arc<KeyedCache<DecodedImage>>, source: Arc<dyn ByteSource>) -> Self {
        Self { cache, source }
    }

    pub fn cache(&self) -> &Arc<KeyedCache<DecodedImage>> {
        &self.cache
    }

    /// Cached image for `address`, if any. Never fetches.
    pub fn cached(&self, address: &str) -> Option<DecodedImage> {
        let key = canonical_address(address).ok()?;
        self.cache.get(&key)
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, address: &str) -> Result<DecodedImage, CacheError<FetchError>> {
        let key = canonical_address(address).map_err(CacheError::Populate)?;
        self.cache
            .get_or_populate(&key, || async {
                self.source.fetch_bytes(&key).await.and_then(decode_image)
            })
            .await
    }
}
