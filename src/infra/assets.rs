//! HTTP byte source for product images.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;

use crate::{
    application::{error::FetchError, sources::ByteSource},
    infra::client::HttpContext,
};

#[derive(Clone, Debug)]
pub struct HttpByteSource {
    http: HttpContext,
}

impl HttpByteSource {
    pub fn new(http: HttpContext) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn fetch_bytes(&self, address: &str) -> Result<Bytes, FetchError> {
        let url = Url::parse(address).map_err(|_| FetchError::invalid_address(address))?;
        self.http.get_bytes(url).await
    }
}
