//! Shared reqwest client and transport error mapping.

use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, Url};
use tracing::debug;

use crate::{application::error::FetchError, infra::error::InfraError};

#[derive(Clone, Debug)]
pub struct HttpContext {
    client: Client,
}

impl HttpContext {
    pub fn new(timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn user_agent() -> &'static str {
        concat!("vitrine/", env!("CARGO_PKG_VERSION"))
    }

    /// GET `url` and return the body. Non-success statuses and empty bodies
    /// are errors.
    pub(crate) async fn get_bytes(&self, url: Url) -> Result<Bytes, FetchError> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::other(format!("status {status}")));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        if body.is_empty() {
            return Err(FetchError::NoData);
        }
        Ok(body)
    }
}

pub(crate) fn transport_error(error: reqwest::Error) -> FetchError {
    if error.is_connect() {
        FetchError::NoConnectivity
    } else if error.is_timeout() {
        FetchError::other("request timed out")
    } else if error.is_decode() {
        FetchError::decode(error.to_string())
    } else {
        FetchError::other(error.to_string())
    }
}
