use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::loader::{METRIC_LOADER_PAGE_FAILED, METRIC_LOADER_PAGE_FETCH_MS},
    cache::{
        METRIC_CACHE_COALESCED, METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
        METRIC_CACHE_POPULATE_FAILED,
    },
    config::{LogFormat, LoggingSettings},
};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Total number of keyed cache hits."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Total number of keyed cache misses."
        );
        describe_counter!(
            METRIC_CACHE_COALESCED,
            Unit::Count,
            "Total number of lookups that joined an in-flight population."
        );
        describe_counter!(
            METRIC_CACHE_EVICT,
            Unit::Count,
            "Total number of keyed cache evictions due to capacity."
        );
        describe_counter!(
            METRIC_CACHE_POPULATE_FAILED,
            Unit::Count,
            "Total number of failed cache populations."
        );
        describe_histogram!(
            METRIC_LOADER_PAGE_FETCH_MS,
            Unit::Milliseconds,
            "Catalog page fetch latency in milliseconds."
        );
        describe_counter!(
            METRIC_LOADER_PAGE_FAILED,
            Unit::Count,
            "Total number of failed catalog page fetches."
        );
    });
}
