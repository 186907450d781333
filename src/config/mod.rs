//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::loader::DEFAULT_PREFETCH_DISTANCE;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vitrine";
const DEFAULT_BASE_URL: &str = "https://fakeapi.net/products";
const DEFAULT_PAGE_SIZE: u64 = 10;
const DEFAULT_CATEGORY: &str = "electronics";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_IMAGE_CAPACITY: usize = 0;

/// Command-line arguments for the Vitrine binary.
#[derive(Debug, Parser)]
#[command(name = "vitrine", version, about = "Product catalog browser")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VITRINE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Page through the catalog and print products.
    Browse(BrowseArgs),
    /// Resolve image addresses through the shared cache.
    Image(ImageArgs),
}

#[derive(Debug, Args, Clone)]
pub struct BrowseArgs {
    #[command(flatten)]
    pub overrides: CatalogOverrides,

    /// Number of pages to load.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,

    /// Print one JSON object per product.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,

    /// Also resolve each product image and print its dimensions.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub images: bool,

    /// Print the detail view of the product at this index.
    #[arg(long, value_name = "INDEX")]
    pub detail: Option<usize>,
}

impl Default for BrowseArgs {
    fn default() -> Self {
        Self {
            overrides: CatalogOverrides::default(),
            pages: 1,
            json: false,
            images: false,
            detail: None,
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct ImageArgs {
    #[command(flatten)]
    pub overrides: CatalogOverrides,

    /// Image addresses; repeated addresses are fetched once.
    #[arg(required = true, value_name = "ADDRESS")]
    pub addresses: Vec<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CatalogOverrides {
    /// Override the catalog endpoint.
    #[arg(long = "catalog-base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Override the number of products per page.
    #[arg(long = "catalog-page-size", value_name = "COUNT")]
    pub page_size: Option<u64>,

    /// Override the category filter.
    #[arg(long = "catalog-category", value_name = "NAME")]
    pub category: Option<String>,

    /// Override the HTTP request timeout.
    #[arg(long = "catalog-request-timeout-seconds", value_name = "SECONDS")]
    pub request_timeout_seconds: Option<u64>,

    /// Override the image cache capacity (0 keeps every image).
    #[arg(long = "cache-image-capacity", value_name = "COUNT")]
    pub image_capacity: Option<usize>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub catalog: CatalogSettings,
    pub cache: CacheSettings,
    pub browse: BrowseSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub base_url: Url,
    pub page_size: NonZeroU32,
    pub category: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub image_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct BrowseSettings {
    pub prefetch_distance: usize,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("VITRINE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Browse(args)) => raw.apply_overrides(&args.overrides),
        Some(Command::Image(args)) => raw.apply_overrides(&args.overrides),
        None => raw.apply_overrides(&CatalogOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    catalog: RawCatalogSettings,
    cache: RawCacheSettings,
    browse: RawBrowseSettings,
    logging: RawLoggingSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &CatalogOverrides) {
        if let Some(base_url) = overrides.base_url.as_ref() {
            self.catalog.base_url = Some(base_url.clone());
        }
        if let Some(page_size) = overrides.page_size {
            self.catalog.page_size = Some(page_size);
        }
        if let Some(category) = overrides.category.as_ref() {
            self.catalog.category = Some(category.clone());
        }
        if let Some(seconds) = overrides.request_timeout_seconds {
            self.catalog.request_timeout_seconds = Some(seconds);
        }
        if let Some(capacity) = overrides.image_capacity {
            self.cache.image_capacity = Some(capacity);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            catalog: build_catalog_settings(raw.catalog)?,
            cache: CacheSettings {
                image_capacity: raw.cache.image_capacity.unwrap_or(DEFAULT_IMAGE_CAPACITY),
            },
            browse: BrowseSettings {
                prefetch_distance: raw
                    .browse
                    .prefetch_distance
                    .unwrap_or(DEFAULT_PREFETCH_DISTANCE),
            },
            logging: build_logging_settings(raw.logging)?,
        })
    }
}

fn build_catalog_settings(catalog: RawCatalogSettings) -> Result<CatalogSettings, LoadError> {
    let raw_url = catalog
        .base_url
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("catalog.base_url", format!("`{raw_url}`: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "catalog.base_url",
            format!("unsupported scheme `{}`", base_url.scheme()),
        ));
    }

    let page_size = non_zero_u32(
        catalog.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        "catalog.page_size",
    )?;

    let category = catalog
        .category
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
        .trim()
        .to_string();
    if category.is_empty() {
        return Err(LoadError::invalid("catalog.category", "must not be empty"));
    }

    let timeout_secs = catalog
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "catalog.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(CatalogSettings {
        base_url,
        page_size,
        category,
        request_timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCatalogSettings {
    base_url: Option<String>,
    page_size: Option<u64>,
    category: Option<String>,
    request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    image_capacity: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBrowseSettings {
    prefetch_distance: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_catalog_conventions() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.catalog.base_url.as_str(), DEFAULT_BASE_URL);
        assert_eq!(settings.catalog.page_size.get(), 10);
        assert_eq!(settings.catalog.category, "electronics");
        assert_eq!(settings.catalog.request_timeout, Duration::from_secs(15));
        assert_eq!(settings.cache.image_capacity, 0);
        assert_eq!(settings.browse.prefetch_distance, 3);
        assert_eq!(settings.logging.level, LevelFilter::INFO);
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.catalog.page_size = Some(20);
        raw.logging.level = Some("info".to_string());

        let overrides = CatalogOverrides {
            page_size: Some(5),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.catalog.page_size.get(), 5);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = CatalogOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let mut raw = RawSettings::default();
        raw.catalog.page_size = Some(0);

        let err = Settings::from_raw(raw).expect_err("zero page size");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "catalog.page_size",
                ..
            }
        ));
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let mut raw = RawSettings::default();
        raw.catalog.base_url = Some("ftp://catalog.example.com".to_string());

        let err = Settings::from_raw(raw).expect_err("ftp scheme");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "catalog.base_url",
                ..
            }
        ));
    }

    #[test]
    fn blank_category_is_rejected() {
        let mut raw = RawSettings::default();
        raw.catalog.category = Some("   ".to_string());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn config_file_is_layered_under_cli() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp config");
        writeln!(
            file,
            "[catalog]\nbase_url = \"http://localhost:8080/products\"\npage_size = 25\n\n[cache]\nimage_capacity = 64\n"
        )
        .expect("write config");

        let cli = CliArgs::parse_from([
            "vitrine",
            "--config-file",
            file.path().to_str().expect("utf-8 path"),
            "browse",
            "--catalog-page-size",
            "12",
        ]);
        let settings = load(&cli).expect("valid settings");

        assert_eq!(
            settings.catalog.base_url.as_str(),
            "http://localhost:8080/products"
        );
        assert_eq!(settings.catalog.page_size.get(), 12);
        assert_eq!(settings.cache.image_capacity, 64);
    }

    #[test]
    fn default_to_browse_command() {
        let args = CliArgs::parse_from(["vitrine"]);
        let command = args
            .command
            .unwrap_or(Command::Browse(BrowseArgs::default()));
        assert!(matches!(command, Command::Browse(_)));
    }

    #[test]
    fn parse_browse_arguments() {
        let args = CliArgs::parse_from([
            "vitrine",
            "browse",
            "--pages",
            "3",
            "--json",
            "--catalog-category",
            "audio",
            "--detail",
            "4",
        ]);

        match args.command {
            Some(Command::Browse(browse)) => {
                assert_eq!(browse.pages, 3);
                assert!(browse.json);
                assert!(!browse.images);
                assert_eq!(browse.detail, Some(4));
                assert_eq!(browse.overrides.category.as_deref(), Some("audio"));
            }
            other => panic!("expected browse command, got {other:?}"),
        }
    }

    #[test]
    fn parse_image_arguments() {
        let args = CliArgs::parse_from([
            "vitrine",
            "image",
            "https://img.example.com/a.png",
            "https://img.example.com/a.png",
        ]);

        match args.command {
            Some(Command::Image(image)) => assert_eq!(image.addresses.len(), 2),
            other => panic!("expected image command, got {other:?}"),
        }
    }

    #[test]
    fn zero_pages_is_rejected_by_parser() {
        let result = CliArgs::try_parse_from(["vitrine", "browse", "--pages", "0"]);
        assert!(result.is_err());
    }
}
