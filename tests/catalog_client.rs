use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use httpmock::MockServer;
use url::Url;
use vitrine::application::error::FetchError;
use vitrine::application::images::ImageResolver;
use vitrine::application::sources::PageSource;
use vitrine::cache::{CacheError, KeyedCache};
use vitrine::config::CatalogSettings;
use vitrine::infra::assets::HttpByteSource;
use vitrine::infra::catalog::CatalogClient;
use vitrine::infra::client::HttpContext;

const PAGE_BODY: &str = r#"{
  "data": [
    {
      "id": 1,
      "title": "Wireless Headphones",
      "price": 99.99,
      "description": "Over-ear, noise cancelling",
      "category": "electronics",
      "brand": "Acme",
      "stock": 12,
      "image": "https://img.example.com/headphones.png",
      "specs": { "color": "black", "battery": "30h", "waterproof": false },
      "rating": { "rate": 4.5, "count": 120 }
    },
    {
      "id": 2,
      "title": "USB-C Charger",
      "price": 19.5,
      "description": "65W",
      "category": "electronics",
      "brand": "Acme",
      "stock": 40,
      "image": "https://img.example.com/charger.png",
      "rating": { "rate": 4.1, "count": 33 }
    }
  ],
  "pagination": { "page": 0, "limit": 10, "total": 25 }
}"#;

fn http() -> HttpContext {
    HttpContext::new(Duration::from_secs(5)).expect("http client")
}

fn catalog(base_url: &str) -> CatalogClient {
    let settings = CatalogSettings {
        base_url: Url::parse(base_url).expect("valid url"),
        page_size: NonZeroU32::new(10).expect("non-zero"),
        category: "electronics".to_string(),
        request_timeout: Duration::from_secs(5),
    };
    CatalogClient::new(http(), &settings)
}

fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut png = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    png.extend_from_slice(&13u32.to_be_bytes());
    png.extend_from_slice(b"IHDR");
    png.extend_from_slice(&width.to_be_bytes());
    png.extend_from_slice(&height.to_be_bytes());
    png.extend_from_slice(&[8, 6, 0, 0, 0]);
    png.extend_from_slice(&[0, 0, 0, 0]);
    png
}

#[test]
fn page_url_carries_page_limit_and_category() {
    let client = catalog("https://fakeapi.net/products?stale=1");
    assert_eq!(
        client.page_url(2).as_str(),
        "https://fakeapi.net/products?page=2&limit=10&category=electronics"
    );
}

#[tokio::test]
async fn fetch_page_decodes_products_and_pagination() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/products")
            .query_param("page", "0")
            .query_param("limit", "10")
            .query_param("category", "electronics");
        then.status(200)
            .header("content-type", "application/json")
            .body(PAGE_BODY);
    });

    let client = catalog(&server.url("/products"));
    let page = client.fetch_page(0).await.expect("page decodes");
    mock.assert();

    assert_eq!(page.page_number, 0);
    assert_eq!(page.total_count, 25);
    assert_eq!(page.total_pages(), 3);
    assert!(page.has_more());
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].title, "Wireless Headphones");
    assert_eq!(page.items[0].specs.battery.as_deref(), Some("30h"));
    assert!(page.items[1].specs.color.is_none());
}

#[tokio::test]
async fn malformed_body_is_a_decode_failure() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/products");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"data": "nope"}"#);
    });

    let err = catalog(&server.url("/products"))
        .fetch_page(0)
        .await
        .expect_err("invalid payload");
    assert!(matches!(err, FetchError::DecodeFailure { .. }));
    assert_eq!(err.to_string(), "Failed to decode data");
}

#[tokio::test]
async fn empty_body_is_no_data() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/products");
        then.status(200);
    });

    let err = catalog(&server.url("/products"))
        .fetch_page(0)
        .await
        .expect_err("empty body");
    assert_eq!(err, FetchError::NoData);
}

#[tokio::test]
async fn server_error_is_reported_with_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/products");
        then.status(500).body("boom");
    });

    let err = catalog(&server.url("/products"))
        .fetch_page(0)
        .await
        .expect_err("server error");
    match err {
        FetchError::Other(message) => assert!(message.contains("500"), "{message}"),
        other => panic!("expected Other, got {other:?}"),
    }
}

#[tokio::test]
async fn refused_connection_is_no_connectivity() {
    let err = catalog("http://127.0.0.1:1/products")
        .fetch_page(0)
        .await
        .expect_err("nothing listens on port 1");
    assert_eq!(err, FetchError::NoConnectivity);
}

#[tokio::test]
async fn concurrent_image_requests_hit_the_network_once() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET").path("/images/headphones.png");
        then.status(200)
            .header("content-type", "image/png")
            .delay(Duration::from_millis(50))
            .body(png_header(640, 480));
    });

    let resolver = ImageResolver::new(
        Arc::new(KeyedCache::unbounded()),
        Arc::new(HttpByteSource::new(http())),
    );
    let address = server.url("/images/headphones.png");

    let results = join_all((0..4).map(|_| resolver.resolve(&address))).await;
    mock.assert();

    for result in results {
        let image = result.expect("image resolves");
        assert_eq!((image.width, image.height), (640, 480));
    }
    assert!(resolver.cached(&address).is_some());
    assert_eq!(resolver.cache().len(), 1);
}

#[tokio::test]
async fn undecodable_image_is_not_cached() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/images/broken.png");
        then.status(200).body("<html>not found</html>");
    });

    let resolver = ImageResolver::new(
        Arc::new(KeyedCache::unbounded()),
        Arc::new(HttpByteSource::new(http())),
    );
    let address = server.url("/images/broken.png");

    let err = resolver.resolve(&address).await.expect_err("not an image");
    assert!(matches!(
        err,
        CacheError::Populate(FetchError::DecodeFailure { .. })
    ));
    assert!(resolver.cached(&address).is_none());
    assert!(resolver.cache().is_empty());
}

#[tokio::test]
async fn invalid_image_address_never_reaches_the_network() {
    let resolver = ImageResolver::new(
        Arc::new(KeyedCache::unbounded()),
        Arc::new(HttpByteSource::new(http())),
    );
    let err = resolver
        .resolve("not a url")
        .await
        .expect_err("invalid address");
    assert!(matches!(
        err,
        CacheError::Populate(FetchError::InvalidAddress { .. })
    ));
    assert_eq!(err.to_string(), "Invalid URL");
}
