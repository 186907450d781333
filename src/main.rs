use std::{process, sync::Arc};

use futures::future::join_all;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vitrine::{
    application::{
        error::AppError,
        images::ImageResolver,
        loader::{LoaderNotice, LoaderState, RequestOutcome},
        session::BrowseSession,
    },
    cache::{CacheConfig, KeyedCache},
    config::{self, BrowseArgs, ImageArgs, Settings},
    infra::{
        assets::HttpByteSource, catalog::CatalogClient, client::HttpContext, error::InfraError,
        telemetry,
    },
};

mod print;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        eprintln!("{}", error.presentation_message());
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| InfraError::configuration(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Browse(BrowseArgs::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Browse(args) => run_browse(settings, args).await,
        config::Command::Image(args) => run_image(settings, args).await,
    }
}

fn build_resolver(settings: &Settings, http: HttpContext) -> Arc<ImageResolver> {
    let retention = CacheConfig::from(&settings.cache).image_retention();
    let cache = Arc::new(KeyedCache::new(retention));
    Arc::new(ImageResolver::new(
        cache,
        Arc::new(HttpByteSource::new(http)),
    ))
}

async fn run_browse(settings: Settings, args: BrowseArgs) -> Result<(), AppError> {
    let http = HttpContext::new(settings.catalog.request_timeout)?;
    let catalog = CatalogClient::new(http.clone(), &settings.catalog);
    let images = build_resolver(&settings, http);
    let session = BrowseSession::new(
        Arc::new(catalog),
        images,
        settings.browse.prefetch_distance,
    );
    let mut notices = session.loader().notices();

    info!(
        category = %settings.catalog.category,
        pages = args.pages,
        "browsing catalog"
    );

    match session.start().await {
        RequestOutcome::Failed { .. } => {
            if let LoaderState::Error { message, .. } = session.loader().state() {
                return Err(AppError::catalog(message));
            }
            return Err(AppError::catalog("first page failed"));
        }
        RequestOutcome::Empty => {
            println!("No products found");
            return Ok(());
        }
        _ => {}
    }

    let mut loaded = 1;
    while loaded < args.pages && session.loader().has_more_pages() {
        let last = session.loader().items().len().saturating_sub(1);
        match session.on_item_visible(last).await {
            RequestOutcome::Loaded { .. } => loaded += 1,
            RequestOutcome::AppendFailed { .. } => {
                drain_notices(&mut notices);
                break;
            }
            _ => break,
        }
    }

    let products = session.loader().items();
    for (index, product) in products.iter().enumerate() {
        if args.json {
            print::print_json(product)?;
        } else {
            print::product_row(index, product);
        }
    }

    if args.images {
        for (address, result) in session.thumbnails(0..products.len()).await {
            print::image_row(&address, &result);
        }
    }

    if let Some(index) = args.detail {
        match session.product(index) {
            Some(product) => {
                let image = session.detail_image(index).await;
                print::product_detail(&product, image.as_ref());
            }
            None => eprintln!("No product at index {index}"),
        }
    }

    session.close();
    Ok(())
}

fn drain_notices(notices: &mut tokio::sync::broadcast::Receiver<LoaderNotice>) {
    loop {
        match notices.try_recv() {
            Ok(notice) => eprintln!("{notice}"),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "loader notices dropped");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

async fn run_image(settings: Settings, args: ImageArgs) -> Result<(), AppError> {
    let http = HttpContext::new(settings.catalog.request_timeout)?;
    let images = build_resolver(&settings, http);

    let results = join_all(
        args.addresses
            .iter()
            .map(|address| images.resolve(address)),
    )
    .await;

    info!(
        requested = args.addresses.len(),
        cached = images.cache().len(),
        "images resolved"
    );

    let mut first_error = None;
    for (address, result) in args.addresses.iter().zip(results) {
        print::image_row(address, &result);
        if let Err(err) = result {
            first_error.get_or_insert(err);
        }
    }

    match first_error {
        Some(err) => Err(AppError::from(err)),
        None => Ok(()),
    }
}
