//! pano-mosaic - Street-level panorama mosaics from tiled imagery.
//!
//! This binary starts the mosaic server, or builds a single mosaic from the
//! command line.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pano_mosaic::{
    config::{Cli, Command, FetchConfig, MosaicArgs, ServeConfig},
    io::ReqwestClient,
    metadata::StreetViewMetadataClient,
    server::{create_router, RouterConfig},
    session::MosaicService,
};

type Service = MosaicService<ReqwestClient, StreetViewMetadataClient<ReqwestClient>>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve(config) => run_serve(config).await,
        Command::Fetch(config) => run_fetch(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.mosaic.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let service = match build_service(&config.mosaic) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    log_configuration(&service);

    let router_config = build_router_config(&config);
    let router = create_router(service, router_config);
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!(
        "    curl -o mosaic.png 'http://{}/mosaic?lat=45.389661&lng=-75.693499'",
        addr
    );
    info!("    ws://{}/session", addr);
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_tracing(!config.no_tracing);
    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }
    router_config
}

// =============================================================================
// Fetch Command
// =============================================================================

async fn run_fetch(config: FetchConfig) -> ExitCode {
    init_logging(config.mosaic.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let service = match build_service(&config.mosaic) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to start: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let image = match service.fetch_mosaic(&config.location()).await {
        Ok(image) => image,
        Err(e) => {
            error!("Failed to build mosaic: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = tokio::fs::write(&config.output, &image.data).await {
        error!("Failed to write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        "Wrote {}x{} {} mosaic of panorama {} to {} ({} tiles missing)",
        image.width,
        image.height,
        image.encoding.as_str(),
        image.pano_id,
        config.output.display(),
        image.failed_tiles
    );

    ExitCode::SUCCESS
}

// =============================================================================
// Shared Setup
// =============================================================================

fn build_service(args: &MosaicArgs) -> Result<Service, String> {
    let timeout = Duration::from_secs(args.http_timeout);
    let client = Arc::new(ReqwestClient::with_timeout(timeout).map_err(|e| e.to_string())?);

    let resolver = StreetViewMetadataClient::new(
        Arc::clone(&client),
        args.metadata_url()?,
        args.api_key_or_empty(),
    );

    Ok(MosaicService::new(
        args.mosaic_config()?,
        client,
        args.tile_url()?,
        resolver,
    ))
}

fn log_configuration(service: &Service) {
    let config = service.config();
    let grid = &config.grid;

    info!("Configuration:");
    info!(
        "  Grid: x {}..{}, y {}..{} at zoom {} ({} tiles, {}x{} px)",
        grid.min_x(),
        grid.max_x(),
        grid.min_y(),
        grid.max_y(),
        grid.zoom(),
        grid.tile_count(),
        grid.pixel_width(),
        grid.pixel_height()
    );
    info!(
        "  Workers: {} per session, {} attempts per tile",
        config.worker_count(),
        config.num_retries
    );
    info!("  Encoding: {}", config.encoding.as_str());
    if config.save_images {
        info!("  Saving mosaics to: {}", config.output_dir.display());
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pano_mosaic=debug,tower_http=debug"
    } else {
        "pano_mosaic=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
