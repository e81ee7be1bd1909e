use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use artwork_catalog::application::{
    CatalogOrchestrator, CatalogRequest, MediaRequest, OrchestratorSettings, ProbeSourceUseCase,
};
use artwork_catalog::domain::errors::CatalogError;
use artwork_catalog::infrastructure::{
    AppConfig, CliArgs, Command, DiskMediaStore, MemoryCatalogCache, StorageManager,
    XlsxExtractor, build_source,
};
use artwork_catalog::presentation::HttpResponse;
use artwork_catalog::presentation::http::{
    catalog_response, error_response, health_response, is_bypass, media_response,
};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = config.effective_log_path() {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config() -> Result<(AppConfig, Command)> {
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();

    let storage = StorageManager::new()?;
    let mut config = storage.load_config(args.config.as_deref())?;
    config.merge_with_args(&args);

    Ok((config, args.command))
}

async fn create_orchestrator(
    config: &AppConfig,
    extractor: XlsxExtractor,
) -> Result<CatalogOrchestrator, CatalogError> {
    let source = build_source(config)?;
    let media = DiskMediaStore::new(config.effective_media_dir()).await?;
    let catalogs = Arc::new(MemoryCatalogCache::new(config.cache.catalog_capacity));
    let settings = OrchestratorSettings {
        catalog_ttl: config.catalog_ttl(),
        identity_reuse: config.identity_reuse(),
    };

    Ok(CatalogOrchestrator::new(
        source,
        Arc::new(extractor),
        Arc::new(media),
        catalogs,
        settings,
    ))
}

fn extractor(config: &AppConfig) -> Result<XlsxExtractor> {
    XlsxExtractor::with_pattern(&config.ignored_sheet_pattern)
        .wrap_err("invalid ignored_sheet_pattern")
}

/// Runs one command against a fresh orchestrator.
///
/// Build state, the catalog cache and identity reuse live only for this call,
/// so each `catalog` or `media` invocation loads and extracts the workbook.
/// The caches pay off only when a long-lived host keeps one orchestrator.
async fn run(config: &AppConfig, command: Command) -> Result<HttpResponse> {
    let response = match command {
        Command::Health => {
            let probe = ProbeSourceUseCase::new(config.effective_mode(), build_source(config));
            health_response(&probe.execute().await)
        }
        Command::Catalog {
            query,
            if_none_match,
        } => {
            let orchestrator = match create_orchestrator(config, extractor(config)?).await {
                Ok(orchestrator) => orchestrator,
                Err(e) => return Ok(error_response(&e)),
            };
            let bypass = is_bypass(&query, &config.bypass_query_param);
            let result = orchestrator
                .get_catalog(CatalogRequest::new().bypassing(bypass))
                .await;
            catalog_response(result, if_none_match.as_deref())
        }
        Command::Media {
            category,
            filename,
            if_none_match,
            output,
        } => {
            let orchestrator = match create_orchestrator(config, extractor(config)?).await {
                Ok(orchestrator) => orchestrator,
                Err(e) => return Ok(error_response(&e)),
            };
            let mut request = MediaRequest::new(category, filename);
            request.if_none_match = if_none_match;
            let response = media_response(orchestrator.get_media(request).await);

            if response.status == 200
                && let Some(path) = output
            {
                std::fs::write(&path, &response.body)
                    .wrap_err_with(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), bytes = response.body.len(), "Image written");
            }
            response
        }
    };

    Ok(response)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (config, command) = load_config()?;
    init_logging(&config)?;

    info!(
        version = artwork_catalog::VERSION,
        mode = %config.effective_mode(),
        "Starting artwork-catalog"
    );

    let response = run(&config, command).await?;
    println!("{response}");

    if response.status >= 400 {
        std::process::exit(1);
    }
    Ok(())
}
