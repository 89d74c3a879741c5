//! release-ingest - point-in-time earnings release ingestion
//!
//! Downloads earnings releases for every listed company, resolves each
//! release to the ticker in effect on its date, and appends it to one flat
//! file per resolved ticker.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, company list, output setup or write failure)

mod cli;
mod config;
mod gate;
mod mapping;
mod models;
mod pipeline;
mod provider;
mod report;
mod resolver;

use anyhow::{Context, Result};
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use gate::RateGate;
use mapping::DirectoryMapFiles;
use models::{dedupe_companies, Company};
use pipeline::worker::SkipReason;
use pipeline::{Coordinator, DestinationSink, FetchWorker};
use provider::http::HttpConfig;
use provider::{HttpTransport, ProviderClient};
use resolver::IdentityResolver;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is loaded before logging so `general.verbose` can take effect
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("release-ingest v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config_source);
    debug!("Arguments: {:?}", args);

    match run_ingest(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Ingestion failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default config file.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize destination, rate limit, map files, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete ingestion. Returns the process exit code.
async fn run_ingest(args: Args, config: Config) -> Result<i32> {
    let gate = Arc::new(RateGate::new(
        config.rate_limit.occurrences,
        config.rate_limit.time_unit(),
    ));
    info!(
        "Rate limit: {} requests per {:?}",
        gate.occurrences(),
        gate.time_unit()
    );

    let transport = HttpTransport::new(HttpConfig {
        base_url: config.provider.base_url.clone(),
        api_key: config.provider.api_key.clone(),
        timeout_seconds: config.provider.timeout_seconds,
    })
    .context("Failed to build HTTP client")?;
    if config.provider.api_key.is_none() {
        warn!("No API key configured; the provider may reject requests");
    }
    let client = ProviderClient::new(Arc::new(transport), gate);

    // Step 1: Company list
    println!("📥 Fetching company list...");
    let companies = client
        .companies()
        .await
        .context("Failed to fetch company list")?;
    let fetched = companies.len();
    let companies = dedupe_companies(companies);
    info!(
        "Fetched {} companies ({} after de-duplication)",
        fetched,
        companies.len()
    );

    let map_files = DirectoryMapFiles::new(&config.mapping.map_files_dir);
    info!("Map files: {}", map_files.root().display());
    let resolver = IdentityResolver::new(Arc::new(map_files));
    let worker = FetchWorker::new(client, resolver, config.filter.tickers.clone());

    if args.dry_run {
        return handle_dry_run(&companies, &worker);
    }

    // Step 2: Pipeline

    let output_dir = config.output_dir();
    println!("🔬 Processing releases into {}", output_dir.display());
    let coordinator = Coordinator::new(Arc::new(worker), Arc::new(DestinationSink::new(output_dir)))
        .with_progress_bar(!args.quiet);

    let outcome = coordinator.run(companies).await;
    if !outcome.success {
        eprintln!("\n⛔ Run aborted; see log for details.");
        return Ok(1);
    }

    // Step 3: Registry and summary
    if let Some(ref path) = config.output.registry_file {
        report::write_registry(&outcome.registry, &outcome.summary, path)?;
        info!("Registry written to {}", path.display());
    }

    println!("\n📊 Run Summary:");
    for line in report::generate_summary_text(&outcome.summary, outcome.registry.len()).lines() {
        println!("   {}", line);
    }
    println!("\n✅ Ingestion complete.");

    Ok(0)
}

/// Handle --dry-run: list the companies that would be processed, exit.
fn handle_dry_run(companies: &[Company], worker: &FetchWorker) -> Result<i32> {
    println!("\n🔍 Dry run: no releases will be fetched.\n");

    let mut selected = 0;
    let mut invalid = 0;
    for company in companies {
        match worker.admit(company) {
            Ok(ticker) => {
                selected += 1;
                println!("     📄 {} -> {}", company, ticker);
            }
            Err(SkipReason::InvalidTicker) => invalid += 1,
            Err(_) => {}
        }
    }

    println!(
        "\n   Total: {} companies would be processed ({} unparseable tickers)",
        selected, invalid
    );
    println!("\n✅ Dry run complete.");
    Ok(0)
}

/// Load configuration from file or use defaults. Also returns where it
/// came from, for logging once the subscriber is installed.
fn load_config(args: &Args) -> Result<(Config, String)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, config_path.display().to_string()));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, CONFIG_FILE_NAME.to_string())),
        Ok(None) => Ok((Config::default(), "defaults".to_string())),
        Err(e) => Ok((
            Config::default(),
            format!("defaults ({} unreadable: {:#})", CONFIG_FILE_NAME, e),
        )),
    }
}
