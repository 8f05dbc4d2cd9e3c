//! fixture-dns binary entry point.

use clap::{Parser, Subcommand};
use fixture_dns::query_tool::DigQueryTool;
use fixture_dns::{
    fixture_format, telemetry, zone_plan, Config, DnsServer, FixtureGenerator, RecordGroup,
    Verifier, Zone,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// DNS fixtures for name-resolution tests: generate, serve, verify.
#[derive(Parser, Debug)]
#[command(name = "fixture-dns")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML). Missing files are ignored.
    #[arg(short, long, default_value = "fixture-dns.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve fixtures authoritatively until interrupted.
    Serve,

    /// Write the stock fixture groups as JSON.
    Generate {
        /// Output file. Stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Query a live DNS deployment for every fixture record.
    Verify {
        /// Fixture file. The stock groups when omitted.
        #[arg(short, long)]
        fixtures: Option<PathBuf>,

        /// Nameserver to query, overriding configuration.
        #[arg(short, long)]
        server: Option<SocketAddr>,
    },

    /// Print the gcloud commands populating a managed zone.
    Plan {
        /// Managed zone identifier.
        #[arg(short, long)]
        zone_name: String,

        /// Fixture file. The stock groups when omitted.
        #[arg(short, long)]
        fixtures: Option<PathBuf>,
    },
}

fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()).required(false))
        .add_source(
            config::Environment::with_prefix("FIXTURE_DNS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}

/// Groups from `path`, or the stock groups for the configured zone.
async fn load_groups(
    config: &Config,
    path: Option<&Path>,
) -> Result<Vec<RecordGroup>, fixture_dns::DnsError> {
    match path {
        Some(path) => {
            let groups = fixture_format::load(path).await?;
            info!(path = %path.display(), groups = groups.len(), "loaded fixtures");
            Ok(groups)
        }
        None => FixtureGenerator::from_config(&config.dns.zone, &config.fixtures).standard_groups(),
    }
}

async fn serve(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let groups = load_groups(&config, config.dns.fixture_path.as_deref()).await?;
    let server = DnsServer::new(config.dns, Zone::from_groups(&groups));

    // Setup graceful shutdown
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {}", e);
        }
        info!("shutdown signal received");
        signal_token.cancel();
    });

    server.run(shutdown).await?;
    Ok(())
}

async fn generate(config: Config, output: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let groups = load_groups(&config, None).await?;
    match output {
        Some(path) => {
            fixture_format::save(&path, &groups).await?;
            info!(path = %path.display(), groups = groups.len(), "wrote fixtures");
        }
        None => println!("{}", fixture_format::to_json(&groups)?),
    }
    Ok(())
}

async fn verify(
    mut config: Config,
    fixtures: Option<PathBuf>,
    server: Option<SocketAddr>,
) -> Result<(), Box<dyn std::error::Error>> {
    if server.is_some() {
        config.verify.server = server;
    }
    let groups = load_groups(&config, fixtures.as_deref()).await?;

    let tool = Arc::new(DigQueryTool::from_config(&config.verify));
    let verifier = Verifier::from_config(tool, &config.verify);
    let results = verifier.verify_all(&groups).await;

    let mut failed = 0;
    for result in &results {
        if result.pass {
            println!("PASS {}", result.group);
            continue;
        }
        failed += 1;
        println!("FAIL {}", result.group);
        for mismatch in &result.mismatches {
            println!("{mismatch}");
        }
    }

    if failed > 0 {
        return Err(format!("{failed} of {} groups failed verification", results.len()).into());
    }
    info!(groups = results.len(), "all groups verified");
    Ok(())
}

async fn plan(
    config: Config,
    zone_name: String,
    fixtures: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let groups = load_groups(&config, fixtures.as_deref()).await?;
    let changes = zone_plan::record_set_changes(&zone_name, &groups)?;
    for command in zone_plan::gcloud_transaction(&zone_name, &changes) {
        println!("{}", command.join(" "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config = load_config(&args.config)?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    info!(
        config_file = %args.config.display(),
        zone = %config.dns.zone,
        "Starting fixture-dns"
    );

    let result = match args.command {
        Command::Serve => serve(config).await,
        Command::Generate { output } => generate(config, output).await,
        Command::Verify { fixtures, server } => verify(config, fixtures, server).await,
        Command::Plan {
            zone_name,
            fixtures,
        } => plan(config, zone_name, fixtures).await,
    };

    if let Err(e) = result {
        error!("fixture-dns error: {}", e);
        return Err(e);
    }

    info!("fixture-dns done");
    Ok(())
}
