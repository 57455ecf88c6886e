mod settings;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use pkg_allocator::{Client, Protocol, RetryPolicy, run_load};
use pkg_constants::load::{DEFAULT_COUNT, DEFAULT_DELAY_SECS, DEFAULT_DURATION_SECS, DEFAULT_PROTOCOL};
use pkg_ping::Trace;
use pkg_types::config::{ClientConfigFile, load_config_file};
use settings::{ClientArgs, Settings};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "allocator-client",
    about = "Test client for a game server allocation service"
)]
struct Cli {
    #[command(flatten)]
    args: ClientArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Allocate one game server and print its address
    Allocate,
    /// Allocate many game servers and exercise each one
    LoadTest {
        /// Number of concurrent sessions
        #[arg(short, long, default_value_t = DEFAULT_COUNT)]
        count: usize,

        /// Seconds between two session launches
        #[arg(long, default_value_t = DEFAULT_DELAY_SECS)]
        delay: u64,

        /// Seconds each session holds its game server
        #[arg(short, long, default_value_t = DEFAULT_DURATION_SECS)]
        duration: u64,

        /// Game server transport (udp|tcp)
        #[arg(long, default_value = DEFAULT_PROTOCOL)]
        protocol: String,
    },
    /// Measure HTTP latency to the given targets
    PingTest {
        /// Probe targets, comma separated
        #[arg(short, long, required = true, value_delimiter = ',')]
        targets: Vec<String>,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn build_client(settings: &Settings) -> anyhow::Result<Client> {
    let (cert, key, ca) = settings.read_credentials()?;
    let builder = Client::builder()
        .with_credentials(cert, key, ca)
        .with_namespace(settings.namespace.clone())
        .with_multicluster(settings.multicluster)
        .with_match_labels(settings.labels.clone())
        .with_meta_patch(settings.meta_patch.clone())
        .with_retry_policy(RetryPolicy::default().with_max_retries(settings.max_retries));

    let builder = if settings.ping_servers.is_empty() {
        builder.with_hosts(settings.hosts.clone())
    } else {
        builder.with_probe_targets(
            settings
                .hosts
                .iter()
                .cloned()
                .zip(settings.ping_servers.iter().cloned()),
        )
    };

    let client = builder.build().await?;
    Ok(client)
}

async fn ping_test(targets: &[String]) -> anyhow::Result<()> {
    let mut traces = Vec::new();
    for target in targets {
        match Trace::run(target).await {
            Ok(trace) => traces.push(trace),
            Err(e) => warn!("trace failed on {} - {}", target, e),
        }
    }
    if traces.is_empty() {
        bail!("no traces succeeded");
    }

    let out = serde_json::to_string_pretty(&traces).context("failed to encode traces")?;
    println!("{}", out);
    Ok(())
}

fn load_settings(args: &ClientArgs) -> anyhow::Result<Settings> {
    // Load config file (returns defaults if file not found)
    let file_cfg: ClientConfigFile = load_config_file(&args.config)
        .with_context(|| format!("failed to load config file {}", args.config))?;
    let settings = Settings::resolve(args, file_cfg)?;
    info!("Config file: {}", args.config);
    info!("  Namespace:   {}", settings.namespace);
    info!("  Hosts:       {}", settings.hosts.join(","));
    info!("  Max retries: {}", settings.max_retries);
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.args.verbose);

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("a rustls crypto provider was already installed");
    }

    match cli.command {
        Commands::PingTest { targets } => ping_test(&targets).await?,
        Commands::Allocate => {
            let settings = load_settings(&cli.args)?;
            let client = build_client(&settings).await?;
            let allocation = client.allocate_with_retry().await?;
            println!("Got allocation {} {}", allocation.address, allocation.port);
        }
        Commands::LoadTest {
            count,
            delay,
            duration,
            protocol,
        } => {
            protocol.parse::<Protocol>()?;
            let settings = load_settings(&cli.args)?;
            let client = Arc::new(build_client(&settings).await?);
            let summary = run_load(
                client,
                count,
                Duration::from_secs(delay),
                Duration::from_secs(duration),
                &protocol,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
