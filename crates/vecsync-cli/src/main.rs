//! vecsync CLI - Command-line host
//!
//! Usage:
//!   vecsync run [--dry-run]
//!   vecsync bootstrap
//!   vecsync project --topic <topic> [file]
//!   vecsync check
//!
//! Every command accepts `--config <file>`; environment variables override
//! values from the file.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use vecsync_core::{AppConfig, LoggingConfig};
use vecsync_sync::{envelope, projector, readiness, KafkaSource, RouteTable};
use vecsync_vector::{bootstrap_collections, QdrantStore, VectorStore};

#[derive(Parser)]
#[command(name = "vecsync")]
#[command(about = "Keep Qdrant collections in sync with a Debezium CDC stream")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume change events until interrupted
    Run {
        /// Write to an in-memory store and leave Kafka offsets uncommitted
        #[arg(long)]
        dry_run: bool,
    },
    /// Create any missing collections and exit
    Bootstrap,
    /// Print the text a change envelope would be embedded as
    Project {
        /// Topic the envelope was read from
        #[arg(short, long)]
        topic: String,
        /// Envelope JSON file (stdin if omitted)
        file: Option<PathBuf>,
    },
    /// Validate configuration and check Kafka and Qdrant once
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    init_tracing(&config.logging);

    match cli.command {
        Commands::Run { dry_run } => run(config, dry_run).await,
        Commands::Bootstrap => bootstrap(config).await,
        Commands::Project { topic, file } => project(&config, &topic, file.as_deref()),
        Commands::Check => check(config).await,
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{},rdkafka=warn", logging.level).into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(config: AppConfig, dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        tracing::warn!("Dry run: changes go to an in-memory store, offsets are not committed");
        vecsync_sync::run_dry(config).await?;
    } else {
        vecsync_sync::run(config).await?;
    }
    Ok(())
}

async fn bootstrap(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    let routes = RouteTable::from_config(&config.routes)?;
    let store = QdrantStore::new(&config.qdrant)?;

    readiness::wait_for("Qdrant", &config.sync.readiness, || store.health_check()).await?;
    let created =
        bootstrap_collections(&store, &routes.collections(), config.embedding.dimension).await?;

    println!(
        "{} collection(s) created, {} already present",
        created.len(),
        routes.collections().len() - created.len()
    );
    Ok(())
}

fn project(config: &AppConfig, topic: &str, file: Option<&std::path::Path>) -> anyhow::Result<()> {
    let routes = RouteTable::from_config(&config.routes)?;
    let Some(route) = routes.resolve(topic) else {
        bail!("no route configured for topic {topic}");
    };

    let bytes = match file {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .read_to_end(&mut buf)
                .context("failed to read stdin")?;
            buf
        }
    };

    let event = envelope::decode_bytes(&bytes, topic)?;
    let Some(record) = event.authoritative() else {
        bail!("{} event carries no usable row image", event.operation);
    };

    if event.operation.uses_before() {
        println!(
            "delete from {}: {}",
            route.collection,
            serde_json::to_string(record)?
        );
    } else {
        println!("{}", projector::project(route.entity, record));
    }
    Ok(())
}

async fn check(config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    let routes = RouteTable::from_config(&config.routes)?;

    for topic in routes.topics() {
        if let Some(route) = routes.resolve(topic) {
            println!("{topic} -> {} ({})", route.collection, route.entity);
        }
    }

    let mut healthy = true;

    match KafkaSource::ping(&config.kafka).await {
        Ok(()) => println!("Kafka {}: ok", config.kafka.bootstrap_servers),
        Err(e) => {
            println!("Kafka {}: {e}", config.kafka.bootstrap_servers);
            healthy = false;
        }
    }

    let qdrant = match QdrantStore::new(&config.qdrant) {
        Ok(store) => store.health_check().await,
        Err(e) => Err(e),
    };
    match qdrant {
        Ok(()) => println!("Qdrant {}: ok", config.qdrant.url),
        Err(e) => {
            println!("Qdrant {}: {e}", config.qdrant.url);
            healthy = false;
        }
    }

    if !healthy {
        bail!("one or more dependencies are unreachable");
    }
    Ok(())
}
