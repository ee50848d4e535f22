mod logging;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use semver::Version;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use release_resolver::config::{self, ResolverConfig, SourceConfig};
use release_resolver::resolver::{
    AggregateResolver, DownloadSizeProvider, PackageResolver, ProgressSink, VerificationInfo,
};

#[derive(Parser)]
#[command(name = "release-resolver")]
#[command(version, about = "Resolve package versions across multiple release sources")]
struct Cli {
    /// Path to the config file listing release sources
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Also write JSON logs to the data directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every version offered by any source
    List,
    /// Show which source will deliver a version
    Owner { version: Version },
    /// Download a version from its owning source
    Download {
        version: Version,
        destination: PathBuf,
        /// Expected content hash (blake3:<hex>)
        #[arg(long)]
        hash: Option<String>,
    },
    /// Print the download size of a version, if known
    Size { version: Version },
}

struct StderrProgress;

impl ProgressSink for StderrProgress {
    fn report(&self, fraction: f64) {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\r{:>3.0}%", fraction * 100.0);
        if fraction >= 1.0 {
            let _ = writeln!(stderr);
        }
    }
}

fn describe(source: &SourceConfig) -> String {
    match source {
        SourceConfig::Http { url } => url.clone(),
        SourceConfig::Directory { path } => path.display().to_string(),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli.config.unwrap_or_else(config::config_path);
    let config = ResolverConfig::load(&config_path)?;
    let aggregate = AggregateResolver::new(config.build_resolvers()?);
    if aggregate.is_empty() {
        warn!("No sources configured in {:?}", config_path);
    }

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    aggregate
        .initialize()
        .await
        .context("Failed to initialize release sources")?;

    match cli.command {
        Command::List => {
            for version in aggregate.list_versions(&cancel).await? {
                println!("{}", version);
            }
        }
        Command::Owner { version } => {
            let owner = aggregate.resolve_owner(&version, &cancel).await?;
            println!("{}\t{}", owner.index, describe(&config.sources[owner.index]));
        }
        Command::Download {
            version,
            destination,
            hash,
        } => {
            let verification = VerificationInfo {
                expected_hash: hash,
            };
            aggregate
                .download(
                    &version,
                    &destination,
                    &verification,
                    Some(&StderrProgress),
                    &cancel,
                )
                .await
                .with_context(|| format!("Failed to download {}", version))?;
            println!("{}", destination.display());
        }
        Command::Size { version } => {
            match aggregate
                .download_size(&version, &VerificationInfo::default(), &cancel)
                .await?
            {
                Some(size) => println!("{}", size),
                None => println!("unknown"),
            }
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_path = cli.log_file.then(config::log_path);
    let _guard = logging::init(cli.verbose, log_path.as_deref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}
