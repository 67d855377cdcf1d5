use anyhow::{Context, Result};
use clap::Parser;
use sixdegrees::provider::TmdbProvider;
use sixdegrees::{Config, ConnectionOutcome, ConnectionService};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "sixdegrees")]
#[command(about = "Find the shortest chain of shared films between two people")]
struct Args {
    /// First person's name
    first: String,

    /// Second person's name
    second: String,

    /// Override search.max_depth (0 = unbounded)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Override search.max_expanded (0 = unbounded)
    #[arg(long)]
    max_expanded: Option<usize>,

    /// Print search statistics after the result
    #[arg(short, long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration (also loads .env)
    let mut config = Config::load()?;

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", config.general.log_level.as_str())
    ).init();

    if let Some(depth) = args.max_depth {
        config.search.max_depth = depth;
    }
    if let Some(expanded) = args.max_expanded {
        config.search.max_expanded = expanded;
    }

    let settings = config.tmdb_settings()?;
    let provider = TmdbProvider::new(settings).context("Failed to create TMDB client")?;
    let service = ConnectionService::from_config(Arc::new(provider), &config);

    log::info!("Searching for a connection between {:?} and {:?}", args.first, args.second);
    let start = Instant::now();

    let outcome = service
        .find_connection(&args.first, &args.second)
        .await
        .context("Connection search failed; the metadata provider may be unavailable, try again later")?;

    let stats = match &outcome {
        ConnectionOutcome::Connected { stats, .. }
        | ConnectionOutcome::NoPath { stats, .. }
        | ConnectionOutcome::Inconclusive { stats, .. } => Some(stats.clone()),
        ConnectionOutcome::NotResolved { .. } => None,
    };

    let messages = outcome.into_messages();
    if messages.is_empty() {
        println!("{} and {} are the same person.", args.first, args.second);
    }
    for line in messages {
        println!("{}", line);
    }

    if args.stats {
        match stats {
            Some(stats) => println!(
                "\n{} people expanded, depth {}, search {} ms, total {:?}",
                stats.nodes_expanded,
                stats.depth_reached,
                stats.duration_ms,
                start.elapsed()
            ),
            None => println!("\nNo search was run (total {:?})", start.elapsed()),
        }
    }

    Ok(())
}
