use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tankstats_common::{Config, Job};
use tankstats_scout::cascade::Cascade;
use tankstats_scout::participants::{dedup_jobs, jobs_from_urls, load_participants};
use tankstats_scout::runner::{Pacing, Runner};
use tankstats_scout::sources;
use tankstats_scout::store::StatsStore;

#[derive(Parser)]
#[command(name = "tankstats-scout")]
#[command(about = "Scrape player statistics from community profile pages")]
#[command(version)]
struct Cli {
    /// Account ids to scrape
    #[arg(long, num_args = 1..)]
    id: Vec<u64>,

    /// Profile URLs (`…/<id>-<name>/` or `…/<id>/`)
    #[arg(long, num_args = 1..)]
    url: Vec<String>,

    /// Participants file: `.json` array of {id, name} or `id name` lines
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output directory for per-player files and index.json
    #[arg(long, default_value = "stats", env = "TANKSTATS_OUT")]
    out: PathBuf,

    /// Base pause between players, in seconds (random jitter is added)
    #[arg(long, default_value_t = 1.2, env = "TANKSTATS_DELAY")]
    delay: f64,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let config = Config::from_env().context("Invalid configuration")?;
    config.log_summary();

    let jobs = collect_jobs(&cli)?;
    if jobs.is_empty() {
        info!("No participants given (use --id, --url or --input); nothing to do");
        return Ok(());
    }
    info!(count = jobs.len(), out = %cli.out.display(), "Starting scrape");

    let store = StatsStore::open(&cli.out)
        .with_context(|| format!("Cannot use output directory {}", cli.out.display()))?;
    let cascade = Cascade::new(sources::from_config(&config)?);
    let delay = Duration::try_from_secs_f64(cli.delay.max(0.0)).context("Invalid --delay")?;
    let runner = Runner::new(cascade, store, config, Pacing::new(delay));

    let summary = runner.run(&jobs).await?;
    info!(
        updated = summary.updated,
        kept_previous = summary.kept_previous,
        failed = summary.failed,
        "Scrape complete"
    );
    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let mut filter = EnvFilter::from_default_env();
    for directive in [
        "tankstats_scout=info",
        "tankstats_common=info",
        "cdp_client=info",
        "jina_reader_client=info",
    ] {
        filter = filter.add_directive(directive.parse()?);
    }

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

/// Jobs from every CLI source, in order: ids, then URLs, then the file.
fn collect_jobs(cli: &Cli) -> Result<Vec<Job>> {
    let mut jobs: Vec<Job> = cli.id.iter().map(|&id| Job { id, name: None }).collect();
    jobs.extend(jobs_from_urls(cli.url.iter().map(String::as_str)));
    if let Some(path) = &cli.input {
        jobs.extend(
            load_participants(path)
                .with_context(|| format!("Failed to read participants from {}", path.display()))?,
        );
    }
    Ok(dedup_jobs(jobs))
}
