use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use jobsekr_sync::{DiscoverOptions, HarvestOptions, JobKind, JobSummary, Orchestrator, PgStore, SyncConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "jobsekr")]
#[command(about = "Harvest job postings from ATS vendor APIs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch every verified company's listings and reconcile them.
    Harvest {
        /// Only companies on this vendor.
        #[arg(long)]
        ats: Option<String>,
        /// Only this company slug.
        #[arg(long)]
        company: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Find companies in curated text sources.
    Discover {
        /// Probe unresolved companies against every probe vendor.
        #[arg(long)]
        probe: bool,
        #[arg(long)]
        dry_run: bool,
    },
    /// Mark stale postings inactive and delete expired ones.
    Cleanup {
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the single job named by `CRON_JOB` (scrape, discover or cleanup).
    Cron,
    /// Run all jobs on their cron schedules until interrupted.
    Schedule,
    /// Apply database migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    let command = cli.command.unwrap_or(Commands::Harvest {
        ats: None,
        company: None,
        limit: None,
        dry_run: false,
    });

    match command {
        Commands::Migrate => {
            let store = PgStore::connect(&config.database_url)
                .await
                .context("connecting to database")?;
            store.migrate().await.context("running migrations")?;
            println!("migrations applied");
        }
        Commands::Harvest {
            ats,
            company,
            limit,
            dry_run,
        } => {
            let orchestrator = Orchestrator::from_config(config).await?;
            let options = HarvestOptions {
                ats,
                company,
                limit,
                dry_run,
            };
            let report = orchestrator.harvest(&options).await?;
            println!("{}", JobSummary::Harvest(report));
        }
        Commands::Discover { probe, dry_run } => {
            let orchestrator = Orchestrator::from_config(config).await?;
            let report = orchestrator.discover(DiscoverOptions { probe, dry_run }).await?;
            println!("{}", JobSummary::Discover(report));
        }
        Commands::Cleanup { dry_run } => {
            let orchestrator = Orchestrator::from_config(config).await?;
            let report = orchestrator.cleanup(dry_run).await?;
            println!("{}", JobSummary::Cleanup(report));
        }
        Commands::Cron => {
            let name = std::env::var("CRON_JOB").context("CRON_JOB is not set")?;
            let kind: JobKind = name.parse()?;
            let orchestrator = Orchestrator::from_config(config).await?;
            let summary = orchestrator.run_job(kind).await?;
            println!("{summary}");
        }
        Commands::Schedule => {
            let orchestrator = Arc::new(Orchestrator::from_config(config).await?);
            let Some(mut sched) = orchestrator.maybe_build_scheduler().await? else {
                bail!("scheduler disabled; set JOBSEKR_SCHEDULER_ENABLED=1");
            };
            sched.start().await.context("starting scheduler")?;
            tracing::info!("scheduler running; ctrl-c to stop");
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            sched.shutdown().await.context("stopping scheduler")?;
        }
    }

    Ok(())
}
