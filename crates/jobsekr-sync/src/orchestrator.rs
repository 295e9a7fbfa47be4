use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use jobsekr_adapters::VendorRegistry;
use jobsekr_core::ParseEnumError;
use jobsekr_fetch::HttpFetcher;
use serde_json::json;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::{SourcesFile, SyncConfig};
use crate::discovery::{DiscoverOptions, Discovery, DiscoveryConfig, DiscoveryReport};
use crate::harvest::{HarvestOptions, HarvestReport, Harvester};
use crate::pg::PgStore;
use crate::reconcile::{CleanupEngine, CleanupReport};
use crate::runs::RunHandle;
use crate::store::{JobsekrStore, RunTotals};
use crate::SyncError;

pub const CLEANUP_SOURCE: &str = "cleanup";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Harvest,
    Discover,
    Cleanup,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Harvest, JobKind::Discover, JobKind::Cleanup];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Harvest => "harvest",
            JobKind::Discover => "discover",
            JobKind::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "harvest" | "scrape" => Ok(JobKind::Harvest),
            "discover" => Ok(JobKind::Discover),
            "cleanup" => Ok(JobKind::Cleanup),
            _ => Err(ParseEnumError {
                kind: "job",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSummary {
    Harvest(HarvestReport),
    Discover(DiscoveryReport),
    Cleanup(CleanupReport),
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobSummary::Harvest(r) if r.dry_run => write!(
                f,
                "harvest (dry run): companies={} postings={} would_insert={} would_update={} [{}]",
                r.companies, r.postings, r.would_insert, r.would_update, r.outcomes
            ),
            JobSummary::Harvest(r) => write!(
                f,
                "harvest: companies={} postings={} new={} existing={} total_jobs={} [{}]",
                r.companies, r.postings, r.new, r.existing, r.total_jobs, r.outcomes
            ),
            JobSummary::Discover(r) => write!(
                f,
                "discover{}: sources={} known={} unknown={} registered={} probe_matches={} verified={}",
                if r.dry_run { " (dry run)" } else { "" },
                r.sources_fetched,
                r.known,
                r.unknown,
                r.registered,
                r.probe_matches,
                r.verified
            ),
            JobSummary::Cleanup(r) => write!(
                f,
                "cleanup{}: marked_inactive={} deleted={} total_jobs={} active_jobs={}",
                if r.dry_run { " (dry run)" } else { "" },
                r.marked_inactive,
                r.deleted,
                r.total_jobs,
                r.active_jobs
            ),
        }
    }
}

/// Wires config, store, fetcher and registry into the three jobs.
pub struct Orchestrator {
    config: SyncConfig,
    store: Arc<dyn JobsekrStore>,
    fetcher: Arc<HttpFetcher>,
    registry: Arc<VendorRegistry>,
    sources: SourcesFile,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("fetcher", &self.fetcher)
            .field("registry", &self.registry)
            .field("sources", &self.sources.text_sources.len())
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn JobsekrStore>,
        fetcher: Arc<HttpFetcher>,
        registry: Arc<VendorRegistry>,
        sources: SourcesFile,
    ) -> Self {
        Self {
            config,
            store,
            fetcher,
            registry,
            sources,
        }
    }

    /// Production wiring: Postgres store, reqwest fetcher, `sources.yaml`.
    pub async fn from_config(config: SyncConfig) -> Result<Self> {
        let sources_path = config.sources_path();
        let sources = if sources_path.exists() {
            SourcesFile::load(&sources_path)?
        } else {
            warn!(path = %sources_path.display(), "sources file missing; using defaults");
            SourcesFile::default()
        };
        let registry = sources
            .build_registry()
            .with_context(|| format!("building vendor registry from {}", sources_path.display()))?;
        let fetcher = HttpFetcher::new(config.http_client_config()).context("building http client")?;
        let store = PgStore::connect(&config.database_url)
            .await
            .context("connecting to database")?;

        Ok(Self::new(
            config,
            Arc::new(store),
            Arc::new(fetcher),
            Arc::new(registry),
            sources,
        ))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn JobsekrStore> {
        &self.store
    }

    pub async fn harvest(&self, options: &HarvestOptions) -> Result<HarvestReport, SyncError> {
        Harvester::new(Arc::clone(&self.fetcher), Arc::clone(&self.registry))
            .run(self.store.as_ref(), options, Utc::now())
            .await
    }

    pub async fn discover(&self, options: DiscoverOptions) -> Result<DiscoveryReport, SyncError> {
        Discovery::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.registry),
            DiscoveryConfig::from(&self.sources),
        )
        .run(self.store.as_ref(), options)
        .await
    }

    pub async fn cleanup(&self, dry_run: bool) -> Result<CleanupReport, SyncError> {
        let policy = self.config.cleanup_policy();
        let engine = CleanupEngine::new(policy);
        let store = self.store.as_ref();
        if dry_run {
            return Ok(engine.run(store, Utc::now(), true).await?);
        }

        let snapshot = json!({
            "stale_hours": policy.stale_after.num_hours(),
            "ttl_days": policy.expire_after.num_days(),
        });
        let run = RunHandle::start(store, CLEANUP_SOURCE, snapshot).await?;
        match engine.run(store, Utc::now(), false).await {
            Ok(report) => {
                let found = (report.marked_inactive + report.deleted) as i64;
                run.complete(
                    store,
                    RunTotals {
                        total_found: found,
                        new_found: 0,
                        errors: 0,
                    },
                )
                .await?;
                info!(
                    marked_inactive = report.marked_inactive,
                    deleted = report.deleted,
                    total_jobs = report.total_jobs,
                    active_jobs = report.active_jobs,
                    "cleanup finished"
                );
                Ok(report)
            }
            Err(err) => {
                run.fail(
                    store,
                    RunTotals {
                        errors: 1,
                        ..Default::default()
                    },
                )
                .await;
                Err(err.into())
            }
        }
    }

    /// Default-option run of one job, as used by cron and the scheduler.
    pub async fn run_job(&self, kind: JobKind) -> Result<JobSummary, SyncError> {
        info!(job = %kind, "job starting");
        let summary = match kind {
            JobKind::Harvest => JobSummary::Harvest(self.harvest(&HarvestOptions::default()).await?),
            JobKind::Discover => JobSummary::Discover(
                self.discover(DiscoverOptions {
                    probe: true,
                    dry_run: false,
                })
                .await?,
            ),
            JobKind::Cleanup => JobSummary::Cleanup(self.cleanup(false).await?),
        };
        info!(job = %kind, summary = %summary, "job finished");
        Ok(summary)
    }

    fn cron_for(&self, kind: JobKind) -> &str {
        match kind {
            JobKind::Harvest => &self.config.harvest_cron,
            JobKind::Discover => &self.config.discover_cron,
            JobKind::Cleanup => &self.config.cleanup_cron,
        }
    }

    /// One cron job per kind, or `None` when scheduling is disabled.
    pub async fn maybe_build_scheduler(self: &Arc<Self>) -> Result<Option<JobScheduler>> {
        if !self.config.scheduler_enabled {
            return Ok(None);
        }

        let sched = JobScheduler::new().await.context("creating scheduler")?;
        for kind in JobKind::ALL {
            let cron = self.cron_for(kind).to_string();
            let orchestrator = Arc::clone(self);
            let job = Job::new_async(cron.as_str(), move |_uuid, _l| {
                let orchestrator = Arc::clone(&orchestrator);
                Box::pin(async move {
                    if let Err(err) = orchestrator.run_job(kind).await {
                        error!(job = %kind, error = %err, "scheduled job failed");
                    }
                })
            })
            .with_context(|| format!("creating scheduler job for cron {cron}"))?;
            sched.add(job).await.context("adding scheduler job")?;
            info!(job = %kind, %cron, "scheduled");
        }
        Ok(Some(sched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_kind_parses_cron_names() {
        assert_eq!("scrape".parse::<JobKind>().unwrap(), JobKind::Harvest);
        assert_eq!("Harvest".parse::<JobKind>().unwrap(), JobKind::Harvest);
        assert_eq!(" discover ".parse::<JobKind>().unwrap(), JobKind::Discover);
        assert_eq!("cleanup".parse::<JobKind>().unwrap(), JobKind::Cleanup);
        let err = "reindex".parse::<JobKind>().unwrap_err();
        assert_eq!(err.value, "reindex");
    }

    #[test]
    fn cleanup_summary_mentions_dry_run() {
        let summary = JobSummary::Cleanup(CleanupReport {
            marked_inactive: 2,
            deleted: 1,
            total_jobs: 10,
            active_jobs: 7,
            dry_run: true,
        });
        let text = summary.to_string();
        assert!(text.starts_with("cleanup (dry run)"));
        assert!(text.contains("deleted=1"));
    }
}
