//! Store contracts for companies, job postings and run records, plus an
//! in-process implementation used by tests and dry experiments.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobsekr_core::{Company, CompanyUpdate, JobPosting, NewCompany, RunStatus, ScrapeRun, UNKNOWN_ATS};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("company {0} not found")]
    CompanyNotFound(Uuid),
    #[error("run {0} not found or already finished")]
    RunNotOpen(Uuid),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertCounts {
    pub new: usize,
    pub existing: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub total_found: i64,
    pub new_found: i64,
    pub errors: i64,
}

#[async_trait]
pub trait CompanyStore: Send + Sync {
    /// Verified companies, optionally restricted to one vendor, ordered by `(ats, slug)`.
    async fn list_verified_companies(&self, ats: Option<&str>) -> Result<Vec<Company>, StoreError>;
    /// Unverified companies with a resolved vendor.
    async fn list_unverified_companies(&self) -> Result<Vec<Company>, StoreError>;
    /// Insert unless `(ats, slug)` already exists; `None` for a duplicate.
    async fn upsert_company(&self, company: NewCompany) -> Result<Option<Company>, StoreError>;
    async fn update_company(&self, id: Uuid, update: CompanyUpdate) -> Result<(), StoreError>;
    async fn count_companies(&self) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Upsert by `url`. `first_seen` of an existing row never changes.
    async fn batch_upsert_jobs(&self, postings: &[JobPosting]) -> Result<UpsertCounts, StoreError>;
    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>, StoreError>;
    /// Active postings with `last_seen < cutoff` become inactive.
    async fn mark_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
    async fn count_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
    /// Postings with `first_seen < cutoff` are removed regardless of state.
    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
    async fn count_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
    async fn count_jobs(&self, active_only: bool) -> Result<i64, StoreError>;
}

#[async_trait]
pub trait RunLedger: Send + Sync {
    async fn start_run(&self, source: &str, config: JsonValue) -> Result<Uuid, StoreError>;
    /// Finalize a running record. Finalizing twice is an error.
    async fn finish_run(&self, id: Uuid, totals: RunTotals, status: RunStatus) -> Result<(), StoreError>;
}

/// Everything the orchestrator needs from persistence.
pub trait JobsekrStore: CompanyStore + JobStore + RunLedger {}

impl<T: CompanyStore + JobStore + RunLedger> JobsekrStore for T {}

#[derive(Debug, Default)]
struct MemoryState {
    companies: Vec<Company>,
    jobs: BTreeMap<String, JobPosting>,
    runs: Vec<ScrapeRun>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_job_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every job write fail, for exercising the failed-run path.
    pub fn set_fail_job_writes(&self, fail: bool) {
        self.fail_job_writes.store(fail, Ordering::SeqCst);
    }

    /// Insert or replace a posting verbatim, bypassing reconciliation.
    pub async fn put_job(&self, posting: JobPosting) {
        let mut state = self.state.lock().await;
        state.jobs.insert(posting.url.clone(), posting);
    }

    pub async fn job(&self, url: &str) -> Option<JobPosting> {
        self.state.lock().await.jobs.get(url).cloned()
    }

    pub async fn jobs(&self) -> Vec<JobPosting> {
        self.state.lock().await.jobs.values().cloned().collect()
    }

    pub async fn companies(&self) -> Vec<Company> {
        self.state.lock().await.companies.clone()
    }

    pub async fn runs(&self) -> Vec<ScrapeRun> {
        self.state.lock().await.runs.clone()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_job_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("job writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CompanyStore for MemoryStore {
    async fn list_verified_companies(&self, ats: Option<&str>) -> Result<Vec<Company>, StoreError> {
        let state = self.state.lock().await;
        let mut out = state
            .companies
            .iter()
            .filter(|c| c.verified && ats.map_or(true, |a| c.ats == a))
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by(|a, b| (&a.ats, &a.slug).cmp(&(&b.ats, &b.slug)));
        Ok(out)
    }

    async fn list_unverified_companies(&self) -> Result<Vec<Company>, StoreError> {
        let state = self.state.lock().await;
        let mut out = state
            .companies
            .iter()
            .filter(|c| !c.verified && c.ats != UNKNOWN_ATS)
            .cloned()
            .collect::<Vec<_>>();
        out.sort_by(|a, b| (&a.ats, &a.slug).cmp(&(&b.ats, &b.slug)));
        Ok(out)
    }

    async fn upsert_company(&self, company: NewCompany) -> Result<Option<Company>, StoreError> {
        let mut state = self.state.lock().await;
        if state
            .companies
            .iter()
            .any(|c| c.ats == company.ats && c.slug == company.slug)
        {
            return Ok(None);
        }
        let created = Company {
            id: Uuid::new_v4(),
            slug: company.slug,
            name: company.name,
            ats: company.ats,
            api_url: company.api_url,
            careers_url: company.careers_url,
            source: company.source,
            verified: false,
            job_count: 0,
            last_scraped_at: None,
        };
        state.companies.push(created.clone());
        Ok(Some(created))
    }

    async fn update_company(&self, id: Uuid, update: CompanyUpdate) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let company = state
            .companies
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(StoreError::CompanyNotFound(id))?;
        if let Some(verified) = update.verified {
            company.verified = verified;
        }
        if let Some(job_count) = update.job_count {
            company.job_count = job_count;
        }
        if let Some(at) = update.last_scraped_at {
            company.last_scraped_at = Some(at);
        }
        Ok(())
    }

    async fn count_companies(&self) -> Result<i64, StoreError> {
        Ok(self.state.lock().await.companies.len() as i64)
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn batch_upsert_jobs(&self, postings: &[JobPosting]) -> Result<UpsertCounts, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let mut counts = UpsertCounts::default();
        for posting in postings {
            match state.jobs.get_mut(&posting.url) {
                Some(stored) => {
                    stored.refresh_from(posting);
                    counts.existing += 1;
                }
                None => {
                    state.jobs.insert(posting.url.clone(), posting.clone());
                    counts.new += 1;
                }
            }
        }
        Ok(counts)
    }

    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>, StoreError> {
        let state = self.state.lock().await;
        Ok(urls
            .iter()
            .filter(|u| state.jobs.contains_key(*u))
            .cloned()
            .collect())
    }

    async fn mark_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let mut marked = 0;
        for job in state.jobs.values_mut() {
            if job.is_active && job.last_seen < cutoff {
                job.is_active = false;
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn count_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .values()
            .filter(|j| j.is_active && j.last_seen < cutoff)
            .count() as u64)
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let before = state.jobs.len();
        state.jobs.retain(|_, j| j.first_seen >= cutoff);
        Ok((before - state.jobs.len()) as u64)
    }

    async fn count_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let state = self.state.lock().await;
        Ok(state.jobs.values().filter(|j| j.first_seen < cutoff).count() as u64)
    }

    async fn count_jobs(&self, active_only: bool) -> Result<i64, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .values()
            .filter(|j| !active_only || j.is_active)
            .count() as i64)
    }
}

#[async_trait]
impl RunLedger for MemoryStore {
    async fn start_run(&self, source: &str, config: JsonValue) -> Result<Uuid, StoreError> {
        let mut state = self.state.lock().await;
        let id = Uuid::new_v4();
        state.runs.push(ScrapeRun {
            id,
            source: source.to_string(),
            config,
            total_found: 0,
            new_found: 0,
            errors: 0,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
        });
        Ok(id)
    }

    async fn finish_run(&self, id: Uuid, totals: RunTotals, status: RunStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == id && r.finished_at.is_none())
            .ok_or(StoreError::RunNotOpen(id))?;
        run.total_found = totals.total_found;
        run.new_found = totals.new_found;
        run.errors = totals.errors;
        run.status = status;
        run.finished_at = Some(Utc::now());
        Ok(())
    }
}
