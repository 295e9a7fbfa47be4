//! The harvest job: fetch every verified company's listing and reconcile.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jobsekr_adapters::VendorRegistry;
use jobsekr_core::{Company, CompanyUpdate, JobPosting, ParsedJob};
use jobsekr_fetch::{HttpFetcher, OutcomeCounts, OutcomeKind, TargetOutcome};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::{info, warn};

use crate::reconcile::{collapse_batch, preview, reconcile};
use crate::runs::RunHandle;
use crate::store::{JobsekrStore, RunTotals};
use crate::SyncError;

pub const HARVEST_SOURCE: &str = "harvest";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestOptions {
    /// Restrict to one vendor.
    pub ats: Option<String>,
    /// Restrict to one company slug, case-insensitive.
    pub company: Option<String>,
    pub limit: Option<usize>,
    pub dry_run: bool,
}

impl HarvestOptions {
    fn snapshot(&self) -> JsonValue {
        json!({
            "ats": self.ats,
            "company": self.company,
            "limit": self.limit,
            "dry_run": self.dry_run,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestReport {
    pub companies: usize,
    #[serde(skip)]
    pub outcomes: OutcomeCounts,
    pub postings: usize,
    pub companies_with_jobs: usize,
    pub new: usize,
    pub existing: usize,
    pub would_insert: usize,
    pub would_update: usize,
    pub total_jobs: i64,
    pub dry_run: bool,
}

impl HarvestReport {
    pub fn totals(&self) -> RunTotals {
        RunTotals {
            total_found: self.postings as i64,
            new_found: self.new as i64,
            errors: self.outcomes.errors() as i64,
        }
    }
}

#[derive(Debug, Clone)]
struct HarvestTarget {
    index: usize,
    ats: String,
    slug: String,
}

#[derive(Debug, Clone)]
pub struct Harvester {
    fetcher: Arc<HttpFetcher>,
    registry: Arc<VendorRegistry>,
}

impl Harvester {
    pub fn new(fetcher: Arc<HttpFetcher>, registry: Arc<VendorRegistry>) -> Self {
        Self { fetcher, registry }
    }

    pub async fn run<S>(&self, store: &S, options: &HarvestOptions, now: DateTime<Utc>) -> Result<HarvestReport, SyncError>
    where
        S: JobsekrStore + ?Sized,
    {
        let run = match options.dry_run {
            true => None,
            false => Some(RunHandle::start(store, HARVEST_SOURCE, options.snapshot()).await?),
        };

        let mut report = HarvestReport {
            dry_run: options.dry_run,
            ..Default::default()
        };
        let result = self.execute(store, options, now, &mut report).await;
        if let Some(run) = run {
            match &result {
                Ok(()) => run.complete(store, report.totals()).await?,
                Err(err) => {
                    warn!(error = %err, outcomes = %report.outcomes, "harvest aborted");
                    run.fail(store, report.totals()).await;
                }
            }
        }
        result.map(|()| report)
    }

    /// Fills `report` as it goes so an aborted run still carries what was fetched.
    async fn execute<S>(
        &self,
        store: &S,
        options: &HarvestOptions,
        now: DateTime<Utc>,
        report: &mut HarvestReport,
    ) -> Result<(), SyncError>
    where
        S: JobsekrStore + ?Sized,
    {
        let companies = select_companies(
            store.list_verified_companies(options.ats.as_deref()).await?,
            options,
        );
        if companies.is_empty() {
            return Err(SyncError::NoEligibleTargets);
        }
        report.companies = companies.len();
        info!(companies = companies.len(), dry_run = options.dry_run, "harvest starting");

        let mut warned = BTreeSet::new();
        let mut targets = Vec::with_capacity(companies.len());
        for (index, company) in companies.iter().enumerate() {
            let api_url = company.api_url.as_deref().filter(|u| !u.is_empty());
            match api_url {
                Some(url) if self.registry.contains(&company.ats) => targets.push((
                    HarvestTarget {
                        index,
                        ats: company.ats.clone(),
                        slug: company.slug.clone(),
                    },
                    url.to_string(),
                )),
                _ => {
                    report.outcomes.record(OutcomeKind::NotConfigured);
                    if warned.insert(company.ats.clone()) {
                        warn!(ats = %company.ats, "no parser or api url configured; skipping companies for this vendor");
                    }
                }
            }
        }
        if targets.is_empty() {
            return Err(SyncError::NoEligibleTargets);
        }

        let registry = Arc::clone(&self.registry);
        let results = self
            .fetcher
            .fetch_batch(targets, move |target: &HarvestTarget, raw: &JsonValue| -> Vec<ParsedJob> {
                registry
                    .get(&target.ats)
                    .map(|parser| parser.parse_jobs(raw, &target.slug))
                    .unwrap_or_default()
            })
            .await;

        let mut per_company: HashMap<usize, i64> = HashMap::new();
        let mut postings = Vec::new();
        for (target, outcome) in results {
            report.outcomes.record(outcome.kind());
            let TargetOutcome::Success(jobs) = outcome else {
                continue;
            };
            if jobs.is_empty() {
                continue;
            }
            let company = &companies[target.index];
            *per_company.entry(target.index).or_default() += jobs.len() as i64;
            postings.extend(jobs.into_iter().map(|job| JobPosting::from_parsed(job, company, now)));
        }
        let postings = collapse_batch(postings);
        report.postings = postings.len();
        report.companies_with_jobs = per_company.len();

        if options.dry_run {
            let planned = preview(store, postings).await?;
            report.would_insert = planned.would_insert;
            report.would_update = planned.would_update;
        } else {
            let reconciled = reconcile(store, postings).await?;
            report.new = reconciled.new;
            report.existing = reconciled.existing;

            for (index, job_count) in &per_company {
                store
                    .update_company(
                        companies[*index].id,
                        CompanyUpdate {
                            verified: Some(true),
                            job_count: Some(*job_count),
                            last_scraped_at: Some(now),
                        },
                    )
                    .await?;
            }
        }

        report.total_jobs = store.count_jobs(false).await?;
        info!(
            outcomes = %report.outcomes,
            postings = report.postings,
            new = report.new,
            existing = report.existing,
            would_insert = report.would_insert,
            would_update = report.would_update,
            total_jobs = report.total_jobs,
            dry_run = report.dry_run,
            "harvest finished"
        );
        Ok(())
    }
}

fn select_companies(mut companies: Vec<Company>, options: &HarvestOptions) -> Vec<Company> {
    if let Some(slug) = &options.company {
        companies.retain(|c| c.slug.eq_ignore_ascii_case(slug));
    }
    if let Some(limit) = options.limit {
        companies.truncate(limit);
    }
    companies
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn company(ats: &str, slug: &str) -> Company {
        Company {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: None,
            ats: ats.to_string(),
            api_url: Some(format!("https://api.example/{ats}/{slug}")),
            careers_url: None,
            source: "test".to_string(),
            verified: true,
            job_count: 0,
            last_scraped_at: None,
        }
    }

    #[test]
    fn company_filter_is_case_insensitive_then_limited() {
        let all = vec![company("lever", "Acme"), company("ashby", "acme"), company("lever", "foo")];
        let picked = select_companies(
            all.clone(),
            &HarvestOptions {
                company: Some("ACME".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(picked.len(), 2);

        let limited = select_companies(
            all,
            &HarvestOptions {
                limit: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].slug, "Acme");
    }

    #[test]
    fn totals_count_only_error_outcomes() {
        let mut outcomes = OutcomeCounts::default();
        for kind in [
            OutcomeKind::Success,
            OutcomeKind::Empty,
            OutcomeKind::NotConfigured,
            OutcomeKind::RateLimited,
            OutcomeKind::TransportError,
        ] {
            outcomes.record(kind);
        }
        let report = HarvestReport {
            postings: 12,
            new: 5,
            outcomes,
            ..Default::default()
        };
        assert_eq!(
            report.totals(),
            RunTotals {
                total_found: 12,
                new_found: 5,
                errors: 2
            }
        );
    }

    #[test]
    fn snapshot_records_filters() {
        let options = HarvestOptions {
            ats: Some("lever".to_string()),
            limit: Some(10),
            ..Default::default()
        };
        let snapshot = options.snapshot();
        assert_eq!(snapshot["ats"], "lever");
        assert_eq!(snapshot["limit"], 10);
        assert_eq!(snapshot["dry_run"], false);
        assert!(snapshot["company"].is_null());
    }
}
