//! The discover job: scan curated text sources for company career links,
//! register the ones on a known vendor, probe the rest, then verify.

use std::sync::Arc;

use jobsekr_adapters::VendorRegistry;
use jobsekr_core::{CompanyUpdate, NewCompany};
use jobsekr_fetch::{HttpFetcher, TargetOutcome};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info, warn};

use crate::classify::{dedupe, extract_candidates, Candidate};
use crate::config::{SourcesFile, TextSource};
use crate::runs::RunHandle;
use crate::store::{CompanyStore, JobsekrStore, RunTotals, StoreError};
use crate::SyncError;

pub const DISCOVER_SOURCE: &str = "discover";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub text_sources: Vec<TextSource>,
    pub probe_vendors: Vec<String>,
}

impl From<&SourcesFile> for DiscoveryConfig {
    fn from(file: &SourcesFile) -> Self {
        Self {
            text_sources: file.text_sources.clone(),
            probe_vendors: file.probe_vendors.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiscoverOptions {
    /// Probe unresolved candidates against every probe vendor.
    pub probe: bool,
    pub dry_run: bool,
}

/// A slug that answered a vendor's listing endpoint with at least one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeMatch {
    pub ats: String,
    pub slug: String,
    pub name: Option<String>,
    pub api_url: String,
    pub job_count: usize,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    pub sources_fetched: usize,
    pub sources_failed: usize,
    pub candidates: usize,
    pub known: usize,
    pub unknown: usize,
    /// Known-vendor candidates newly added (or, in a dry run, that would be offered).
    pub registered: usize,
    pub probe_matches: usize,
    pub verified: usize,
    pub probed_unverified: usize,
    pub dry_run: bool,
}

impl DiscoveryReport {
    pub fn totals(&self) -> RunTotals {
        let found = (self.registered + self.probe_matches) as i64;
        RunTotals {
            total_found: found,
            new_found: found,
            errors: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct ProbeKey {
    candidate: usize,
    ats: String,
    api_url: String,
}

/// Tests slugs against vendor listing endpoints. All slug × vendor pairs go
/// through one fetch batch, so they share the fetcher's ceilings.
#[derive(Debug, Clone)]
pub struct ProbeEngine {
    fetcher: Arc<HttpFetcher>,
    registry: Arc<VendorRegistry>,
    vendors: Vec<String>,
}

impl ProbeEngine {
    pub fn new(fetcher: Arc<HttpFetcher>, registry: Arc<VendorRegistry>, vendors: Vec<String>) -> Self {
        Self {
            fetcher,
            registry,
            vendors,
        }
    }

    /// Matches ordered by `(slug, ats)`. A slug may match several vendors.
    pub async fn probe(&self, candidates: &[Candidate]) -> Vec<ProbeMatch> {
        let mut targets = Vec::with_capacity(candidates.len() * self.vendors.len());
        for (index, candidate) in candidates.iter().enumerate() {
            for vendor in &self.vendors {
                match self.registry.api_url(vendor, &candidate.slug) {
                    Ok(api_url) => targets.push((
                        ProbeKey {
                            candidate: index,
                            ats: vendor.clone(),
                            api_url: api_url.clone(),
                        },
                        api_url,
                    )),
                    Err(err) => warn!(error = %err, "probe vendor skipped"),
                }
            }
        }
        info!(slugs = candidates.len(), requests = targets.len(), "probing");

        let registry = Arc::clone(&self.registry);
        let results = self
            .fetcher
            .fetch_batch(targets, move |key: &ProbeKey, raw: &JsonValue| {
                registry
                    .get(&key.ats)
                    .map(|parser| parser.count_listings(raw))
                    .unwrap_or(0)
            })
            .await;

        let mut matches = Vec::new();
        for (key, outcome) in results {
            let candidate = &candidates[key.candidate];
            match outcome {
                TargetOutcome::Success(job_count) if job_count > 0 => matches.push(ProbeMatch {
                    ats: key.ats,
                    slug: candidate.slug.clone(),
                    name: candidate.name.clone(),
                    api_url: key.api_url,
                    job_count,
                    source: candidate.source.clone(),
                }),
                other => debug!(slug = %candidate.slug, ats = %key.ats, outcome = %other.kind(), "probe miss"),
            }
        }
        matches.sort_by(|a, b| (&a.slug, &a.ats).cmp(&(&b.slug, &b.ats)));
        matches
    }
}

#[derive(Debug, Clone)]
pub struct Discovery {
    fetcher: Arc<HttpFetcher>,
    registry: Arc<VendorRegistry>,
    config: DiscoveryConfig,
}

impl Discovery {
    pub fn new(fetcher: Arc<HttpFetcher>, registry: Arc<VendorRegistry>, config: DiscoveryConfig) -> Self {
        Self {
            fetcher,
            registry,
            config,
        }
    }

    pub fn probe_engine(&self) -> ProbeEngine {
        ProbeEngine::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.registry),
            self.config.probe_vendors.clone(),
        )
    }

    pub async fn run<S>(&self, store: &S, options: DiscoverOptions) -> Result<DiscoveryReport, SyncError>
    where
        S: JobsekrStore + ?Sized,
    {
        let run = match options.dry_run {
            true => None,
            false => {
                let sources = self
                    .config
                    .text_sources
                    .iter()
                    .map(TextSource::provenance)
                    .collect::<Vec<_>>();
                let snapshot = json!({ "sources": sources, "probe": options.probe });
                Some(RunHandle::start(store, DISCOVER_SOURCE, snapshot).await?)
            }
        };

        let mut report = DiscoveryReport {
            dry_run: options.dry_run,
            ..Default::default()
        };
        let result = self.execute(store, options, &mut report).await;
        if let Some(run) = run {
            match &result {
                Ok(()) => run.complete(store, report.totals()).await?,
                Err(err) => {
                    warn!(error = %err, registered = report.registered, "discovery aborted");
                    run.fail(store, report.totals()).await;
                }
            }
        }
        result.map(|()| report)
    }

    async fn execute<S>(&self, store: &S, options: DiscoverOptions, report: &mut DiscoveryReport) -> Result<(), SyncError>
    where
        S: JobsekrStore + ?Sized,
    {
        let mut found = Vec::new();
        for source in &self.config.text_sources {
            let provenance = source.provenance();
            match self.fetch_source(source).await {
                Some(text) => {
                    let links = extract_candidates(&self.registry, &text, &provenance);
                    info!(source = %provenance, links = links.len(), "text source scanned");
                    report.sources_fetched += 1;
                    found.extend(links);
                }
                None => {
                    warn!(source = %provenance, "text source unreachable; skipping");
                    report.sources_failed += 1;
                }
            }
        }

        let candidates = dedupe(found);
        let (known, unknown): (Vec<_>, Vec<_>) = candidates.into_iter().partition(Candidate::is_known);
        report.candidates = known.len() + unknown.len();
        report.known = known.len();
        report.unknown = unknown.len();
        info!(known = report.known, unknown = report.unknown, "candidates extracted");

        if options.dry_run {
            report.registered = known.len();
            info!(would_register = report.registered, would_probe = report.unknown, "discovery dry run");
            return Ok(());
        }

        for candidate in &known {
            let api_url = self.registry.api_url(&candidate.ats, &candidate.slug)?;
            let added = store
                .upsert_company(NewCompany {
                    slug: candidate.slug.clone(),
                    ats: candidate.ats.clone(),
                    name: candidate.name.clone(),
                    api_url: Some(api_url),
                    careers_url: Some(candidate.url.clone()),
                    source: candidate.source.clone(),
                })
                .await?;
            if added.is_some() {
                report.registered += 1;
            }
        }
        info!(registered = report.registered, "known-vendor companies registered");

        if options.probe && !unknown.is_empty() {
            for hit in self.probe_engine().probe(&unknown).await {
                if record_probe_match(store, hit).await? {
                    report.probe_matches += 1;
                }
            }
            info!(matches = report.probe_matches, "cross-probe finished");
        }

        let (verified, probed) = self.verify_unverified(store).await?;
        report.verified = verified;
        report.probed_unverified = probed;

        let companies = store.count_companies().await?;
        info!(
            sources = report.sources_fetched,
            registered = report.registered,
            probe_matches = report.probe_matches,
            verified = report.verified,
            companies,
            "discovery finished"
        );
        Ok(())
    }

    async fn fetch_source(&self, source: &TextSource) -> Option<String> {
        for url in source.candidate_urls() {
            match self.fetcher.fetch_text(&url).await {
                Ok(text) => return Some(text),
                Err(err) => debug!(%url, error = %err, "text source url failed"),
            }
        }
        None
    }

    /// Fetch every unverified, fetchable company; a non-empty listing verifies it.
    /// Returns `(verified, probed)`.
    pub async fn verify_unverified<S>(&self, store: &S) -> Result<(usize, usize), StoreError>
    where
        S: CompanyStore + ?Sized,
    {
        let pending = store
            .list_unverified_companies()
            .await?
            .into_iter()
            .filter(|c| c.is_actionable() && self.registry.contains(&c.ats))
            .collect::<Vec<_>>();

        let targets = pending
            .iter()
            .enumerate()
            .filter_map(|(index, c)| c.api_url.clone().map(|url| ((index, c.ats.clone()), url)))
            .collect::<Vec<_>>();
        let probed = targets.len();

        let registry = Arc::clone(&self.registry);
        let results = self
            .fetcher
            .fetch_batch(targets, move |(_, ats): &(usize, String), raw: &JsonValue| {
                registry.get(ats).map(|parser| parser.count_listings(raw)).unwrap_or(0)
            })
            .await;

        let mut verified = 0;
        for ((index, _), outcome) in results {
            if let TargetOutcome::Success(job_count) = outcome {
                if job_count == 0 {
                    continue;
                }
                store
                    .update_company(
                        pending[index].id,
                        CompanyUpdate {
                            verified: Some(true),
                            job_count: Some(job_count as i64),
                            ..Default::default()
                        },
                    )
                    .await?;
                verified += 1;
            }
        }
        info!(verified, probed, "unverified companies checked");
        Ok((verified, probed))
    }
}

/// Register a probe match and mark it verified. `false` when the company
/// was already known.
async fn record_probe_match<S>(store: &S, hit: ProbeMatch) -> Result<bool, StoreError>
where
    S: CompanyStore + ?Sized,
{
    let created = store
        .upsert_company(NewCompany {
            slug: hit.slug,
            ats: hit.ats,
            name: hit.name,
            api_url: Some(hit.api_url),
            careers_url: None,
            source: hit.source,
        })
        .await?;
    let Some(company) = created else {
        return Ok(false);
    };
    store
        .update_company(
            company.id,
            CompanyUpdate {
                verified: Some(true),
                job_count: Some(hit.job_count as i64),
                ..Default::default()
            },
        )
        .await?;
    Ok(true)
}
