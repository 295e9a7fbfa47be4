//! Merging fetched postings into the job store, and the staleness/expiry passes.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use jobsekr_core::JobPosting;
use serde::Serialize;
use tracing::info;

use crate::store::{JobStore, StoreError};

/// Collapse postings sharing a `url`: earliest `first_seen`, latest `last_seen`,
/// descriptive fields from the most recently seen copy. Keeps first-occurrence order.
pub fn collapse_batch(postings: Vec<JobPosting>) -> Vec<JobPosting> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(postings.len());
    let mut out: Vec<JobPosting> = Vec::with_capacity(postings.len());
    for posting in postings {
        match index.get(&posting.url) {
            Some(&pos) => {
                let kept = &mut out[pos];
                let first_seen = kept.first_seen.min(posting.first_seen);
                if posting.last_seen >= kept.last_seen {
                    *kept = posting;
                }
                kept.first_seen = first_seen;
            }
            None => {
                index.insert(posting.url.clone(), out.len());
                out.push(posting);
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub new: usize,
    pub existing: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcilePreview {
    pub would_insert: usize,
    pub would_update: usize,
}

pub async fn reconcile<S>(store: &S, postings: Vec<JobPosting>) -> Result<ReconcileReport, StoreError>
where
    S: JobStore + ?Sized,
{
    let batch = collapse_batch(postings);
    if batch.is_empty() {
        return Ok(ReconcileReport::default());
    }
    let counts = store.batch_upsert_jobs(&batch).await?;
    Ok(ReconcileReport {
        new: counts.new,
        existing: counts.existing,
    })
}

/// Read-only counterpart of [`reconcile`].
pub async fn preview<S>(store: &S, postings: Vec<JobPosting>) -> Result<ReconcilePreview, StoreError>
where
    S: JobStore + ?Sized,
{
    let batch = collapse_batch(postings);
    let urls = batch.iter().map(|p| p.url.clone()).collect::<Vec<_>>();
    let existing = if urls.is_empty() {
        Default::default()
    } else {
        store.existing_urls(&urls).await?
    };
    let would_update = urls.iter().filter(|u| existing.contains(*u)).count();
    Ok(ReconcilePreview {
        would_insert: urls.len() - would_update,
        would_update,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    pub stale_after: Duration,
    pub expire_after: Duration,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            stale_after: Duration::hours(48),
            expire_after: Duration::days(90),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub marked_inactive: u64,
    pub deleted: u64,
    pub total_jobs: i64,
    pub active_jobs: i64,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupEngine {
    policy: CleanupPolicy,
}

impl CleanupEngine {
    pub fn new(policy: CleanupPolicy) -> Self {
        Self { policy }
    }

    pub fn stale_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.policy.stale_after
    }

    pub fn expiry_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.policy.expire_after
    }

    /// Staleness pass then expiry pass. With `dry_run` both only count.
    pub async fn run<S>(&self, store: &S, now: DateTime<Utc>, dry_run: bool) -> Result<CleanupReport, StoreError>
    where
        S: JobStore + ?Sized,
    {
        let stale_cutoff = self.stale_cutoff(now);
        let expiry_cutoff = self.expiry_cutoff(now);

        let marked_inactive = if dry_run {
            store.count_stale(stale_cutoff).await?
        } else {
            store.mark_inactive(stale_cutoff).await?
        };
        info!(%stale_cutoff, marked_inactive, dry_run, "staleness pass");

        let deleted = if dry_run {
            store.count_expired(expiry_cutoff).await?
        } else {
            store.delete_expired(expiry_cutoff).await?
        };
        info!(%expiry_cutoff, deleted, dry_run, "expiry pass");

        Ok(CleanupReport {
            marked_inactive,
            deleted,
            total_jobs: store.count_jobs(false).await?,
            active_jobs: store.count_jobs(true).await?,
            dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn posting(url: &str, title: &str, first_seen: DateTime<Utc>, last_seen: DateTime<Utc>) -> JobPosting {
        JobPosting {
            url: url.to_string(),
            title: title.to_string(),
            ats_source: "greenhouse".to_string(),
            company_id: None,
            company_name: Some("Acme".to_string()),
            location: None,
            description: None,
            salary_min: None,
            salary_max: None,
            salary_currency: None,
            remote_type: None,
            seniority: None,
            category: None,
            tags: Default::default(),
            posted_at: None,
            first_seen,
            last_seen,
            is_active: true,
            raw_data: json!({}),
        }
    }

    #[test]
    fn same_url_collapses_to_min_first_and_max_last_seen() {
        let t0 = Utc::now() - Duration::days(2);
        let t1 = t0 + Duration::hours(1);
        let t2 = t0 + Duration::hours(5);
        let batch = vec![
            posting("https://a/1", "Old title", t1, t1),
            posting("https://a/2", "Other", t1, t1),
            posting("https://a/1", "New title", t2, t2),
            posting("https://a/1", "Stale copy", t0, t0),
        ];
        let out = collapse_batch(batch);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].url, "https://a/1");
        assert_eq!(out[0].first_seen, t0);
        assert_eq!(out[0].last_seen, t2);
        assert_eq!(out[0].title, "New title");
        assert_eq!(out[1].url, "https://a/2");
    }

    #[tokio::test]
    async fn posting_is_new_or_existing_never_both() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let first = reconcile(
            &store,
            vec![posting("https://a/1", "A", now, now), posting("https://a/1", "A", now, now)],
        )
        .await
        .unwrap();
        assert_eq!(first, ReconcileReport { new: 1, existing: 0 });

        let later = now + Duration::hours(3);
        let second = reconcile(
            &store,
            vec![posting("https://a/1", "A2", later, later), posting("https://a/3", "C", later, later)],
        )
        .await
        .unwrap();
        assert_eq!(second, ReconcileReport { new: 1, existing: 1 });

        let stored = store.job("https://a/1").await.unwrap();
        assert_eq!(stored.first_seen, now);
        assert_eq!(stored.last_seen, later);
        assert_eq!(stored.title, "A2");
    }

    #[tokio::test]
    async fn preview_counts_without_writing() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store.put_job(posting("https://a/1", "A", now, now)).await;
        let out = preview(
            &store,
            vec![posting("https://a/1", "A", now, now), posting("https://a/2", "B", now, now)],
        )
        .await
        .unwrap();
        assert_eq!(out, ReconcilePreview { would_insert: 1, would_update: 1 });
        assert_eq!(store.count_jobs(false).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn expiry_and_staleness_are_independent() {
        let store = MemoryStore::new();
        let now = Utc::now();
        // Old but recently seen: expiry deletes it, staleness leaves it alone.
        store
            .put_job(posting("https://a/old", "Old", now - Duration::days(95), now - Duration::hours(1)))
            .await;
        store
            .put_job(posting("https://a/stale", "Stale", now - Duration::days(10), now - Duration::hours(72)))
            .await;
        store
            .put_job(posting("https://a/fresh", "Fresh", now - Duration::days(1), now - Duration::hours(2)))
            .await;

        let engine = CleanupEngine::new(CleanupPolicy::default());
        let preview = engine.run(&store, now, true).await.unwrap();
        assert_eq!((preview.marked_inactive, preview.deleted), (1, 1));
        assert_eq!(store.count_jobs(true).await.unwrap(), 3);

        let report = engine.run(&store, now, false).await.unwrap();
        assert_eq!(report.marked_inactive, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.total_jobs, 2);
        assert_eq!(report.active_jobs, 1);
        assert!(store.job("https://a/old").await.is_none());
        let stale = store.job("https://a/stale").await.unwrap();
        assert!(!stale.is_active);

        // Running the passes in the other order gives the same end state.
        let other = MemoryStore::new();
        other
            .put_job(posting("https://a/old", "Old", now - Duration::days(95), now - Duration::hours(1)))
            .await;
        other.delete_expired(engine.expiry_cutoff(now)).await.unwrap();
        assert_eq!(other.mark_inactive(engine.stale_cutoff(now)).await.unwrap(), 0);
        assert_eq!(other.count_jobs(false).await.unwrap(), 0);
    }
}
