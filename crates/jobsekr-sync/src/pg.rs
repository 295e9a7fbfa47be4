//! Postgres-backed store.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobsekr_core::{Company, CompanyUpdate, JobPosting, NewCompany, RemoteType, RunStatus, UNKNOWN_ATS};
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::store::{CompanyStore, JobStore, RunLedger, RunTotals, StoreError, UpsertCounts};

const COMPANY_COLUMNS: &str =
    "id, slug, name, ats, api_url, careers_url, source, verified, job_count, last_scraped_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn company_from_row(row: &PgRow) -> Result<Company, sqlx::Error> {
    Ok(Company {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        name: row.try_get("name")?,
        ats: row.try_get("ats")?,
        api_url: row.try_get("api_url")?,
        careers_url: row.try_get("careers_url")?,
        source: row.try_get("source")?,
        verified: row.try_get("verified")?,
        job_count: row.try_get("job_count")?,
        last_scraped_at: row.try_get("last_scraped_at")?,
    })
}

fn remote_type_column(value: Option<RemoteType>) -> Option<&'static str> {
    value.map(|r| r.as_str())
}

#[async_trait]
impl CompanyStore for PgStore {
    async fn list_verified_companies(&self, ats: Option<&str>) -> Result<Vec<Company>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COMPANY_COLUMNS}
              FROM companies
             WHERE verified
               AND ($1::text IS NULL OR ats = $1)
             ORDER BY ats, slug
            "#
        ))
        .bind(ats)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(company_from_row).collect::<Result<_, _>>()?)
    }

    async fn list_unverified_companies(&self) -> Result<Vec<Company>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COMPANY_COLUMNS}
              FROM companies
             WHERE NOT verified
               AND ats <> $1
             ORDER BY ats, slug
            "#
        ))
        .bind(UNKNOWN_ATS)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(company_from_row).collect::<Result<_, _>>()?)
    }

    async fn upsert_company(&self, company: NewCompany) -> Result<Option<Company>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO companies (id, slug, name, ats, api_url, careers_url, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (ats, slug) DO NOTHING
            RETURNING {COMPANY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&company.slug)
        .bind(&company.name)
        .bind(&company.ats)
        .bind(&company.api_url)
        .bind(&company.careers_url)
        .bind(&company.source)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(company_from_row).transpose()?)
    }

    async fn update_company(&self, id: Uuid, update: CompanyUpdate) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE companies
               SET verified = COALESCE($2, verified),
                   job_count = COALESCE($3, job_count),
                   last_scraped_at = COALESCE($4, last_scraped_at)
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.verified)
        .bind(update.job_count)
        .bind(update.last_scraped_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::CompanyNotFound(id));
        }
        Ok(())
    }

    async fn count_companies(&self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn batch_upsert_jobs(&self, postings: &[JobPosting]) -> Result<UpsertCounts, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut counts = UpsertCounts::default();
        for posting in postings {
            // xmax is zero only for freshly inserted tuples.
            let inserted: bool = sqlx::query_scalar(
                r#"
                INSERT INTO jobs (
                    id, url, title, ats_source, company_id, company_name, location,
                    description, salary_min, salary_max, salary_currency, remote_type,
                    seniority, category, tags, posted_at, first_seen, last_seen,
                    is_active, raw_data
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                        $15, $16, $17, $18, TRUE, $19)
                ON CONFLICT (url) DO UPDATE
                   SET title = EXCLUDED.title,
                       ats_source = EXCLUDED.ats_source,
                       company_id = COALESCE(EXCLUDED.company_id, jobs.company_id),
                       company_name = COALESCE(EXCLUDED.company_name, jobs.company_name),
                       location = EXCLUDED.location,
                       description = EXCLUDED.description,
                       salary_min = EXCLUDED.salary_min,
                       salary_max = EXCLUDED.salary_max,
                       salary_currency = EXCLUDED.salary_currency,
                       remote_type = EXCLUDED.remote_type,
                       seniority = EXCLUDED.seniority,
                       category = EXCLUDED.category,
                       tags = EXCLUDED.tags,
                       posted_at = COALESCE(EXCLUDED.posted_at, jobs.posted_at),
                       last_seen = GREATEST(jobs.last_seen, EXCLUDED.last_seen),
                       is_active = TRUE,
                       raw_data = EXCLUDED.raw_data
                RETURNING (xmax = 0) AS inserted
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&posting.url)
            .bind(&posting.title)
            .bind(&posting.ats_source)
            .bind(posting.company_id)
            .bind(&posting.company_name)
            .bind(&posting.location)
            .bind(&posting.description)
            .bind(posting.salary_min)
            .bind(posting.salary_max)
            .bind(&posting.salary_currency)
            .bind(remote_type_column(posting.remote_type))
            .bind(&posting.seniority)
            .bind(&posting.category)
            .bind(posting.tags.iter().cloned().collect::<Vec<String>>())
            .bind(posting.posted_at)
            .bind(posting.first_seen)
            .bind(posting.last_seen)
            .bind(&posting.raw_data)
            .fetch_one(&mut *tx)
            .await?;
            if inserted {
                counts.new += 1;
            } else {
                counts.existing += 1;
            }
        }
        tx.commit().await?;
        Ok(counts)
    }

    async fn existing_urls(&self, urls: &[String]) -> Result<HashSet<String>, StoreError> {
        let found: Vec<String> = sqlx::query_scalar("SELECT url FROM jobs WHERE url = ANY($1)")
            .bind(urls)
            .fetch_all(&self.pool)
            .await?;
        Ok(found.into_iter().collect())
    }

    async fn mark_inactive(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE jobs SET is_active = FALSE WHERE is_active AND last_seen < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE is_active AND last_seen < $1")
            .bind(cutoff)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM jobs WHERE first_seen < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE first_seen < $1")
            .bind(cutoff)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn count_jobs(&self, active_only: bool) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE ($1 = FALSE OR is_active)")
            .bind(active_only)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl RunLedger for PgStore {
    async fn start_run(&self, source: &str, config: JsonValue) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO scrape_runs (id, source, config, status, started_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(id)
        .bind(source)
        .bind(config)
        .bind(RunStatus::Running.as_str())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn finish_run(&self, id: Uuid, totals: RunTotals, status: RunStatus) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE scrape_runs
               SET total_found = $2,
                   new_found = $3,
                   errors = $4,
                   status = $5,
                   finished_at = NOW()
             WHERE id = $1
               AND finished_at IS NULL
            "#,
        )
        .bind(id)
        .bind(totals.total_found)
        .bind(totals.new_found)
        .bind(totals.errors)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RunNotOpen(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_type_is_stored_as_lowercase_text() {
        assert_eq!(remote_type_column(Some(RemoteType::Hybrid)), Some("hybrid"));
        assert_eq!(remote_type_column(Some(RemoteType::Onsite)), Some("onsite"));
        assert_eq!(remote_type_column(None), None);
    }
}
