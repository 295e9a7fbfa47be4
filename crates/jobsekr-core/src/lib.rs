//! Canonical job, company and run records shared by every Jobsekr crate.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

pub const CRATE_NAME: &str = "jobsekr-core";

/// Vendor tag for companies found by discovery whose ATS is not known yet.
pub const UNKNOWN_ATS: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteType {
    Remote,
    Hybrid,
    Onsite,
}

impl RemoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteType::Remote => "remote",
            RemoteType::Hybrid => "hybrid",
            RemoteType::Onsite => "onsite",
        }
    }
}

impl fmt::Display for RemoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RemoteType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "remote" => Ok(RemoteType::Remote),
            "hybrid" => Ok(RemoteType::Hybrid),
            "onsite" => Ok(RemoteType::Onsite),
            other => Err(ParseEnumError {
                kind: "remote type",
                value: other.to_string(),
            }),
        }
    }
}

/// Vendor-derived handoff from a parser into the harvest pipeline.
///
/// Carries only what the vendor response says; company identity and
/// engine timestamps are attached when it becomes a [`JobPosting`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedJob {
    pub url: String,
    pub title: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub remote_type: Option<RemoteType>,
    pub seniority: Option<String>,
    pub category: Option<String>,
    pub tags: BTreeSet<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub raw_data: JsonValue,
}

impl ParsedJob {
    pub fn new(url: impl Into<String>, title: impl Into<String>, raw_data: JsonValue) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            location: None,
            description: None,
            salary_min: None,
            salary_max: None,
            salary_currency: None,
            remote_type: None,
            seniority: None,
            category: None,
            tags: BTreeSet::new(),
            posted_at: None,
            raw_data,
        }
    }
}

/// Canonical persisted posting. `url` is the natural dedup key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPosting {
    pub url: String,
    pub title: String,
    pub ats_source: String,
    pub company_id: Option<Uuid>,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub remote_type: Option<RemoteType>,
    pub seniority: Option<String>,
    pub category: Option<String>,
    pub tags: BTreeSet<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub is_active: bool,
    pub raw_data: JsonValue,
}

impl JobPosting {
    pub fn from_parsed(parsed: ParsedJob, company: &Company, seen_at: DateTime<Utc>) -> Self {
        Self {
            url: parsed.url,
            title: parsed.title,
            ats_source: company.ats.clone(),
            company_id: Some(company.id),
            company_name: company.name.clone(),
            location: parsed.location,
            description: parsed.description,
            salary_min: parsed.salary_min,
            salary_max: parsed.salary_max,
            salary_currency: parsed.salary_currency,
            remote_type: parsed.remote_type,
            seniority: parsed.seniority,
            category: parsed.category,
            tags: parsed.tags,
            posted_at: parsed.posted_at,
            first_seen: seen_at,
            last_seen: seen_at,
            is_active: true,
            raw_data: parsed.raw_data,
        }
    }

    /// Copy the vendor-mutable fields of `newer` onto `self`, keeping identity
    /// and `first_seen` untouched.
    pub fn refresh_from(&mut self, newer: &JobPosting) {
        self.title = newer.title.clone();
        self.ats_source = newer.ats_source.clone();
        self.company_id = newer.company_id.or(self.company_id);
        self.company_name = newer.company_name.clone().or(self.company_name.take());
        self.location = newer.location.clone();
        self.description = newer.description.clone();
        self.salary_min = newer.salary_min;
        self.salary_max = newer.salary_max;
        self.salary_currency = newer.salary_currency.clone();
        self.remote_type = newer.remote_type;
        self.seniority = newer.seniority.clone();
        self.category = newer.category.clone();
        self.tags = newer.tags.clone();
        self.posted_at = newer.posted_at.or(self.posted_at);
        self.raw_data = newer.raw_data.clone();
        self.last_seen = self.last_seen.max(newer.last_seen);
        self.is_active = true;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub slug: String,
    pub name: Option<String>,
    pub ats: String,
    pub api_url: Option<String>,
    pub careers_url: Option<String>,
    pub source: String,
    pub verified: bool,
    pub job_count: i64,
    pub last_scraped_at: Option<DateTime<Utc>>,
}

impl Company {
    /// Discovery candidates with no resolved vendor are not fetchable.
    pub fn is_actionable(&self) -> bool {
        self.ats != UNKNOWN_ATS && self.api_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Insert payload for the company directory. `(ats, slug)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    pub slug: String,
    pub ats: String,
    pub name: Option<String>,
    pub api_url: Option<String>,
    pub careers_url: Option<String>,
    pub source: String,
}

/// Partial update; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyUpdate {
    pub verified: Option<bool>,
    pub job_count: Option<i64>,
    pub last_scraped_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(ParseEnumError {
                kind: "run status",
                value: other.to_string(),
            }),
        }
    }
}

/// Audit record for one job invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeRun {
    pub id: Uuid,
    pub source: String,
    pub config: JsonValue,
    pub total_found: i64,
    pub new_found: i64,
    pub errors: i64,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}
