use jobsekr_core::{ParsedJob, RemoteType};
use serde_json::Value as JsonValue;
use url::Url;

use super::subdomain_slug;
use crate::normalize::{
    html_to_text, json_str, json_string, json_timestamp, listing_items,
    remote_type_from_keyword, seniority_from_title,
};
use crate::VendorParser;

#[derive(Debug, Clone, Copy, Default)]
pub struct Personio;

impl VendorParser for Personio {
    fn vendor(&self) -> &'static str {
        "personio"
    }

    fn api_template(&self) -> &'static str {
        "https://{slug}.jobs.personio.de/search.json"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        subdomain_slug(url, "jobs.personio.de", &["www"])
            .or_else(|| subdomain_slug(url, "jobs.personio.com", &["www"]))
    }

    fn parse_jobs(&self, raw: &JsonValue, slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["jobs"])
            .iter()
            .filter_map(|item| parse_job(item, slug))
            .collect()
    }
}

fn parse_job(item: &JsonValue, slug: &str) -> Option<ParsedJob> {
    let id = json_string(item, &["id"])?;
    let title = json_string(item, &["name"])?;
    let url = format!("https://{slug}.jobs.personio.de/job/{id}");
    let mut job = ParsedJob::new(url, title, item.clone());

    job.location = json_string(item, &["office"]);
    job.remote_type = job.location.as_deref().and_then(remote_type_from_keyword);
    if job.remote_type.is_none() && json_str(item, &["schedule"]) == Some("remote") {
        job.remote_type = Some(RemoteType::Remote);
    }
    job.category = json_string(item, &["department"]);
    job.description = json_str(item, &["description"]).and_then(html_to_text);
    job.seniority = json_str(item, &["seniority"])
        .and_then(seniority_level)
        .or_else(|| seniority_from_title(&job.title));

    for key in ["employment_type", "schedule"] {
        if let Some(tag) = json_string(item, &[key]) {
            job.tags.insert(tag);
        }
    }
    // Keywords arrive as one comma separated string.
    if let Some(keywords) = json_str(item, &["keywords"]) {
        job.tags.extend(
            keywords
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
        );
    }

    job.posted_at = json_timestamp(item, &["createdAt"]);
    Some(job)
}

fn seniority_level(raw: &str) -> Option<String> {
    let level = match raw {
        "student" => "intern",
        "entry-level" => "junior",
        "experienced" => "mid",
        "executive" => "executive",
        _ => return None,
    };
    Some(level.to_string())
}
