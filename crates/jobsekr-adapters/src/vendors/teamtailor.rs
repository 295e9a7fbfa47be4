use jobsekr_core::{ParsedJob, RemoteType};
use serde_json::Value as JsonValue;
use url::Url;

use super::subdomain_slug;
use crate::normalize::{
    html_to_text, json_str, json_string, json_string_vec, json_timestamp, listing_items,
    seniority_from_title,
};
use crate::VendorParser;

#[derive(Debug, Clone, Copy, Default)]
pub struct Teamtailor;

impl VendorParser for Teamtailor {
    fn vendor(&self) -> &'static str {
        "teamtailor"
    }

    fn api_template(&self) -> &'static str {
        "https://{slug}.teamtailor.com/api/v1/jobs"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        subdomain_slug(url, "teamtailor.com", &["www", "api", "app", "support", "career", "docs"])
    }

    fn parse_jobs(&self, raw: &JsonValue, _slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["data"]).iter().filter_map(parse_job).collect()
    }
}

/// JSON:API resource: fields live under `attributes`, the public page under `links`.
fn parse_job(item: &JsonValue) -> Option<ParsedJob> {
    let url = json_string(item, &["links", "careersite-job-url"])?;
    let title = json_string(item, &["attributes", "title"])?;
    let mut job = ParsedJob::new(url, title, item.clone());

    job.remote_type = match json_str(item, &["attributes", "remote-status"]) {
        Some("fully") => Some(RemoteType::Remote),
        Some("hybrid") | Some("temporary") => Some(RemoteType::Hybrid),
        Some("none") => Some(RemoteType::Onsite),
        _ => None,
    };
    job.description = json_str(item, &["attributes", "body"]).and_then(html_to_text);
    job.seniority = seniority_from_title(&job.title);
    job.tags.extend(json_string_vec(item, &["attributes", "tags"]));
    if let Some(kind) = json_string(item, &["attributes", "employment-type"]) {
        job.tags.insert(kind);
    }

    job.posted_at = json_timestamp(item, &["attributes", "created-at"]);
    Some(job)
}
