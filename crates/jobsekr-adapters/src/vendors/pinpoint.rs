use jobsekr_core::ParsedJob;
use serde_json::Value as JsonValue;
use url::Url;

use super::subdomain_slug;
use crate::normalize::{
    html_to_text, json_f64, json_str, json_string, json_timestamp, listing_items,
    remote_type_from_keyword, seniority_from_title,
};
use crate::VendorParser;

#[derive(Debug, Clone, Copy, Default)]
pub struct Pinpoint;

impl VendorParser for Pinpoint {
    fn vendor(&self) -> &'static str {
        "pinpoint"
    }

    fn api_template(&self) -> &'static str {
        "https://{slug}.pinpointhq.com/postings.json"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        subdomain_slug(url, "pinpointhq.com", &["www", "app", "api", "help", "developers"])
    }

    fn parse_jobs(&self, raw: &JsonValue, _slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["data"]).iter().filter_map(parse_job).collect()
    }
}

fn parse_job(item: &JsonValue) -> Option<ParsedJob> {
    let url = json_string(item, &["url"])?;
    let title = json_string(item, &["title"])?;
    let mut job = ParsedJob::new(url, title, item.clone());

    job.location = json_string(item, &["location", "name"])
        .or_else(|| json_string(item, &["location", "city"]));
    job.remote_type = json_str(item, &["workplace_type"])
        .and_then(remote_type_from_keyword)
        .or_else(|| job.location.as_deref().and_then(remote_type_from_keyword));
    job.category = json_string(item, &["job", "department", "name"])
        .or_else(|| json_string(item, &["department", "name"]));
    job.description = json_str(item, &["description"]).and_then(html_to_text);
    job.seniority = seniority_from_title(&job.title);

    job.salary_min = json_f64(item, &["compensation_minimum"]);
    job.salary_max = json_f64(item, &["compensation_maximum"]);
    job.salary_currency = json_string(item, &["compensation_currency"]);

    if let Some(kind) = json_string(item, &["employment_type_text"])
        .or_else(|| json_string(item, &["employment_type"]))
    {
        job.tags.insert(kind);
    }

    job.posted_at = json_timestamp(item, &["published_at"])
        .or_else(|| json_timestamp(item, &["created_at"]));
    Some(job)
}
