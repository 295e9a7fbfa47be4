use jobsekr_core::{ParsedJob, RemoteType};
use serde_json::Value as JsonValue;
use url::Url;

use super::subdomain_slug;
use crate::normalize::{
    extract_numbers, html_to_text, json_bool, json_str, json_string, json_timestamp,
    join_location, listing_items, remote_type_from_keyword, seniority_from_title,
};
use crate::VendorParser;

#[derive(Debug, Clone, Copy, Default)]
pub struct Breezy;

impl VendorParser for Breezy {
    fn vendor(&self) -> &'static str {
        "breezy"
    }

    fn api_template(&self) -> &'static str {
        "https://{slug}.breezy.hr/json"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        subdomain_slug(url, "breezy.hr", &["www", "app", "api", "help", "developer"])
    }

    fn parse_jobs(&self, raw: &JsonValue, _slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["positions"]).iter().filter_map(parse_job).collect()
    }
}

fn parse_job(item: &JsonValue) -> Option<ParsedJob> {
    let url = json_string(item, &["url"])?;
    let title = json_string(item, &["name"])?;
    let mut job = ParsedJob::new(url, title, item.clone());

    job.location = join_location(&[
        json_str(item, &["location", "city"]),
        json_str(item, &["location", "country", "name"]),
    ])
    .or_else(|| json_string(item, &["location", "name"]));
    job.remote_type = if json_bool(item, &["location", "is_remote"]) == Some(true) {
        Some(RemoteType::Remote)
    } else {
        json_str(item, &["location", "name"]).and_then(remote_type_from_keyword)
    };
    job.category = json_string(item, &["department"]);
    job.description = json_str(item, &["description"]).and_then(html_to_text);
    job.seniority = seniority_from_title(&job.title);

    // Salary is free text such as "$80,000 - $95,000".
    if let Some(salary) = json_str(item, &["salary"]) {
        let numbers = extract_numbers(salary);
        job.salary_min = numbers.first().copied();
        job.salary_max = numbers.get(1).copied().or(job.salary_min);
    }

    if let Some(kind) = json_string(item, &["type", "name"]) {
        job.tags.insert(kind);
    }

    job.posted_at = json_timestamp(item, &["published_date"]);
    Some(job)
}
