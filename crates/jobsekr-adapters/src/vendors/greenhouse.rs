use jobsekr_core::ParsedJob;
use serde_json::Value as JsonValue;
use url::Url;

use super::{path_slug, prefixed_path_slug, query_slug};
use crate::normalize::{
    html_to_text, json_array, json_str, json_string, json_timestamp, listing_items,
    remote_type_from_keyword, seniority_from_title,
};
use crate::VendorParser;

const BOARD_HOSTS: &[&str] = &[
    "boards.greenhouse.io",
    "job-boards.greenhouse.io",
    "boards.eu.greenhouse.io",
    "job-boards.eu.greenhouse.io",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Greenhouse;

impl VendorParser for Greenhouse {
    fn vendor(&self) -> &'static str {
        "greenhouse"
    }

    fn api_template(&self) -> &'static str {
        "https://boards-api.greenhouse.io/v1/boards/{slug}/jobs?content=true"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        query_slug(url, BOARD_HOSTS, "for")
            .or_else(|| path_slug(url, BOARD_HOSTS, 0, &["embed"]))
            .or_else(|| prefixed_path_slug(url, &["boards-api.greenhouse.io"], &["v1", "boards"]))
    }

    fn parse_jobs(&self, raw: &JsonValue, _slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["jobs"]).iter().filter_map(parse_job).collect()
    }
}

fn parse_job(item: &JsonValue) -> Option<ParsedJob> {
    let url = json_string(item, &["absolute_url"])?;
    let title = json_string(item, &["title"])?;
    let mut job = ParsedJob::new(url, title, item.clone());

    job.location = json_string(item, &["location", "name"]);
    job.remote_type = job.location.as_deref().and_then(remote_type_from_keyword);
    job.description = json_str(item, &["content"]).and_then(html_to_text);
    job.seniority = seniority_from_title(&job.title);

    let departments = json_array(item, &["departments"])
        .iter()
        .filter_map(|d| json_string(d, &["name"]))
        .collect::<Vec<_>>();
    job.category = departments.first().cloned();
    job.tags.extend(departments);

    job.posted_at = json_timestamp(item, &["first_published"])
        .or_else(|| json_timestamp(item, &["updated_at"]));
    Some(job)
}
