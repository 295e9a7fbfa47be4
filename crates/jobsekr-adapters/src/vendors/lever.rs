use jobsekr_core::ParsedJob;
use serde_json::Value as JsonValue;
use url::Url;

use super::{path_slug, prefixed_path_slug};
use crate::normalize::{
    html_to_text, json_f64, json_str, json_string, json_string_vec, json_timestamp,
    listing_items, remote_type_from_keyword, seniority_from_title,
};
use crate::VendorParser;

#[derive(Debug, Clone, Copy, Default)]
pub struct Lever;

impl VendorParser for Lever {
    fn vendor(&self) -> &'static str {
        "lever"
    }

    fn api_template(&self) -> &'static str {
        "https://api.lever.co/v0/postings/{slug}?mode=json"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        path_slug(url, &["jobs.lever.co", "jobs.eu.lever.co"], 0, &[])
            .or_else(|| prefixed_path_slug(url, &["api.lever.co", "api.eu.lever.co"], &["v0", "postings"]))
    }

    fn parse_jobs(&self, raw: &JsonValue, _slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &[]).iter().filter_map(parse_job).collect()
    }
}

fn parse_job(item: &JsonValue) -> Option<ParsedJob> {
    let url = json_string(item, &["hostedUrl"]).or_else(|| json_string(item, &["applyUrl"]))?;
    let title = json_string(item, &["text"])?;
    let mut job = ParsedJob::new(url, title, item.clone());

    job.location = json_string(item, &["categories", "location"]);
    job.category = json_string(item, &["categories", "team"])
        .or_else(|| json_string(item, &["categories", "department"]));
    job.remote_type = json_str(item, &["workplaceType"])
        .and_then(remote_type_from_keyword)
        .or_else(|| job.location.as_deref().and_then(remote_type_from_keyword));
    job.description = json_string(item, &["descriptionPlain"])
        .or_else(|| json_str(item, &["description"]).and_then(html_to_text));
    job.seniority = seniority_from_title(&job.title);

    job.salary_min = json_f64(item, &["salaryRange", "min"]);
    job.salary_max = json_f64(item, &["salaryRange", "max"]);
    job.salary_currency = json_string(item, &["salaryRange", "currency"]);

    if let Some(commitment) = json_string(item, &["categories", "commitment"]) {
        job.tags.insert(commitment);
    }
    job.tags.extend(json_string_vec(item, &["tags"]));

    job.posted_at = json_timestamp(item, &["createdAt"]);
    Some(job)
}
