use jobsekr_core::{ParsedJob, RemoteType};
use serde_json::Value as JsonValue;
use url::Url;

use super::{path_slug, subdomain_slug};
use crate::normalize::{
    html_to_text, json_array, json_bool, json_str, json_string, json_timestamp, join_location,
    listing_items, seniority_from_title,
};
use crate::VendorParser;

#[derive(Debug, Clone, Copy, Default)]
pub struct Workable;

impl VendorParser for Workable {
    fn vendor(&self) -> &'static str {
        "workable"
    }

    fn api_template(&self) -> &'static str {
        "https://apply.workable.com/api/v1/widget/accounts/{slug}?details=true"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        path_slug(url, &["apply.workable.com"], 0, &["api", "j"])
            .or_else(|| subdomain_slug(url, "workable.com", &["www", "apply", "jobs", "help", "resources"]))
    }

    fn parse_jobs(&self, raw: &JsonValue, _slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["jobs"]).iter().filter_map(parse_job).collect()
    }
}

fn parse_job(item: &JsonValue) -> Option<ParsedJob> {
    let url = json_string(item, &["url"])
        .or_else(|| json_string(item, &["shortlink"]))
        .or_else(|| json_string(item, &["application_url"]))?;
    let title = json_string(item, &["title"])?;
    let mut job = ParsedJob::new(url, title, item.clone());

    job.location = join_location(&[
        json_str(item, &["city"]),
        json_str(item, &["state"]),
        json_str(item, &["country"]),
    ])
    .or_else(|| {
        json_array(item, &["locations"]).first().and_then(|loc| {
            join_location(&[
                json_str(loc, &["city"]),
                json_str(loc, &["region"]),
                json_str(loc, &["country"]),
            ])
        })
    });
    job.remote_type = match json_bool(item, &["telecommuting"]) {
        Some(true) => Some(RemoteType::Remote),
        _ => None,
    };
    job.category = json_string(item, &["department"]);
    job.description = json_str(item, &["description"]).and_then(html_to_text);
    job.seniority = json_str(item, &["experience"])
        .and_then(seniority_from_title)
        .or_else(|| seniority_from_title(&job.title));

    if let Some(kind) = json_string(item, &["employment_type"]) {
        job.tags.insert(kind);
    }
    if let Some(function) = json_string(item, &["function"]) {
        job.tags.insert(function);
    }

    job.posted_at = json_timestamp(item, &["published_on"])
        .or_else(|| json_timestamp(item, &["created_at"]));
    Some(job)
}
