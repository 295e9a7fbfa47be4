use jobsekr_core::ParsedJob;
use serde_json::Value as JsonValue;
use url::Url;

use super::{path_slug, prefixed_path_slug};
use crate::normalize::{
    json_str, json_string, json_timestamp, listing_items, remote_type_from_keyword,
    seniority_from_title,
};
use crate::VendorParser;

#[derive(Debug, Clone, Copy, Default)]
pub struct Rippling;

impl VendorParser for Rippling {
    fn vendor(&self) -> &'static str {
        "rippling"
    }

    fn api_template(&self) -> &'static str {
        "https://api.rippling.com/platform/api/ats/v1/board/{slug}/jobs"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        path_slug(url, &["ats.rippling.com"], 0, &["api", "embed"]).or_else(|| {
            prefixed_path_slug(
                url,
                &["api.rippling.com"],
                &["platform", "api", "ats", "v1", "board"],
            )
        })
    }

    fn parse_jobs(&self, raw: &JsonValue, slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["items", "results"])
            .iter()
            .filter_map(|item| parse_job(item, slug))
            .collect()
    }
}

fn parse_job(item: &JsonValue, slug: &str) -> Option<ParsedJob> {
    let title = json_string(item, &["name"]).or_else(|| json_string(item, &["title"]))?;
    let url = json_string(item, &["url"]).or_else(|| {
        json_string(item, &["uuid"]).map(|id| format!("https://ats.rippling.com/{slug}/jobs/{id}"))
    })?;
    let mut job = ParsedJob::new(url, title, item.clone());

    job.location = json_string(item, &["workLocation", "label"]);
    job.remote_type = job.location.as_deref().and_then(remote_type_from_keyword);
    job.category = json_string(item, &["department", "label"]);
    job.seniority = seniority_from_title(&job.title);
    if let Some(kind) = json_str(item, &["employmentType", "label"]) {
        job.tags.insert(kind.to_string());
    }
    job.posted_at = json_timestamp(item, &["createdOn"]);
    Some(job)
}
