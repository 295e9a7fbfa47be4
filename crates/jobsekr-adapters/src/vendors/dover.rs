use jobsekr_core::ParsedJob;
use serde_json::Value as JsonValue;
use url::Url;

use super::prefixed_path_slug;
use crate::normalize::{
    html_to_text, json_array, json_str, json_string, json_timestamp, listing_items,
    remote_type_from_keyword, seniority_from_title,
};
use crate::VendorParser;

const HOSTS: &[&str] = &["app.dover.com", "app.dover.io"];

#[derive(Debug, Clone, Copy, Default)]
pub struct Dover;

impl VendorParser for Dover {
    fn vendor(&self) -> &'static str {
        "dover"
    }

    fn api_template(&self) -> &'static str {
        "https://app.dover.com/api/careers-page/{slug}/jobs"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        prefixed_path_slug(url, HOSTS, &["jobs"])
            .or_else(|| prefixed_path_slug(url, HOSTS, &["apply"]))
            .or_else(|| prefixed_path_slug(url, HOSTS, &["api", "careers-page"]))
    }

    fn parse_jobs(&self, raw: &JsonValue, slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["results", "jobs"])
            .iter()
            .filter_map(|item| parse_job(item, slug))
            .collect()
    }
}

fn parse_job(item: &JsonValue, slug: &str) -> Option<ParsedJob> {
    let id = json_string(item, &["id"])?;
    let title = json_string(item, &["title"])?;
    let url = json_string(item, &["url"])
        .unwrap_or_else(|| format!("https://app.dover.com/apply/{slug}/{id}"));
    let mut job = ParsedJob::new(url, title, item.clone());

    let locations = json_array(item, &["locations"]);
    job.location = locations
        .first()
        .and_then(|loc| json_string(loc, &["name"]))
        .or_else(|| json_string(item, &["location"]));
    job.remote_type = locations
        .first()
        .and_then(|loc| json_str(loc, &["location_type"]))
        .and_then(remote_type_from_keyword)
        .or_else(|| job.location.as_deref().and_then(remote_type_from_keyword));
    job.category = json_string(item, &["department"]);
    job.description = json_str(item, &["description"]).and_then(html_to_text);
    job.seniority = seniority_from_title(&job.title);
    job.posted_at = json_timestamp(item, &["created"]);
    Some(job)
}
