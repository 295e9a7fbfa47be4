use jobsekr_core::{ParsedJob, RemoteType};
use serde_json::Value as JsonValue;
use url::Url;

use super::subdomain_slug;
use crate::normalize::{
    json_bool, json_str, json_string, json_timestamp, join_location, listing_items,
    seniority_from_title,
};
use crate::VendorParser;

#[derive(Debug, Clone, Copy, Default)]
pub struct BambooHr;

impl VendorParser for BambooHr {
    fn vendor(&self) -> &'static str {
        "bamboohr"
    }

    fn api_template(&self) -> &'static str {
        "https://{slug}.bamboohr.com/careers/list"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        subdomain_slug(url, "bamboohr.com", &["www", "api", "app", "help", "partners", "marketplace"])
    }

    fn parse_jobs(&self, raw: &JsonValue, slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["result"])
            .iter()
            .filter_map(|item| parse_job(item, slug))
            .collect()
    }
}

fn parse_job(item: &JsonValue, slug: &str) -> Option<ParsedJob> {
    let id = json_string(item, &["id"])?;
    let title = json_string(item, &["jobOpeningName"])?;
    let url = format!("https://{slug}.bamboohr.com/careers/{id}");
    let mut job = ParsedJob::new(url, title, item.clone());

    job.location = join_location(&[
        json_str(item, &["location", "city"]),
        json_str(item, &["location", "state"]),
    ])
    .or_else(|| {
        join_location(&[
            json_str(item, &["atsLocation", "city"]),
            json_str(item, &["atsLocation", "state"]),
            json_str(item, &["atsLocation", "country"]),
        ])
    });
    job.remote_type = if json_bool(item, &["isRemote"]) == Some(true) {
        Some(RemoteType::Remote)
    } else {
        // "0" on-site, "1" remote, "2" hybrid; on-site is also the default so it stays unknown.
        match json_string(item, &["locationType"]).as_deref() {
            Some("1") => Some(RemoteType::Remote),
            Some("2") => Some(RemoteType::Hybrid),
            _ => None,
        }
    };
    job.category = json_string(item, &["departmentLabel"]);
    job.seniority = seniority_from_title(&job.title);

    if let Some(status) = json_string(item, &["employmentStatusLabel"]) {
        job.tags.insert(status);
    }

    job.posted_at = json_timestamp(item, &["datePosted"]);
    Some(job)
}
