use jobsekr_core::{ParsedJob, RemoteType};
use serde_json::Value as JsonValue;
use url::Url;

use super::subdomain_slug;
use crate::normalize::{
    html_to_text, json_array, json_bool, json_str, json_string, json_timestamp, join_location,
    listing_items, seniority_from_title,
};
use crate::VendorParser;

#[derive(Debug, Clone, Copy, Default)]
pub struct Freshteam;

impl VendorParser for Freshteam {
    fn vendor(&self) -> &'static str {
        "freshteam"
    }

    fn api_template(&self) -> &'static str {
        "https://{slug}.freshteam.com/hire/widgets/jobs.json"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        subdomain_slug(url, "freshteam.com", &["www", "api", "support", "assets"])
    }

    fn parse_jobs(&self, raw: &JsonValue, slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["jobs"])
            .iter()
            .filter_map(|item| parse_job(raw, item, slug))
            .collect()
    }
}

/// Entry of a side table such as `branches` whose `id` matches `id`.
fn lookup<'a>(raw: &'a JsonValue, table: &str, id: Option<String>) -> Option<&'a JsonValue> {
    let id = id?;
    json_array(raw, &[table])
        .iter()
        .find(|entry| json_string(entry, &["id"]).as_deref() == Some(id.as_str()))
}

fn parse_job(raw: &JsonValue, item: &JsonValue, slug: &str) -> Option<ParsedJob> {
    let id = json_string(item, &["id"])?;
    let title = json_string(item, &["title"])?;
    let url = format!("https://{slug}.freshteam.com/jobs/{id}");
    let mut job = ParsedJob::new(url, title, item.clone());

    job.location = lookup(raw, "branches", json_string(item, &["branch_id"])).and_then(|branch| {
        join_location(&[json_str(branch, &["city"]), json_str(branch, &["country_code"])])
    });
    job.remote_type = match json_bool(item, &["remote"]) {
        Some(true) => Some(RemoteType::Remote),
        _ => None,
    };
    job.category = lookup(raw, "job_roles", json_string(item, &["job_role_id"]))
        .or_else(|| lookup(raw, "departments", json_string(item, &["department_id"])))
        .and_then(|entry| json_string(entry, &["name"]));
    job.description = json_str(item, &["description"]).and_then(html_to_text);
    job.seniority = seniority_from_title(&job.title);

    if let Some(kind) = json_string(item, &["job_type"]) {
        job.tags.insert(kind);
    }

    job.posted_at = json_timestamp(item, &["created_at"]);
    Some(job)
}
