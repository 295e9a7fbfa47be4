use jobsekr_core::{ParsedJob, RemoteType};
use serde_json::Value as JsonValue;
use url::Url;

use super::subdomain_slug;
use crate::normalize::{
    html_to_text, json_bool, json_f64, json_str, json_string, json_string_vec, json_timestamp,
    join_location, listing_items, remote_type_from_keyword, seniority_from_title,
};
use crate::VendorParser;

#[derive(Debug, Clone, Copy, Default)]
pub struct Recruitee;

impl VendorParser for Recruitee {
    fn vendor(&self) -> &'static str {
        "recruitee"
    }

    fn api_template(&self) -> &'static str {
        "https://{slug}.recruitee.com/api/offers/"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        subdomain_slug(url, "recruitee.com", &["www", "app", "api", "support", "blog"])
    }

    fn parse_jobs(&self, raw: &JsonValue, _slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["offers"]).iter().filter_map(parse_job).collect()
    }
}

fn parse_job(item: &JsonValue) -> Option<ParsedJob> {
    let url = json_string(item, &["careers_url"])
        .or_else(|| json_string(item, &["careers_apply_url"]))?;
    let title = json_string(item, &["title"])?;
    let mut job = ParsedJob::new(url, title, item.clone());

    job.location = json_string(item, &["location"]).or_else(|| {
        join_location(&[json_str(item, &["city"]), json_str(item, &["country"])])
    });
    job.remote_type = if json_bool(item, &["hybrid"]) == Some(true) {
        Some(RemoteType::Hybrid)
    } else if json_bool(item, &["remote"]) == Some(true) {
        Some(RemoteType::Remote)
    } else if json_bool(item, &["on_site"]) == Some(true) {
        Some(RemoteType::Onsite)
    } else {
        job.location.as_deref().and_then(remote_type_from_keyword)
    };
    job.category = json_string(item, &["department"]);

    let body = [
        json_str(item, &["description"]).and_then(html_to_text),
        json_str(item, &["requirements"]).and_then(html_to_text),
    ]
    .into_iter()
    .flatten()
    .collect::<Vec<_>>();
    if !body.is_empty() {
        job.description = Some(body.join(" "));
    }
    job.seniority = json_str(item, &["experience_code"])
        .and_then(|code| seniority_from_title(&code.replace('_', " ")))
        .or_else(|| seniority_from_title(&job.title));

    job.salary_min = json_f64(item, &["salary", "min"]);
    job.salary_max = json_f64(item, &["salary", "max"]);
    job.salary_currency = json_string(item, &["salary", "currency"]);

    job.tags.extend(json_string_vec(item, &["tags"]));
    if let Some(kind) = json_string(item, &["employment_type_code"]) {
        job.tags.insert(kind);
    }

    job.posted_at = json_timestamp(item, &["published_at"])
        .or_else(|| json_timestamp(item, &["created_at"]));
    Some(job)
}
