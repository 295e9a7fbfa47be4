use jobsekr_core::{ParsedJob, RemoteType};
use serde_json::Value as JsonValue;
use url::Url;

use super::{path_slug, prefixed_path_slug};
use crate::normalize::{
    html_to_text, json_array, json_bool, json_f64, json_str, json_string, json_timestamp,
    listing_items, remote_type_from_keyword, seniority_from_title,
};
use crate::VendorParser;

#[derive(Debug, Clone, Copy, Default)]
pub struct Ashby;

impl VendorParser for Ashby {
    fn vendor(&self) -> &'static str {
        "ashby"
    }

    fn api_template(&self) -> &'static str {
        "https://api.ashbyhq.com/posting-api/job-board/{slug}?includeCompensation=true"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        path_slug(url, &["jobs.ashbyhq.com"], 0, &[]).or_else(|| {
            prefixed_path_slug(url, &["api.ashbyhq.com"], &["posting-api", "job-board"])
        })
    }

    fn parse_jobs(&self, raw: &JsonValue, _slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["jobs"]).iter().filter_map(parse_job).collect()
    }
}

fn parse_job(item: &JsonValue) -> Option<ParsedJob> {
    if json_bool(item, &["isListed"]) == Some(false) {
        return None;
    }
    let url = json_string(item, &["jobUrl"]).or_else(|| json_string(item, &["applyUrl"]))?;
    let title = json_string(item, &["title"])?;
    let mut job = ParsedJob::new(url, title, item.clone());

    job.location = json_string(item, &["location"]);
    job.category = json_string(item, &["department"]);
    job.remote_type = json_str(item, &["workplaceType"])
        .and_then(remote_type_from_keyword)
        .or_else(|| (json_bool(item, &["isRemote"]) == Some(true)).then_some(RemoteType::Remote));
    job.description = json_string(item, &["descriptionPlain"])
        .or_else(|| json_str(item, &["descriptionHtml"]).and_then(html_to_text));
    job.seniority = seniority_from_title(&job.title);

    // Compensation arrives as typed components; only the base salary maps onto the range.
    if let Some(salary) = json_array(item, &["compensation", "summaryComponents"])
        .iter()
        .find(|c| json_str(c, &["compensationType"]) == Some("Salary"))
    {
        job.salary_min = json_f64(salary, &["minValue"]);
        job.salary_max = json_f64(salary, &["maxValue"]);
        job.salary_currency = json_string(salary, &["currencyCode"]);
    }

    for key in ["team", "employmentType"] {
        if let Some(tag) = json_string(item, &[key]) {
            job.tags.insert(tag);
        }
    }

    job.posted_at = json_timestamp(item, &["publishedAt"]);
    Some(job)
}
