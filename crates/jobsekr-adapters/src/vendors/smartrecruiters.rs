use jobsekr_core::{ParsedJob, RemoteType};
use serde_json::Value as JsonValue;
use url::Url;

use super::{path_slug, prefixed_path_slug};
use crate::normalize::{
    json_bool, json_str, json_string, json_timestamp, join_location, listing_items,
    remote_type_from_keyword, seniority_from_title,
};
use crate::VendorParser;

#[derive(Debug, Clone, Copy, Default)]
pub struct SmartRecruiters;

impl VendorParser for SmartRecruiters {
    fn vendor(&self) -> &'static str {
        "smartrecruiters"
    }

    fn api_template(&self) -> &'static str {
        "https://api.smartrecruiters.com/v1/companies/{slug}/postings"
    }

    fn board_slug(&self, url: &Url) -> Option<String> {
        path_slug(url, &["jobs.smartrecruiters.com", "careers.smartrecruiters.com"], 0, &[])
            .or_else(|| prefixed_path_slug(url, &["api.smartrecruiters.com"], &["v1", "companies"]))
    }

    fn parse_jobs(&self, raw: &JsonValue, slug: &str) -> Vec<ParsedJob> {
        listing_items(raw, &["content"])
            .iter()
            .filter_map(|item| parse_job(item, slug))
            .collect()
    }
}

fn parse_job(item: &JsonValue, slug: &str) -> Option<ParsedJob> {
    let id = json_string(item, &["id"])?;
    let title = json_string(item, &["name"])?;
    // The listing endpoint carries no public URL; the company identifier keeps its casing.
    let company = json_string(item, &["company", "identifier"]).unwrap_or_else(|| slug.to_string());
    let url = format!("https://jobs.smartrecruiters.com/{company}/{id}");
    let mut job = ParsedJob::new(url, title, item.clone());

    job.location = json_string(item, &["location", "fullLocation"]).or_else(|| {
        join_location(&[
            json_str(item, &["location", "city"]),
            json_str(item, &["location", "region"]),
            json_str(item, &["location", "country"]),
        ])
    });
    job.remote_type = match (
        json_bool(item, &["location", "remote"]),
        json_bool(item, &["location", "hybrid"]),
    ) {
        (_, Some(true)) => Some(RemoteType::Hybrid),
        (Some(true), _) => Some(RemoteType::Remote),
        (Some(false), _) => Some(RemoteType::Onsite),
        _ => job.location.as_deref().and_then(remote_type_from_keyword),
    };
    job.category = json_string(item, &["department", "label"])
        .or_else(|| json_string(item, &["function", "label"]));
    job.seniority = json_str(item, &["experienceLevel", "id"])
        .and_then(experience_level)
        .or_else(|| seniority_from_title(&job.title));

    for path in [&["typeOfEmployment", "label"][..], &["function", "label"][..]] {
        if let Some(tag) = json_string(item, path) {
            job.tags.insert(tag);
        }
    }

    job.posted_at = json_timestamp(item, &["releasedDate"]);
    Some(job)
}

fn experience_level(id: &str) -> Option<String> {
    let level = match id {
        "internship" => "intern",
        "entry_level" | "associate" => "junior",
        "mid_senior_level" => "senior",
        "director" => "director",
        "executive" => "executive",
        _ => return None,
    };
    Some(level.to_string())
}
