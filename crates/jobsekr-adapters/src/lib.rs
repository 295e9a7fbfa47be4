//! Vendor parser contracts + the registry of built-in ATS parsers.

use std::collections::BTreeMap;

use jobsekr_core::ParsedJob;
use serde_json::Value as JsonValue;
use thiserror::Error;
use url::Url;

pub mod normalize;
pub mod vendors;

pub const CRATE_NAME: &str = "jobsekr-adapters";

/// Placeholder substituted with the company slug in API templates.
pub const SLUG_PLACEHOLDER: &str = "{slug}";

/// Keys under which vendors wrap their posting list.
const LISTING_KEYS: &[&str] = &["jobs", "results", "result", "content", "offers", "postings", "data"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no parser registered for vendor `{0}`")]
    UnknownVendor(String),
    #[error("api template for `{vendor}` lacks a {{slug}} placeholder: {template}")]
    InvalidTemplate { vendor: String, template: String },
}

/// One ATS vendor's response shape.
///
/// Parsing is pure: no I/O, no panics on odd input. Postings missing a url or
/// title are dropped; a response of the wrong shape yields an empty list.
pub trait VendorParser: Send + Sync {
    fn vendor(&self) -> &'static str;

    /// Listing endpoint with a `{slug}` placeholder.
    fn api_template(&self) -> &'static str;

    /// Account slug if `url` is one of this vendor's career-board URLs.
    fn board_slug(&self, url: &Url) -> Option<String>;

    fn parse_jobs(&self, raw: &JsonValue, slug: &str) -> Vec<ParsedJob>;

    /// Number of listings in a raw response, used as the discovery match signal.
    fn count_listings(&self, raw: &JsonValue) -> usize {
        count_listings(raw)
    }
}

pub fn count_listings(raw: &JsonValue) -> usize {
    normalize::listing_items(raw, LISTING_KEYS).len()
}

pub struct VendorRegistry {
    parsers: BTreeMap<&'static str, Box<dyn VendorParser>>,
    api_templates: BTreeMap<String, String>,
}

impl std::fmt::Debug for VendorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorRegistry")
            .field("vendors", &self.parsers.keys().collect::<Vec<_>>())
            .field("api_template_overrides", &self.api_templates)
            .finish()
    }
}

impl Default for VendorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl VendorRegistry {
    pub fn empty() -> Self {
        Self {
            parsers: BTreeMap::new(),
            api_templates: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for parser in vendors::all() {
            registry.register(parser);
        }
        registry
    }

    /// Add or replace the parser for `parser.vendor()`.
    pub fn register(&mut self, parser: Box<dyn VendorParser>) {
        self.parsers.insert(parser.vendor(), parser);
    }

    /// Point a vendor at a different listing endpoint.
    pub fn with_api_template(
        mut self,
        vendor: &str,
        template: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        let template = template.into();
        self.get(vendor)?;
        if !template.contains(SLUG_PLACEHOLDER) {
            return Err(RegistryError::InvalidTemplate {
                vendor: vendor.to_string(),
                template,
            });
        }
        self.api_templates.insert(vendor.to_string(), template);
        Ok(self)
    }

    pub fn get(&self, vendor: &str) -> Result<&dyn VendorParser, RegistryError> {
        self.parsers
            .get(vendor)
            .map(|p| p.as_ref())
            .ok_or_else(|| RegistryError::UnknownVendor(vendor.to_string()))
    }

    pub fn contains(&self, vendor: &str) -> bool {
        self.parsers.contains_key(vendor)
    }

    pub fn vendors(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.parsers.keys().copied()
    }

    pub fn parsers(&self) -> impl Iterator<Item = &dyn VendorParser> + '_ {
        self.parsers.values().map(|p| p.as_ref())
    }

    pub fn api_url(&self, vendor: &str, slug: &str) -> Result<String, RegistryError> {
        let parser = self.get(vendor)?;
        let template = self
            .api_templates
            .get(vendor)
            .map(String::as_str)
            .unwrap_or_else(|| parser.api_template());
        Ok(template.replace(SLUG_PLACEHOLDER, slug))
    }
}

pub fn parser_for_vendor(vendor: &str) -> Option<Box<dyn VendorParser>> {
    vendors::all().into_iter().find(|p| p.vendor() == vendor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobsekr_core::RemoteType;
    use serde_json::json;
    use std::fs;
    use std::path::{Path, PathBuf};

    fn workspace_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .canonicalize()
            .expect("workspace root")
    }

    fn fixture(vendor: &str) -> JsonValue {
        let path = workspace_root()
            .join("fixtures")
            .join(vendor)
            .join("listing.json");
        let text = fs::read_to_string(&path).expect("read fixture");
        serde_json::from_str(&text).expect("parse fixture")
    }

    fn parse_fixture(vendor: &str, slug: &str) -> Vec<ParsedJob> {
        let registry = VendorRegistry::builtin();
        registry
            .get(vendor)
            .expect("registered")
            .parse_jobs(&fixture(vendor), slug)
    }

    #[test]
    fn builtin_registry_covers_every_vendor() {
        let registry = VendorRegistry::builtin();
        let vendors = registry.vendors().collect::<Vec<_>>();
        assert_eq!(vendors.len(), 14);
        for vendor in [
            "greenhouse",
            "lever",
            "ashby",
            "workable",
            "smartrecruiters",
            "recruitee",
            "dover",
            "breezy",
            "bamboohr",
            "teamtailor",
            "pinpoint",
            "rippling",
            "personio",
            "freshteam",
        ] {
            assert!(registry.contains(vendor), "{vendor} missing");
            let template = registry.get(vendor).unwrap().api_template();
            assert!(template.contains(SLUG_PLACEHOLDER), "{vendor} template");
        }
    }

    #[test]
    fn unknown_vendor_is_a_configuration_error() {
        let registry = VendorRegistry::builtin();
        assert_eq!(
            registry.get("taleo").err(),
            Some(RegistryError::UnknownVendor("taleo".into()))
        );
        assert!(registry.api_url("taleo", "acme").is_err());
        assert!(parser_for_vendor("taleo").is_none());
    }

    #[test]
    fn api_template_overrides_apply_per_vendor() {
        let registry = VendorRegistry::builtin()
            .with_api_template("lever", "http://127.0.0.1:9000/lever/{slug}")
            .unwrap();
        assert_eq!(
            registry.api_url("lever", "foo").unwrap(),
            "http://127.0.0.1:9000/lever/foo"
        );
        assert_eq!(
            registry.api_url("greenhouse", "foo").unwrap(),
            "https://boards-api.greenhouse.io/v1/boards/foo/jobs?content=true"
        );
        assert!(matches!(
            VendorRegistry::builtin().with_api_template("lever", "http://x/lever"),
            Err(RegistryError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn count_listings_finds_wrapped_arrays() {
        assert_eq!(count_listings(&json!([{}, {}, {}])), 3);
        assert_eq!(count_listings(&json!({"jobs": [{}]})), 1);
        assert_eq!(count_listings(&json!({"content": [], "totalFound": 0})), 0);
        assert_eq!(count_listings(&json!({"offers": [{}, {}]})), 2);
        assert_eq!(count_listings(&json!({"message": "not found"})), 0);
        assert_eq!(count_listings(&json!("nope")), 0);
    }

    #[test]
    fn greenhouse_bare_array_yields_one_posting() {
        let raw = json!([{"id": 1, "title": "Engineer", "absolute_url": "https://boards.greenhouse.io/acme/jobs/1"}]);
        let parser = parser_for_vendor("greenhouse").unwrap();
        let jobs = parser.parse_jobs(&raw, "acme");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url, "https://boards.greenhouse.io/acme/jobs/1");
        assert_eq!(jobs[0].title, "Engineer");
        assert_eq!(parser.vendor(), "greenhouse");
    }

    #[test]
    fn every_parser_returns_empty_on_shape_mismatch() {
        let registry = VendorRegistry::builtin();
        for parser in registry.parsers() {
            for raw in [json!(null), json!("text"), json!({"unexpected": true}), json!(42)] {
                assert!(
                    parser.parse_jobs(&raw, "acme").is_empty(),
                    "{} parsed garbage",
                    parser.vendor()
                );
            }
        }
    }

    #[test]
    fn greenhouse_fixture() {
        let jobs = parse_fixture("greenhouse", "acme");
        assert_eq!(jobs.len(), 2, "posting without absolute_url is dropped");
        let first = &jobs[0];
        assert_eq!(first.url, "https://boards.greenhouse.io/acme/jobs/4012345");
        assert_eq!(first.title, "Senior Backend Engineer");
        assert_eq!(first.location.as_deref(), Some("Remote - US"));
        assert_eq!(first.remote_type, Some(RemoteType::Remote));
        assert_eq!(first.category.as_deref(), Some("Engineering"));
        assert_eq!(first.seniority.as_deref(), Some("senior"));
        assert_eq!(
            first.description.as_deref(),
            Some("Build our payments platform. Rust Postgres")
        );
        assert!(first.posted_at.is_some());
        assert_eq!(first.raw_data["id"], json!(4012345));
        assert_eq!(jobs[1].title, "Product Designer");
    }

    #[test]
    fn lever_fixture() {
        let jobs = parse_fixture("lever", "foo");
        assert_eq!(jobs.len(), 2);
        let first = &jobs[0];
        assert_eq!(first.url, "https://jobs.lever.co/foo/0b1f-1");
        assert_eq!(first.title, "Staff Data Engineer");
        assert_eq!(first.location.as_deref(), Some("Berlin"));
        assert_eq!(first.remote_type, Some(RemoteType::Hybrid));
        assert_eq!(first.category.as_deref(), Some("Data"));
        assert_eq!(first.salary_min, Some(90000.0));
        assert_eq!(first.salary_max, Some(120000.0));
        assert_eq!(first.salary_currency.as_deref(), Some("EUR"));
        assert!(first.tags.contains("Full-time"));
        assert!(first.tags.contains("python"));
        assert_eq!(first.description.as_deref(), Some("Own the data platform."));
        assert_eq!(
            first.posted_at.map(|t| t.timestamp_millis()),
            Some(1709634600000)
        );
        assert_eq!(jobs[1].description.as_deref(), Some("Talk to customers."));
    }

    #[test]
    fn ashby_fixture() {
        let jobs = parse_fixture("ashby", "bar");
        assert_eq!(jobs.len(), 1, "unlisted posting is skipped");
        let job = &jobs[0];
        assert_eq!(job.url, "https://jobs.ashbyhq.com/bar/5d1c");
        assert_eq!(job.remote_type, Some(RemoteType::Remote));
        assert_eq!(job.category.as_deref(), Some("Engineering"));
        assert_eq!(job.salary_min, Some(150000.0));
        assert_eq!(job.salary_max, Some(190000.0));
        assert_eq!(job.salary_currency.as_deref(), Some("USD"));
        assert!(job.tags.contains("FullTime"));
        assert_eq!(job.description.as_deref(), Some("Ship the compiler."));
    }

    #[test]
    fn workable_fixture() {
        let jobs = parse_fixture("workable", "baz");
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.url, "https://apply.workable.com/j/AB12CD34");
        assert_eq!(job.location.as_deref(), Some("Lisbon, Lisbon, Portugal"));
        assert_eq!(job.remote_type, Some(RemoteType::Remote));
        assert_eq!(job.category.as_deref(), Some("Support"));
        assert!(job.tags.contains("Full-time"));
        assert_eq!(job.seniority.as_deref(), Some("junior"));
    }

    #[test]
    fn smartrecruiters_fixture() {
        let jobs = parse_fixture("smartrecruiters", "qux");
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.url, "https://jobs.smartrecruiters.com/Qux1/743999");
        assert_eq!(job.title, "Account Executive");
        assert_eq!(job.location.as_deref(), Some("Austin, TX, us"));
        assert_eq!(job.remote_type, Some(RemoteType::Onsite));
        assert_eq!(job.category.as_deref(), Some("Sales"));
        assert_eq!(job.seniority.as_deref(), Some("senior"));
    }

    #[test]
    fn recruitee_fixture() {
        let jobs = parse_fixture("recruitee", "quux");
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.url, "https://quux.recruitee.com/o/devops-engineer");
        assert_eq!(job.remote_type, Some(RemoteType::Hybrid));
        assert_eq!(job.salary_min, Some(60000.0));
        assert_eq!(job.salary_max, Some(75000.0));
        assert_eq!(job.salary_currency.as_deref(), Some("EUR"));
        assert!(job.tags.contains("kubernetes"));
        assert_eq!(
            job.description.as_deref(),
            Some("Keep things running. Terraform experience")
        );
    }

    #[test]
    fn dover_fixture() {
        let jobs = parse_fixture("dover", "corge");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url, "https://app.dover.com/apply/corge/9f3e");
        assert_eq!(jobs[0].location.as_deref(), Some("New York, NY"));
        assert_eq!(jobs[0].remote_type, Some(RemoteType::Hybrid));
    }

    #[test]
    fn breezy_fixture() {
        let jobs = parse_fixture("breezy", "grault");
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.url, "https://grault.breezy.hr/p/abc123-qa-engineer");
        assert_eq!(job.location.as_deref(), Some("Toronto, Canada"));
        assert_eq!(job.remote_type, Some(RemoteType::Remote));
        assert_eq!(job.salary_min, Some(80000.0));
        assert_eq!(job.salary_max, Some(95000.0));
        assert!(job.tags.contains("Full-Time"));
    }

    #[test]
    fn bamboohr_fixture() {
        let jobs = parse_fixture("bamboohr", "garply");
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].url, "https://garply.bamboohr.com/careers/17");
        assert_eq!(jobs[0].title, "Office Manager");
        assert_eq!(jobs[0].location.as_deref(), Some("Denver, Colorado"));
        assert_eq!(jobs[0].remote_type, None);
        assert_eq!(jobs[0].category.as_deref(), Some("Operations"));
        assert_eq!(jobs[1].remote_type, Some(RemoteType::Remote));
    }

    #[test]
    fn teamtailor_fixture() {
        let jobs = parse_fixture("teamtailor", "waldo");
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.url, "https://waldo.teamtailor.com/jobs/301-frontend-developer");
        assert_eq!(job.remote_type, Some(RemoteType::Remote));
        assert_eq!(job.description.as_deref(), Some("React and TypeScript."));
        assert!(job.tags.contains("frontend"));
    }

    #[test]
    fn pinpoint_fixture() {
        let jobs = parse_fixture("pinpoint", "fred");
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.url, "https://fred.pinpointhq.com/en/postings/88");
        assert_eq!(job.location.as_deref(), Some("Manchester"));
        assert_eq!(job.remote_type, Some(RemoteType::Onsite));
        assert_eq!(job.salary_min, Some(40000.0));
        assert_eq!(job.salary_currency.as_deref(), Some("GBP"));
        assert_eq!(job.category.as_deref(), Some("Finance"));
    }

    #[test]
    fn rippling_fixture() {
        let jobs = parse_fixture("rippling", "plugh");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].url, "https://ats.rippling.com/plugh/jobs/6a7b");
        assert_eq!(jobs[0].location.as_deref(), Some("Remote (United States)"));
        assert_eq!(jobs[0].remote_type, Some(RemoteType::Remote));
        assert_eq!(jobs[0].category.as_deref(), Some("Engineering"));
    }

    #[test]
    fn personio_fixture() {
        let jobs = parse_fixture("personio", "xyzzy");
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.url, "https://xyzzy.jobs.personio.de/job/1200");
        assert_eq!(job.location.as_deref(), Some("Munich"));
        assert_eq!(job.seniority.as_deref(), Some("mid"));
        assert!(job.tags.contains("permanent"));
        assert!(job.tags.contains("go"));
    }

    #[test]
    fn freshteam_fixture() {
        let jobs = parse_fixture("freshteam", "thud");
        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.url, "https://thud.freshteam.com/jobs/55");
        assert_eq!(job.location.as_deref(), Some("Chennai, IN"));
        assert_eq!(job.category.as_deref(), Some("Engineering"));
        assert_eq!(job.remote_type, None);
        assert_eq!(job.description.as_deref(), Some("Write Go services."));
    }

    #[test]
    fn board_urls_resolve_to_their_vendor() {
        let registry = VendorRegistry::builtin();
        let cases = [
            ("https://boards.greenhouse.io/Acme/jobs/123", "greenhouse", "acme"),
            ("https://job-boards.greenhouse.io/acme", "greenhouse", "acme"),
            ("https://boards.greenhouse.io/embed/job_board?for=acme", "greenhouse", "acme"),
            ("https://jobs.lever.co/foo/0b1f-1", "lever", "foo"),
            ("https://jobs.ashbyhq.com/bar", "ashby", "bar"),
            ("https://apply.workable.com/baz/", "workable", "baz"),
            ("https://jobs.smartrecruiters.com/Qux1", "smartrecruiters", "qux1"),
            ("https://quux.recruitee.com/", "recruitee", "quux"),
            ("https://app.dover.com/jobs/corge", "dover", "corge"),
            ("https://grault.breezy.hr", "breezy", "grault"),
            ("https://garply.bamboohr.com/careers", "bamboohr", "garply"),
            ("https://waldo.teamtailor.com/jobs", "teamtailor", "waldo"),
            ("https://fred.pinpointhq.com", "pinpoint", "fred"),
            ("https://ats.rippling.com/plugh/jobs", "rippling", "plugh"),
            ("https://xyzzy.jobs.personio.de/", "personio", "xyzzy"),
            ("https://thud.freshteam.com/jobs", "freshteam", "thud"),
        ];
        for (raw, vendor, slug) in cases {
            let url = Url::parse(raw).unwrap();
            let hits = registry
                .parsers()
                .filter_map(|p| p.board_slug(&url).map(|s| (p.vendor(), s)))
                .collect::<Vec<_>>();
            assert_eq!(hits, vec![(vendor, slug.to_string())], "{raw}");
        }
    }

    #[test]
    fn vendor_marketing_pages_are_not_boards() {
        let registry = VendorRegistry::builtin();
        for raw in [
            "https://www.greenhouse.io/pricing",
            "https://www.lever.co/",
            "https://www.workable.com/features",
            "https://app.dover.com/",
            "https://www.bamboohr.com/",
            "https://acme.com/careers",
        ] {
            let url = Url::parse(raw).unwrap();
            assert!(
                registry.parsers().all(|p| p.board_slug(&url).is_none()),
                "{raw}"
            );
        }
    }
}
