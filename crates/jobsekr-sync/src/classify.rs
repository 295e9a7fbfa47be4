//! Career-link extraction and vendor classification for discovery.

use std::collections::HashMap;
use std::sync::LazyLock;

use jobsekr_adapters::VendorRegistry;
use jobsekr_core::UNKNOWN_ATS;
use regex::Regex;
use url::Url;

static MARKDOWN_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\]]+)\]\((https?://[^\s\)]+)\)").expect("markdown link pattern")
});

static NAME_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*_`~]").expect("markdown emphasis pattern"));

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug separator pattern"));

/// Hosts (and their subdomains) that never point at a career board.
const SKIP_HOSTS: &[&str] = &[
    "github.com",
    "en.wikipedia.org",
    "twitter.com",
    "x.com",
    "crunchbase.com",
    "techcrunch.com",
    "youtube.com",
    "medium.com",
    "arxiv.org",
];

const SKIP_HOST_PREFIXES: &[&str] = &["blog.", "docs."];

const SKIP_EXTENSIONS: &[&str] = &[".png", ".jpg", ".gif", ".svg", ".pdf"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Known { ats: String, slug: String },
    Unresolved,
    Skipped,
}

/// A company link found in a text source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: Option<String>,
    pub url: String,
    pub ats: String,
    pub slug: String,
    pub source: String,
}

impl Candidate {
    pub fn is_known(&self) -> bool {
        self.ats != UNKNOWN_ATS
    }
}

pub fn is_skip_url(url: &Url) -> bool {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let host_matches = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

    if SKIP_HOSTS.iter().any(|d| host_matches(*d)) {
        return true;
    }
    if host_matches("linkedin.com") && url.path().to_ascii_lowercase().starts_with("/company") {
        return true;
    }
    if SKIP_HOST_PREFIXES.iter().any(|p| host.starts_with(p)) {
        return true;
    }
    let path = url.path().to_ascii_lowercase();
    SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

pub fn classify_url(registry: &VendorRegistry, raw: &str) -> Classification {
    let Ok(url) = Url::parse(raw) else {
        return Classification::Skipped;
    };
    if is_skip_url(&url) {
        return Classification::Skipped;
    }
    registry
        .parsers()
        .find_map(|parser| {
            parser.board_slug(&url).map(|slug| Classification::Known {
                ats: parser.vendor().to_string(),
                slug,
            })
        })
        .unwrap_or(Classification::Unresolved)
}

/// Lowercase, runs of non-alphanumerics collapsed to `-`, trimmed.
pub fn slugify(name: &str) -> String {
    NON_SLUG
        .replace_all(&name.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

pub fn clean_name(raw: &str) -> Option<String> {
    let name = NAME_MARKUP.replace_all(raw.trim(), "").trim().to_string();
    let len = name.chars().count();
    (2..=100).contains(&len).then_some(name)
}

/// Every Markdown link in `text` that survives the denylist, classified.
pub fn extract_candidates(registry: &VendorRegistry, text: &str, source: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    for caps in MARKDOWN_LINK.captures_iter(text) {
        let url = caps[2].trim().to_string();
        let (ats, slug) = match classify_url(registry, &url) {
            Classification::Skipped => continue,
            Classification::Known { ats, slug } => (ats, slug),
            Classification::Unresolved => (UNKNOWN_ATS.to_string(), String::new()),
        };
        let Some(name) = clean_name(&caps[1]) else {
            continue;
        };
        let slug = if slug.is_empty() { slugify(&name) } else { slug };
        if slug.len() < 2 {
            continue;
        }
        out.push(Candidate {
            name: Some(name),
            url,
            ats,
            slug,
            source: source.to_string(),
        });
    }
    out
}

/// Collapse by `(ats, slug)`, keeping first-seen order and preferring entries with a name.
pub fn dedupe(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut out: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let key = (candidate.ats.clone(), candidate.slug.clone());
        match index.get(&key) {
            Some(&pos) => {
                let has_name = |c: &Candidate| c.name.as_deref().is_some_and(|n| !n.is_empty());
                if has_name(&candidate) && !has_name(&out[pos]) {
                    out[pos] = candidate;
                }
            }
            None => {
                index.insert(key, out.len());
                out.push(candidate);
            }
        }
    }
    out
}
