//! Built-in ATS vendor parsers, one module per vendor.

use url::Url;

use crate::VendorParser;

mod ashby;
mod bamboohr;
mod breezy;
mod dover;
mod freshteam;
mod greenhouse;
mod lever;
mod personio;
mod pinpoint;
mod recruitee;
mod rippling;
mod smartrecruiters;
mod teamtailor;
mod workable;

pub use ashby::Ashby;
pub use bamboohr::BambooHr;
pub use breezy::Breezy;
pub use dover::Dover;
pub use freshteam::Freshteam;
pub use greenhouse::Greenhouse;
pub use lever::Lever;
pub use personio::Personio;
pub use pinpoint::Pinpoint;
pub use recruitee::Recruitee;
pub use rippling::Rippling;
pub use smartrecruiters::SmartRecruiters;
pub use teamtailor::Teamtailor;
pub use workable::Workable;

pub fn all() -> Vec<Box<dyn VendorParser>> {
    vec![
        Box::new(Greenhouse),
        Box::new(Lever),
        Box::new(Ashby),
        Box::new(Workable),
        Box::new(SmartRecruiters),
        Box::new(Recruitee),
        Box::new(Dover),
        Box::new(Breezy),
        Box::new(BambooHr),
        Box::new(Teamtailor),
        Box::new(Pinpoint),
        Box::new(Rippling),
        Box::new(Personio),
        Box::new(Freshteam),
    ]
}

fn clean_slug(raw: &str) -> Option<String> {
    let slug = raw.trim().to_ascii_lowercase();
    if slug.is_empty()
        || !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return None;
    }
    Some(slug)
}

fn host_is(url: &Url, hosts: &[&str]) -> bool {
    url.host_str()
        .map(|h| hosts.iter().any(|candidate| h.eq_ignore_ascii_case(candidate)))
        .unwrap_or(false)
}

fn path_segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// Slug at path position `index` on one of `hosts`, e.g. `jobs.lever.co/{slug}`.
pub(crate) fn path_slug(url: &Url, hosts: &[&str], index: usize, reserved: &[&str]) -> Option<String> {
    if !host_is(url, hosts) {
        return None;
    }
    let segment = *path_segments(url).get(index)?;
    if reserved.iter().any(|r| segment.eq_ignore_ascii_case(r)) {
        return None;
    }
    clean_slug(segment)
}

/// Path position `index` must equal `prefix` for the slug at `index + 1` to count,
/// e.g. `api.lever.co/v0/postings/{slug}`.
pub(crate) fn prefixed_path_slug(url: &Url, hosts: &[&str], prefix: &[&str]) -> Option<String> {
    if !host_is(url, hosts) {
        return None;
    }
    let segments = path_segments(url);
    if segments.len() <= prefix.len()
        || !segments
            .iter()
            .zip(prefix)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    {
        return None;
    }
    clean_slug(segments[prefix.len()])
}

/// Slug as the leftmost label of `{slug}.{suffix}`.
pub(crate) fn subdomain_slug(url: &Url, suffix: &str, reserved: &[&str]) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    let label = host.strip_suffix(suffix)?.strip_suffix('.')?;
    if label.contains('.') || reserved.contains(&label) {
        return None;
    }
    clean_slug(label)
}

pub(crate) fn query_slug(url: &Url, hosts: &[&str], key: &str) -> Option<String> {
    if !host_is(url, hosts) {
        return None;
    }
    url.query_pairs()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| clean_slug(&v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdomain_slug_rejects_reserved_and_nested_labels() {
        let u = |s: &str| Url::parse(s).unwrap();
        assert_eq!(subdomain_slug(&u("https://acme.breezy.hr"), "breezy.hr", &["www"]).as_deref(), Some("acme"));
        assert_eq!(subdomain_slug(&u("https://www.breezy.hr"), "breezy.hr", &["www"]), None);
        assert_eq!(subdomain_slug(&u("https://a.b.breezy.hr"), "breezy.hr", &[]), None);
        assert_eq!(subdomain_slug(&u("https://breezy.hr"), "breezy.hr", &[]), None);
        assert_eq!(subdomain_slug(&u("https://notbreezy.hr"), "breezy.hr", &[]), None);
    }

    #[test]
    fn path_slugs_skip_reserved_segments() {
        let u = Url::parse("https://boards.greenhouse.io/embed/job_board?for=acme").unwrap();
        assert_eq!(path_slug(&u, &["boards.greenhouse.io"], 0, &["embed"]), None);
        assert_eq!(query_slug(&u, &["boards.greenhouse.io"], "for").as_deref(), Some("acme"));
        let api = Url::parse("https://api.lever.co/v0/postings/foo?mode=json").unwrap();
        assert_eq!(prefixed_path_slug(&api, &["api.lever.co"], &["v0", "postings"]).as_deref(), Some("foo"));
    }
}
