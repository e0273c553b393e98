//! Canonical identifiers for LinkedIn profile URLs.

use std::sync::LazyLock;

use regex::Regex;

static PROFILE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)linkedin\.com/in/([\w\-%.]+)(?:[/?]|$)").expect("valid profile id regex")
});

static PROFILE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)linkedin\.com/(?:in|pub)/[^/?#\s]+").expect("valid profile path regex")
});

/// Extract the lowercase profile slug from a `linkedin.com/in/<slug>` URL.
///
/// Returns `None` for anything that is not a profile URL; never fails.
pub fn extract_linkedin_id(url: &str) -> Option<String> {
    PROFILE_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

static PROFILE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)linkedin\.com/((?:in|pub)/[^?#\s]+)").expect("valid profile key regex")
});

/// Comparison key for any profile URL shape: the lowercased path after
/// `linkedin.com/`, without query, fragment or trailing slash.
///
/// `https://www.linkedin.com/pub/Jane-Doe/1/2/3/?trk=x` keys as
/// `pub/jane-doe/1/2/3`.
pub fn profile_url_key(url: &str) -> Option<String> {
    let path = PROFILE_KEY.captures(url)?.get(1)?.as_str().trim_end_matches('/');
    let (_, slug) = path.split_once('/')?;
    if slug.is_empty() || slug.starts_with('/') {
        return None;
    }
    Some(path.to_lowercase())
}

/// True when the URL has the `/in/` or `/pub/` profile path shape.
pub fn is_profile_url(url: &str) -> bool {
    PROFILE_PATH.is_match(url)
}
