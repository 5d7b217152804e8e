use crate::config::SiteProfile;
use crate::normalize::{has_image_extension, upgrade_resolution};
use std::collections::HashSet;
use url::Url;

const BLACKLIST_SUBSTRINGS: &[&str] = &[
    "sprite",
    "favicon",
    "icon",
    "logo",
    "tracking",
    "analytics",
    "placeholder",
    ".html",
    ".htm",
    "thumb",
    "thumbnail",
    "/76x76/",
    "/82x82/",
    "/134x134/",
    "avatar",
    "profile",
];

pub fn is_blacklisted(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    BLACKLIST_SUBSTRINGS.iter().any(|word| lower.contains(word))
}

pub fn is_known_image_endpoint(url: &str, site: &SiteProfile) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if parsed.host_str().is_some_and(|host| site.is_cdn_host(host)) {
        return true;
    }
    site.is_endpoint_path(parsed.path())
}

pub fn is_acceptable_image(url: &str, site: &SiteProfile) -> bool {
    if url.to_ascii_lowercase().starts_with("data:") {
        return false;
    }
    has_image_extension(url) || is_known_image_endpoint(url, site)
}

pub fn dedupe_in_order(items: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();
    for item in items {
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}

pub fn filter(urls: Vec<String>, site: &SiteProfile) -> Vec<String> {
    let urls = dedupe_in_order(urls);

    let mut kept: Vec<String> = urls
        .iter()
        .filter(|url| !is_blacklisted(url) && is_acceptable_image(url, site))
        .map(|url| upgrade_resolution(url, site))
        .collect();

    if kept.is_empty() {
        kept = urls
            .iter()
            .filter(|url| is_acceptable_image(url, site))
            .map(|url| upgrade_resolution(url, site))
            .collect();
    }

    dedupe_in_order(kept)
}
