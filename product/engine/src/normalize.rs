use crate::config::SiteProfile;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif", ".bmp"];

static RESOLUTION_DIRECTIVE_RE: OnceLock<Regex> = OnceLock::new();

pub(crate) fn resolution_directive_re() -> &'static Regex {
    RESOLUTION_DIRECTIVE_RE
        .get_or_init(|| Regex::new(r"\$_(\d+)").expect("resolution directive regex"))
}

pub fn normalize(raw: &str, base: &str, site: &SiteProfile) -> Option<String> {
    let cleaned = raw.trim().replace("\\/", "/");
    if cleaned.is_empty() {
        return None;
    }

    let absolute = if let Some(rest) = cleaned.strip_prefix("//") {
        format!("https://{rest}")
    } else if cleaned.starts_with('/') {
        Url::parse(base).ok()?.join(&cleaned).ok()?.to_string()
    } else {
        cleaned
    };

    if !absolute.starts_with("http") {
        return None;
    }
    let parsed = Url::parse(&absolute).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }

    Some(upgrade_resolution(&absolute, site))
}

pub fn upgrade_resolution(url: &str, site: &SiteProfile) -> String {
    let Some(host) = host_of(url) else {
        return url.to_string();
    };
    if !site.is_cdn_host(&host) {
        return url.to_string();
    }
    let floor = u64::from(site.preferred_resolution);
    resolution_directive_re()
        .replace_all(url, |caps: &regex::Captures<'_>| match caps[1].parse::<u64>() {
            Ok(value) => format!("$_{}", value.max(floor)),
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}

pub fn resolution_directive(url: &str) -> Option<u64> {
    resolution_directive_re()
        .captures(url)
        .and_then(|caps| caps[1].parse::<u64>().ok())
}

pub fn normalize_input_url(raw: &str) -> String {
    let url = raw.trim();
    if url.is_empty() {
        return String::new();
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

pub fn listing_base(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    })
}

pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str().map(|v| v.to_ascii_lowercase())
}

pub fn has_image_extension(url: &str) -> bool {
    if url.to_ascii_lowercase().starts_with("data:") {
        return false;
    }
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = parsed.path().to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

pub fn redact_url_for_log(value: &str) -> String {
    match Url::parse(value) {
        Ok(uri) => {
            let scheme = uri.scheme();
            let authority = uri.host_str().unwrap_or("unknown-host");
            format!("{scheme}://{authority}/...")
        }
        Err(_) => "[invalid-url]".to_string(),
    }
}
