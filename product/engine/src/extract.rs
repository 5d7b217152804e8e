use crate::config::SiteProfile;
use crate::normalize::normalize;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::OnceLock;

const IMG_ATTRS: &[&str] = &["src", "data-src", "data-original", "data-lazy", "data-image"];

const JSON_IMAGE_KEYS: &[&str] = &["image", "images", "thumbnailUrl", "contentUrl", "photo"];

const URL_REF_KEYS: &[&str] = &["url", "contentUrl", "src", "image", "images", "thumbnailUrl"];

static ABSOLUTE_IMAGE_RE: OnceLock<Regex> = OnceLock::new();

fn absolute_image_re() -> &'static Regex {
    ABSOLUTE_IMAGE_RE.get_or_init(|| {
        Regex::new(
            r#"(?i)https?://[^"'\s)]+?\.(?:jpg|jpeg|png|webp|gif|bmp)(?:\?[^"'\s)]*)?"#,
        )
        .expect("absolute image regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlRef {
    Single(String),
    Many(Vec<UrlRef>),
    Keyed(Vec<(String, UrlRef)>),
}

impl UrlRef {
    pub fn from_json(value: &Value) -> Option<UrlRef> {
        match value {
            Value::String(s) => Some(UrlRef::Single(s.clone())),
            Value::Array(items) => Some(UrlRef::Many(
                items.iter().filter_map(UrlRef::from_json).collect(),
            )),
            Value::Object(map) => Some(UrlRef::Keyed(
                map.iter()
                    .filter_map(|(k, v)| UrlRef::from_json(v).map(|r| (k.clone(), r)))
                    .collect(),
            )),
            _ => None,
        }
    }

    pub fn resolve(&self, base: &str, site: &SiteProfile, out: &mut Vec<String>) {
        match self {
            UrlRef::Single(raw) => {
                if let Some(normalized) = normalize(raw, base, site) {
                    out.push(normalized);
                }
            }
            UrlRef::Many(items) => {
                for item in items {
                    item.resolve(base, site, out);
                }
            }
            UrlRef::Keyed(entries) => {
                for key in URL_REF_KEYS {
                    if let Some((_, nested)) = entries.iter().find(|(k, _)| k == key) {
                        nested.resolve(base, site, out);
                    }
                }
            }
        }
    }
}

/// Collects every plausible photo URL referenced by `html`. The output is
/// unfiltered and may contain duplicates and junk.
pub fn extract(html: &str, base_url: &str, site: &SiteProfile) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut urls: Vec<String> = Vec::new();

    collect_meta_images(&document, base_url, site, &mut urls);
    collect_img_tags(&document, base_url, site, &mut urls);
    collect_script_json(&document, base_url, site, &mut urls);

    for m in absolute_image_re().find_iter(html) {
        UrlRef::Single(m.as_str().to_string()).resolve(base_url, site, &mut urls);
    }

    urls
}

fn collect_meta_images(document: &Html, base: &str, site: &SiteProfile, out: &mut Vec<String>) {
    let selector = Selector::parse("meta[content]").expect("meta selector");
    for meta in document.select(&selector) {
        let marker = meta
            .value()
            .attr("property")
            .filter(|v| !v.is_empty())
            .or_else(|| meta.value().attr("name"))
            .unwrap_or("")
            .to_ascii_lowercase();
        if !marker.contains("image") {
            continue;
        }
        if let Some(content) = meta.value().attr("content") {
            UrlRef::Single(content.to_string()).resolve(base, site, out);
        }
    }
}

fn collect_img_tags(document: &Html, base: &str, site: &SiteProfile, out: &mut Vec<String>) {
    let selector = Selector::parse("img").expect("img selector");
    for img in document.select(&selector) {
        for attr in IMG_ATTRS {
            if let Some(raw) = img.value().attr(attr) {
                UrlRef::Single(raw.to_string()).resolve(base, site, out);
            }
        }

        let srcset = img
            .value()
            .attr("srcset")
            .or_else(|| img.value().attr("data-srcset"));
        if let Some(srcset) = srcset {
            for part in srcset.split(',') {
                let Some(candidate) = part.split_whitespace().next() else {
                    continue;
                };
                UrlRef::Single(candidate.to_string()).resolve(base, site, out);
            }
        }
    }
}

fn collect_script_json(document: &Html, base: &str, site: &SiteProfile, out: &mut Vec<String>) {
    let selector = Selector::parse("script").expect("script selector");
    let scripts: Vec<(Option<String>, String)> = document
        .select(&selector)
        .map(|script| {
            let kind = script
                .value()
                .attr("type")
                .map(|t| t.trim().to_ascii_lowercase());
            (kind, script.text().collect::<String>())
        })
        .collect();

    // Structured data first, then embedded application state.
    for (kind, body) in &scripts {
        if kind.as_deref() != Some("application/ld+json") {
            continue;
        }
        if let Ok(data) = serde_json::from_str::<Value>(body.trim()) {
            walk_json(&data, base, site, out);
        }
    }

    for (kind, body) in &scripts {
        if !matches!(kind.as_deref(), None | Some("application/json")) {
            continue;
        }
        let text = body.trim();
        if !(text.starts_with('{') || text.starts_with('[')) {
            continue;
        }
        if let Ok(data) = serde_json::from_str::<Value>(text) {
            walk_json(&data, base, site, out);
        }
    }
}

pub fn walk_json(value: &Value, base: &str, site: &SiteProfile, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if JSON_IMAGE_KEYS.contains(&key.as_str()) {
                    if let Some(reference) = UrlRef::from_json(nested) {
                        reference.resolve(base, site, out);
                    }
                }
                walk_json(nested, base, site, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_json(item, base, site, out);
            }
        }
        Value::String(s) => {
            if s.starts_with("http") || s.starts_with('/') {
                UrlRef::Single(s.clone()).resolve(base, site, out);
            }
        }
        _ => {}
    }
}
