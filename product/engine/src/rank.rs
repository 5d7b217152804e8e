use crate::classify::dedupe_in_order;
use crate::config::SiteProfile;
use crate::normalize::{host_of, resolution_directive};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;
use url::Url;

const QUALITY_KEYWORDS: &[&str] = &["large", "original", "full", "xl", "xxl"];
const LOW_QUALITY_KEYWORDS: &[&str] = &["thumb", "small", "tiny", "icon"];

const KEYWORD_WEIGHT: i64 = 1_000_000;
const HIGH_RES_HOST_BONUS: i64 = 500_000;
const CDN_HOST_BONUS: i64 = 400_000;
const DIRECTIVE_WEIGHT: i64 = 1_000;

static SIZE_SEGMENT_RE: OnceLock<Regex> = OnceLock::new();
static SIZE_SUFFIX_RE: OnceLock<Regex> = OnceLock::new();

fn size_segment_re() -> &'static Regex {
    SIZE_SEGMENT_RE.get_or_init(|| Regex::new(r"/\d+x\d+/").expect("size segment regex"))
}

fn size_suffix_re() -> &'static Regex {
    SIZE_SUFFIX_RE.get_or_init(|| {
        Regex::new(
            r"(?i)[_-](?:thumbnail|thumb|small|medium|large|xxl|xl|\d+x\d+)(\.(?:jpg|jpeg|png|webp|gif|bmp))$",
        )
        .expect("size suffix regex")
    })
}

pub fn pattern_key(url: &str) -> String {
    let mut path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };

    loop {
        let next = size_segment_re().replace_all(&path, "/").into_owned();
        let next = size_suffix_re().replace(&next, "${1}").into_owned();
        if next == path {
            return path;
        }
        path = next;
    }
}

fn last_dimensions(url: &str) -> Option<(i64, i64)> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => url.to_ascii_lowercase(),
    };
    path.split(|ch| matches!(ch, '/' | '_' | '-' | '.'))
        .filter_map(|token| {
            let (w, h) = token.split_once('x')?;
            if w.is_empty() || h.is_empty() {
                return None;
            }
            if !w.chars().all(|c| c.is_ascii_digit()) || !h.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            Some((w.parse::<i64>().ok()?, h.parse::<i64>().ok()?))
        })
        .last()
}

pub fn score(url: &str, site: &SiteProfile) -> i64 {
    let lower = url.to_ascii_lowercase();
    let mut score = 0_i64;

    if let Some((w, h)) = last_dimensions(url) {
        score = score.saturating_add(w.saturating_mul(h));
    }
    if QUALITY_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        score = score.saturating_add(KEYWORD_WEIGHT);
    }
    if LOW_QUALITY_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        score = score.saturating_sub(KEYWORD_WEIGHT);
    }

    if let Some(host) = host_of(url) {
        if site.third_party_bonus && site.is_high_res_host(&host) {
            score = score.saturating_add(HIGH_RES_HOST_BONUS);
        }
        if site.is_cdn_host(&host) {
            score = score.saturating_add(CDN_HOST_BONUS);
        }
    }

    if let Some(directive) = resolution_directive(&lower) {
        let directive = i64::try_from(directive).unwrap_or(i64::MAX);
        score = score.saturating_add(directive.saturating_mul(DIRECTIVE_WEIGHT));
    }

    score
}

pub fn rank(urls: Vec<String>, site: &SiteProfile) -> Vec<String> {
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();

    for url in urls {
        let key = pattern_key(&url);
        match group_index.get(&key) {
            Some(&idx) => groups[idx].push(url),
            None => {
                group_index.insert(key, groups.len());
                groups.push(vec![url]);
            }
        }
    }

    let best: Vec<String> = groups
        .into_iter()
        .filter_map(|group| pick_best(group, site))
        .collect();

    dedupe_in_order(best)
}

fn pick_best(group: Vec<String>, site: &SiteProfile) -> Option<String> {
    if group.len() == 1 {
        return group.into_iter().next();
    }
    let mut best: Option<(i64, String)> = None;
    for url in group {
        let s = score(&url, site);
        let replace = match &best {
            None => true,
            Some((best_score, _)) => s > *best_score,
        };
        if replace {
            best = Some((s, url));
        }
    }
    best.map(|(_, url)| url)
}
