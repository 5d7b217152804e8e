use crate::classify::{dedupe_in_order, filter};
use crate::config::SiteProfile;
use crate::extract::extract;
use crate::normalize::listing_base;
use crate::rank::rank;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedCandidate {
    pub index: usize,
    pub url: String,
}

pub fn collect_candidates(html: &str, page_url: &str, site: &SiteProfile) -> Vec<String> {
    let base = listing_base(page_url).unwrap_or_else(|| page_url.to_string());
    let raw = extract(html, &base, site);
    let filtered = filter(dedupe_in_order(raw), site);
    rank(filtered, site)
}

pub fn index_candidates(candidates: &[String]) -> Vec<IndexedCandidate> {
    candidates
        .iter()
        .enumerate()
        .map(|(index, url)| IndexedCandidate {
            index,
            url: url.clone(),
        })
        .collect()
}
