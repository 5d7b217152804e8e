use crate::paths::AppPaths;
use crate::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
pub const DEFAULT_MIN_IMAGE_BYTES: u64 = 5_000;
pub const DEFAULT_MAX_BATCH: usize = 20;

/// Site-specific knowledge used by the classifier and ranker. The defaults
/// describe the 2dehands listing platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Hosts of the platform's own image CDN. Matched as substrings of the host.
    pub cdn_hosts: Vec<String>,
    /// Path fragments of image-serving endpoints that may omit a file extension.
    pub endpoint_paths: Vec<String>,
    /// Third-party hosts known to serve high-resolution renditions.
    pub high_res_hosts: Vec<String>,
    /// Award the high-resolution host bonus when ranking.
    pub third_party_bonus: bool,
    /// Floor for the `$_<digits>` resolution directive on CDN URLs.
    pub preferred_resolution: u32,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            cdn_hosts: vec![
                "images.2dehands.com".to_string(),
                "img.2dehands.com".to_string(),
            ],
            endpoint_paths: vec!["/listing-twh-p/images/".to_string()],
            high_res_hosts: vec!["i.ebayimg.com".to_string(), "apollo".to_string()],
            third_party_bonus: true,
            preferred_resolution: 86,
        }
    }
}

impl SiteProfile {
    pub fn is_cdn_host(&self, host: &str) -> bool {
        host_matches(host, &self.cdn_hosts)
    }

    pub fn is_high_res_host(&self, host: &str) -> bool {
        host_matches(host, &self.high_res_hosts)
    }

    pub fn is_endpoint_path(&self, path: &str) -> bool {
        let path = path.to_ascii_lowercase();
        self.endpoint_paths
            .iter()
            .any(|fragment| !fragment.is_empty() && path.contains(&fragment.to_ascii_lowercase()))
    }
}

fn host_matches(host: &str, patterns: &[String]) -> bool {
    let host = host.to_ascii_lowercase();
    patterns
        .iter()
        .any(|pattern| !pattern.is_empty() && host.contains(&pattern.to_ascii_lowercase()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabConfig {
    pub user_agent: String,
    pub page_timeout_secs: u64,
    pub image_timeout_secs: u64,
    pub min_image_bytes: u64,
    /// Cap on URLs accepted by one download request.
    pub max_batch: usize,
    pub session_ttl_secs: u64,
    /// Host allowlists, matched as the domain or any subdomain of it. An
    /// empty list accepts every host.
    pub allowed_listing_hosts: Vec<String>,
    pub allowed_image_hosts: Vec<String>,
    pub site: SiteProfile,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_timeout_secs: 30,
            image_timeout_secs: 30,
            min_image_bytes: DEFAULT_MIN_IMAGE_BYTES,
            max_batch: DEFAULT_MAX_BATCH,
            session_ttl_secs: 60 * 60,
            allowed_listing_hosts: vec!["2dehands.be".to_string()],
            allowed_image_hosts: vec![
                "images.2dehands.com".to_string(),
                "img.2dehands.com".to_string(),
            ],
            site: SiteProfile::default(),
        }
    }
}

impl GrabConfig {
    pub fn is_allowed_listing_host(&self, host: &str) -> bool {
        host_allowed(host, &self.allowed_listing_hosts)
    }

    pub fn is_allowed_image_host(&self, host: &str) -> bool {
        host_allowed(host, &self.allowed_image_hosts)
    }
}

fn host_allowed(host: &str, allowlist: &[String]) -> bool {
    if allowlist.is_empty() {
        return true;
    }
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    allowlist.iter().any(|domain| {
        let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
        !domain.is_empty()
            && (host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|rest| rest.ends_with('.')))
    })
}

pub fn load_config(paths: &AppPaths) -> Result<GrabConfig> {
    load_config_from(&paths.config_path())
}

pub fn load_config_from(path: &Path) -> Result<GrabConfig> {
    if !path.exists() {
        return Ok(GrabConfig::default());
    }
    let bytes = std::fs::read(path)?;
    let parsed: GrabConfig =
        serde_json::from_slice(&bytes).map_err(|e| EngineError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(parsed)
}

pub fn save_config(paths: &AppPaths, config: &GrabConfig) -> Result<()> {
    let path = paths.config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::new(dir.path().to_path_buf());
        let config = load_config(&paths).expect("config");
        assert_eq!(config, GrabConfig::default());
        assert_eq!(config.min_image_bytes, 5_000);
        assert_eq!(config.site.preferred_resolution, 86);
    }

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("photograb.json");
        std::fs::write(
            &path,
            r#"{"max_batch": 5, "site": {"third_party_bonus": false}}"#,
        )
        .expect("write");
        let config = load_config_from(&path).expect("config");
        assert_eq!(config.max_batch, 5);
        assert!(!config.site.third_party_bonus);
        assert_eq!(config.site.cdn_hosts, SiteProfile::default().cdn_hosts);
        assert_eq!(config.page_timeout_secs, 30);
    }

    #[test]
    fn malformed_config_is_reported_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("photograb.json");
        std::fs::write(&path, "{ not json").expect("write");
        let err = load_config_from(&path).expect_err("should fail");
        assert!(matches!(err, EngineError::ConfigInvalid { .. }), "{err}");
    }

    #[test]
    fn save_then_load_preserves_allowlists() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::new(dir.path().to_path_buf());
        let mut config = GrabConfig::default();
        config.allowed_listing_hosts = vec!["2dehands.nl".to_string()];
        config.allowed_image_hosts = Vec::new();
        save_config(&paths, &config).expect("save");
        let loaded = load_config(&paths).expect("load");
        assert_eq!(loaded.allowed_listing_hosts, vec!["2dehands.nl".to_string()]);
        assert!(loaded.allowed_image_hosts.is_empty());
    }

    #[test]
    fn default_allowlists_only_accept_the_platform() {
        let config = GrabConfig::default();
        assert!(config.is_allowed_listing_host("www.2dehands.be"));
        assert!(config.is_allowed_listing_host("2dehands.be"));
        assert!(!config.is_allowed_listing_host("www.example.com"));
        assert!(!config.is_allowed_listing_host("evil2dehands.be"));

        assert!(config.is_allowed_image_host("images.2dehands.com"));
        assert!(config.is_allowed_image_host("IMG.2dehands.com"));
        assert!(!config.is_allowed_image_host("127.0.0.1"));
        assert!(!config.is_allowed_image_host("localhost"));
        assert!(!config.is_allowed_image_host("2dehands.com"));
    }

    #[test]
    fn empty_allowlist_accepts_any_host() {
        let config = GrabConfig {
            allowed_listing_hosts: Vec::new(),
            allowed_image_hosts: Vec::new(),
            ..GrabConfig::default()
        };
        assert!(config.is_allowed_listing_host("www.example.com"));
        assert!(config.is_allowed_image_host("127.0.0.1"));
    }

    #[test]
    fn site_profile_matches_cdn_and_endpoint_paths() {
        let site = SiteProfile::default();
        assert!(site.is_cdn_host("IMAGES.2dehands.com"));
        assert!(!site.is_cdn_host("example.com"));
        assert!(site.is_endpoint_path("/api/v1/Listing-twh-p/images/ab/cd"));
        assert!(site.is_high_res_host("i.ebayimg.com"));
    }
}
