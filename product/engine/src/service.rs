use crate::archive::{build_zip, is_image_file_name, list_image_files, zip_directory_files};
use crate::classify::dedupe_in_order;
use crate::config::GrabConfig;
use crate::download::{download_images, Destination, DownloadOptions, SavedImage, SavedLocation};
use crate::fetch::{fetch_html, image_agent, page_agent};
use crate::normalize::{normalize_input_url, redact_url_for_log, upgrade_resolution};
use crate::paths::AppPaths;
use crate::pipeline::{collect_candidates, index_candidates, IndexedCandidate};
use crate::session::{ListingSession, SessionStore};
use crate::{EngineError, Result};
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

static SAFE_SLUG_RE: OnceLock<Regex> = OnceLock::new();
static SLUG_INVALID_RE: OnceLock<Regex> = OnceLock::new();

fn safe_slug_re() -> &'static Regex {
    SAFE_SLUG_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("safe slug regex"))
}

fn slug_invalid_re() -> &'static Regex {
    SLUG_INVALID_RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("slug regex"))
}

#[derive(Debug, Clone, Serialize)]
pub struct GrabbedListing {
    pub token: String,
    pub listing_url: String,
    pub slug: String,
    pub images: Vec<IndexedCandidate>,
}

#[derive(Debug, Clone)]
pub struct DownloadedListing {
    pub slug: String,
    pub output_dir: PathBuf,
    pub images: Vec<SavedImage>,
}

impl DownloadedListing {
    pub fn filenames(&self) -> Vec<String> {
        self.images.iter().map(|i| i.filename().to_string()).collect()
    }
}

pub struct GrabService {
    config: GrabConfig,
    paths: AppPaths,
    page_agent: ureq::Agent,
    image_agent: ureq::Agent,
    sessions: SessionStore,
}

impl GrabService {
    pub fn new(config: GrabConfig, paths: AppPaths) -> Self {
        let page_agent = page_agent(&config);
        let image_agent = image_agent(&config);
        let sessions = SessionStore::new(Duration::from_secs(config.session_ttl_secs));
        Self {
            config,
            paths,
            page_agent,
            image_agent,
            sessions,
        }
    }

    pub fn config(&self) -> &GrabConfig {
        &self.config
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn validate_listing_url(&self, raw_url: &str) -> Result<String> {
        let url = normalize_input_url(raw_url);
        if url.is_empty() {
            return Err(EngineError::InvalidUrl("enter a listing URL".to_string()));
        }
        let parsed = Url::parse(&url).map_err(|e| EngineError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(EngineError::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }
        let Some(host) = parsed.host_str().filter(|h| !h.is_empty()) else {
            return Err(EngineError::InvalidUrl("missing host".to_string()));
        };
        if !self.config.is_allowed_listing_host(host) {
            return Err(EngineError::InvalidUrl(format!("unsupported site: {host}")));
        }
        Ok(url)
    }

    pub fn grab<FLog>(&self, raw_url: &str, mut log_line: FLog) -> Result<GrabbedListing>
    where
        FLog: FnMut(&str, &str, serde_json::Value) -> Result<()>,
    {
        let url = self.validate_listing_url(raw_url)?;
        log_line(
            "info",
            "grab_started",
            serde_json::json!({ "url": redact_url_for_log(&url) }),
        )?;

        let html = fetch_html(&self.page_agent, &url)?;
        let candidates = collect_candidates(&html, &url, &self.config.site);
        log_line(
            "info",
            "candidates_collected",
            serde_json::json!({
                "url": redact_url_for_log(&url),
                "html_bytes": html.len(),
                "count": candidates.len(),
            }),
        )?;
        if candidates.is_empty() {
            return Err(EngineError::NoPhotosFound);
        }

        let slug = safe_slug_from_url(&url);
        let images = index_candidates(&candidates);
        let token = self.sessions.create(ListingSession {
            listing_url: url.clone(),
            slug: slug.clone(),
            candidates,
            last_downloaded: Vec::new(),
        });

        Ok(GrabbedListing {
            token,
            listing_url: url,
            slug,
            images,
        })
    }

    pub fn download_selection<FLog>(
        &self,
        token: &str,
        selected: &[String],
        mut log_line: FLog,
    ) -> Result<DownloadedListing>
    where
        FLog: FnMut(&str, &str, serde_json::Value) -> Result<()>,
    {
        let session = self.sessions.get(token).ok_or(EngineError::SessionExpired)?;
        if session.candidates.is_empty() {
            return Err(EngineError::SessionExpired);
        }

        let urls = parse_selection(selected, &session.candidates)?;
        let output_dir = self.paths.listing_dir(&session.slug);
        let cleared = clear_download_dir(&output_dir)?;
        log_line(
            "info",
            "selection_started",
            serde_json::json!({
                "slug": session.slug,
                "selected": urls.len(),
                "cleared": cleared,
            }),
        )?;

        let options = DownloadOptions::from_config(&self.config, None);
        let images = download_images(
            &self.image_agent,
            &urls,
            Destination::Directory(&output_dir),
            options,
            &mut log_line,
        )?;
        if images.is_empty() {
            return Err(EngineError::NothingDownloaded);
        }

        let names: Vec<String> = images.iter().map(|i| i.filename().to_string()).collect();
        let saved = names.len();
        self.sessions.update(token, |s| s.last_downloaded = names);
        log_line(
            "info",
            "selection_saved",
            serde_json::json!({
                "slug": session.slug,
                "saved": saved,
                "output_dir": self.paths.relative_display(&output_dir),
            }),
        )?;

        Ok(DownloadedListing {
            slug: session.slug,
            output_dir,
            images,
        })
    }

    pub fn downloaded_file(&self, slug: &str, filename: &str) -> Result<PathBuf> {
        let dir = self.listing_dir_checked(slug)?;
        if !is_safe_slug(filename) || filename.starts_with('.') {
            return Err(EngineError::NotFound(filename.to_string()));
        }
        let path = dir.join(filename);
        if !path.is_file() {
            return Err(EngineError::NotFound(filename.to_string()));
        }
        Ok(path)
    }

    /// Zips a listing folder. When `token` names a session for the same
    /// slug, only the files its last selection saved are included.
    pub fn zip_listing(&self, slug: &str, token: Option<&str>) -> Result<Vec<u8>> {
        let dir = self.listing_dir_checked(slug)?;

        let last_downloaded = token
            .and_then(|t| self.sessions.get(t))
            .filter(|s| s.slug == slug && !s.last_downloaded.is_empty())
            .map(|s| s.last_downloaded);

        let names = match last_downloaded {
            Some(names) => names
                .into_iter()
                .filter(|name| dir.join(name).is_file())
                .collect::<Vec<_>>(),
            None => list_image_files(&dir)?,
        };
        if names.is_empty() {
            return Err(EngineError::NothingDownloaded);
        }
        zip_directory_files(&dir, &names)
    }

    pub fn zip_urls<FLog>(&self, urls: &[String], mut log_line: FLog) -> Result<Vec<u8>>
    where
        FLog: FnMut(&str, &str, serde_json::Value) -> Result<()>,
    {
        if urls.is_empty() {
            return Err(EngineError::NoSelection);
        }

        let mut prepared = Vec::new();
        for raw in urls {
            let url = raw.trim();
            let Ok(parsed) = Url::parse(url) else {
                continue;
            };
            if !matches!(parsed.scheme(), "http" | "https") {
                continue;
            }
            let host_ok = parsed
                .host_str()
                .is_some_and(|host| self.config.is_allowed_image_host(host));
            if !host_ok {
                continue;
            }
            prepared.push(upgrade_resolution(url, &self.config.site));
        }
        let mut prepared = dedupe_in_order(prepared);
        prepared.truncate(self.config.max_batch);
        if prepared.is_empty() {
            return Err(EngineError::NoValidSelection);
        }

        log_line(
            "info",
            "zip_started",
            serde_json::json!({ "requested": urls.len(), "accepted": prepared.len() }),
        )?;
        let options = DownloadOptions::from_config(&self.config, Some(self.config.max_batch));
        let images = download_images(
            &self.image_agent,
            &prepared,
            Destination::Memory,
            options,
            &mut log_line,
        )?;
        if images.is_empty() {
            return Err(EngineError::NothingDownloaded);
        }

        let members = images
            .into_iter()
            .filter_map(|image| match image.location {
                SavedLocation::Memory(data) => Some((image.record.filename, data)),
                SavedLocation::File(_) => None,
            })
            .collect();
        build_zip(members)
    }

    fn listing_dir_checked(&self, slug: &str) -> Result<PathBuf> {
        if !is_safe_slug(slug) || slug == "." || slug == ".." {
            return Err(EngineError::NotFound(slug.to_string()));
        }
        let dir = self.paths.listing_dir(slug);
        if !dir.is_dir() {
            return Err(EngineError::NotFound(slug.to_string()));
        }
        Ok(dir)
    }
}

pub fn parse_selection(selected: &[String], candidates: &[String]) -> Result<Vec<String>> {
    if selected.is_empty() {
        return Err(EngineError::NoSelection);
    }
    let urls: Vec<String> = selected
        .iter()
        .filter_map(|s| s.trim().parse::<usize>().ok())
        .filter_map(|idx| candidates.get(idx).cloned())
        .collect();
    if urls.is_empty() {
        return Err(EngineError::NoValidSelection);
    }
    Ok(urls)
}

pub fn safe_slug_from_url(url: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default();
    let last = path.trim_matches('/').rsplit('/').next().unwrap_or("");
    let slug = slug_invalid_re().replace_all(last, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "listing".to_string()
    } else {
        slug.to_string()
    }
}

pub fn is_safe_slug(slug: &str) -> bool {
    safe_slug_re().is_match(slug)
}

pub fn clear_download_dir(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if !is_image_file_name(&entry.file_name().to_string_lossy()) {
            continue;
        }
        std::fs::remove_file(entry.path())?;
        removed += 1;
    }
    Ok(removed)
}
