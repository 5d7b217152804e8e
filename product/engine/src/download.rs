use crate::config::GrabConfig;
use crate::fetch::{header_string, is_image_content_type};
use crate::normalize::{has_image_extension, IMAGE_EXTENSIONS};
use crate::Result;
use percent_encoding::percent_decode_str;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use url::Url;

const CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy)]
pub enum Destination<'a> {
    Directory(&'a Path),
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    pub min_bytes: u64,
    pub max_count: Option<usize>,
}

impl DownloadOptions {
    pub fn from_config(config: &GrabConfig, max_count: Option<usize>) -> Self {
        Self {
            min_bytes: config.min_image_bytes,
            max_count: max_count.filter(|n| *n > 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRecord {
    pub url: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub enum SavedLocation {
    File(PathBuf),
    Memory(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct SavedImage {
    pub record: DownloadRecord,
    pub location: SavedLocation,
}

impl SavedImage {
    pub fn filename(&self) -> &str {
        &self.record.filename
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            SavedLocation::File(path) => Some(path),
            SavedLocation::Memory(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    RequestFailed,
    HttpStatus,
    NotImage,
    UnknownType,
    Empty,
    TooSmall,
    Duplicate,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::RequestFailed => "request_failed",
            SkipReason::HttpStatus => "http_status",
            SkipReason::NotImage => "not_image",
            SkipReason::UnknownType => "unknown_type",
            SkipReason::Empty => "empty",
            SkipReason::TooSmall => "too_small",
            SkipReason::Duplicate => "duplicate",
        }
    }
}

enum Staged {
    File { tmp_path: PathBuf, dir: PathBuf },
    Memory(Vec<u8>),
}

impl Staged {
    fn discard(self) {
        if let Staged::File { tmp_path, .. } = self {
            let _ = std::fs::remove_file(tmp_path);
        }
    }
}

/// Downloads `urls` one after another. Per-image failures are logged as
/// `image_skipped` and never abort the batch; only local I/O errors do.
pub fn download_images<FLog>(
    agent: &ureq::Agent,
    urls: &[String],
    destination: Destination<'_>,
    options: DownloadOptions,
    mut log_line: FLog,
) -> Result<Vec<SavedImage>>
where
    FLog: FnMut(&str, &str, serde_json::Value) -> Result<()>,
{
    if let Destination::Directory(dir) = destination {
        std::fs::create_dir_all(dir)?;
    }

    let mut seen_hashes: HashSet<String> = HashSet::new();
    let mut used_names: HashSet<String> = HashSet::new();
    let mut saved: Vec<SavedImage> = Vec::new();

    let skip = |log_line: &mut FLog, url: &str, reason: SkipReason, detail: String| {
        log_line(
            "warn",
            "image_skipped",
            serde_json::json!({
                "url": url,
                "reason": reason.as_str(),
                "detail": detail,
            }),
        )
    };

    for (offset, url) in urls.iter().enumerate() {
        if options.max_count.is_some_and(|max| saved.len() >= max) {
            break;
        }
        let index = offset + 1;

        let mut response = match agent.get(url.as_str()).call() {
            Ok(resp) => resp,
            Err(err) => {
                skip(&mut log_line, url, SkipReason::RequestFailed, err.to_string())?;
                continue;
            }
        };
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            skip(&mut log_line, url, SkipReason::HttpStatus, format!("status={status}"))?;
            continue;
        }

        let content_type = header_string(&response, "content-type");
        if !content_type.is_empty() && !is_image_content_type(&content_type) {
            skip(&mut log_line, url, SkipReason::NotImage, content_type)?;
            continue;
        }
        if content_type.is_empty() && !has_image_extension(url) {
            skip(&mut log_line, url, SkipReason::UnknownType, String::new())?;
            continue;
        }

        let filename = build_filename(url, index, &content_type);
        let mut reader = response.body_mut().as_reader();
        let (staged, bytes, digest) = match stage_body(&mut reader, destination, &filename) {
            Ok(v) => v,
            Err(StageError::Read(err)) => {
                skip(&mut log_line, url, SkipReason::RequestFailed, err.to_string())?;
                continue;
            }
            Err(StageError::Write(err)) => return Err(err.into()),
        };

        if bytes == 0 {
            staged.discard();
            skip(&mut log_line, url, SkipReason::Empty, String::new())?;
            continue;
        }
        if bytes < options.min_bytes {
            staged.discard();
            skip(&mut log_line, url, SkipReason::TooSmall, format!("bytes={bytes}"))?;
            continue;
        }
        if seen_hashes.contains(&digest) {
            staged.discard();
            skip(&mut log_line, url, SkipReason::Duplicate, digest)?;
            continue;
        }

        let (final_name, location) = match staged {
            Staged::File { tmp_path, dir } => {
                let final_path = match reserve_unique_path(&dir, &filename) {
                    Ok(path) => path,
                    Err(err) => {
                        let _ = std::fs::remove_file(&tmp_path);
                        return Err(err.into());
                    }
                };
                if let Err(err) = std::fs::rename(&tmp_path, &final_path) {
                    let _ = std::fs::remove_file(&tmp_path);
                    let _ = std::fs::remove_file(&final_path);
                    return Err(err.into());
                }
                let name = final_path
                    .file_name()
                    .map(|v| v.to_string_lossy().to_string())
                    .unwrap_or_else(|| filename.clone());
                (name, SavedLocation::File(final_path))
            }
            Staged::Memory(data) => (
                unique_member_name(&mut used_names, &filename),
                SavedLocation::Memory(data),
            ),
        };

        seen_hashes.insert(digest.clone());
        log_line(
            "info",
            "image_saved",
            serde_json::json!({
                "url": url,
                "filename": final_name,
                "bytes": bytes,
            }),
        )?;
        saved.push(SavedImage {
            record: DownloadRecord {
                url: url.clone(),
                filename: final_name,
                content_type,
                bytes,
                sha256: digest,
            },
            location,
        });
    }

    Ok(saved)
}

enum StageError {
    Read(std::io::Error),
    Write(std::io::Error),
}

fn stage_body(
    reader: &mut impl Read,
    destination: Destination<'_>,
    filename: &str,
) -> std::result::Result<(Staged, u64, String), StageError> {
    let mut hasher = Sha256::new();
    let mut total = 0_u64;
    let mut buf = vec![0_u8; CHUNK_BYTES];

    match destination {
        Destination::Directory(dir) => {
            let tmp_path = reserve_unique_path(dir, &format!("{filename}.part"))
                .map_err(StageError::Write)?;
            let outcome = (|| {
                let mut file = std::fs::File::create(&tmp_path).map_err(StageError::Write)?;
                loop {
                    let n = reader.read(&mut buf).map_err(StageError::Read)?;
                    if n == 0 {
                        break;
                    }
                    file.write_all(&buf[..n]).map_err(StageError::Write)?;
                    hasher.update(&buf[..n]);
                    total += n as u64;
                }
                file.flush().map_err(StageError::Write)
            })();
            if let Err(err) = outcome {
                let _ = std::fs::remove_file(&tmp_path);
                return Err(err);
            }
            Ok((
                Staged::File {
                    tmp_path,
                    dir: dir.to_path_buf(),
                },
                total,
                hex::encode(hasher.finalize()),
            ))
        }
        Destination::Memory => {
            let mut data = Vec::new();
            loop {
                let n = reader.read(&mut buf).map_err(StageError::Read)?;
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&buf[..n]);
                hasher.update(&buf[..n]);
                total += n as u64;
            }
            Ok((Staged::Memory(data), total, hex::encode(hasher.finalize())))
        }
    }
}

/// Creates `dir/filename`, or `stem_N.ext` when taken, and returns the path.
/// Creation is exclusive so concurrent batches never share a name.
pub fn reserve_unique_path(dir: &Path, filename: &str) -> std::io::Result<PathBuf> {
    let (stem, ext) = split_name(filename);
    let mut counter = 0_usize;
    loop {
        let candidate = if counter == 0 {
            dir.join(filename)
        } else {
            dir.join(format!("{stem}_{counter}{ext}"))
        };
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => counter += 1,
            Err(err) => return Err(err),
        }
    }
}

fn unique_member_name(used: &mut HashSet<String>, filename: &str) -> String {
    let (stem, ext) = split_name(filename);
    let mut candidate = filename.to_string();
    let mut counter = 0_usize;
    while used.contains(&candidate) {
        counter += 1;
        candidate = format!("{stem}_{counter}{ext}");
    }
    used.insert(candidate.clone());
    candidate
}

fn split_name(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename, ""),
    }
}

fn sanitize_filename(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' || ch == '-' {
            out.push(ch);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

pub fn build_filename(url: &str, index: usize, content_type: &str) -> String {
    let basename = Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_default();
    let basename = sanitize_filename(&percent_decode_str(&basename).decode_utf8_lossy());
    let ext = Path::new(&basename)
        .extension()
        .map(|v| format!(".{}", v.to_string_lossy().to_ascii_lowercase()));

    match ext {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => format!("{index:03}_{basename}"),
        _ => format!("image_{index:03}{}", guess_extension(url, content_type)),
    }
}

pub fn guess_extension(url: &str, content_type: &str) -> &'static str {
    if let Ok(parsed) = Url::parse(url) {
        let path = parsed.path().to_ascii_lowercase();
        for ext in IMAGE_EXTENSIONS {
            if path.ends_with(ext) {
                return ext;
            }
        }
    }

    let content_type = content_type.to_ascii_lowercase();
    if content_type.contains("jpeg") || content_type.contains("jpg") {
        ".jpg"
    } else if content_type.contains("png") {
        ".png"
    } else if content_type.contains("gif") {
        ".gif"
    } else if content_type.contains("webp") {
        ".webp"
    } else if content_type.contains("bmp") {
        ".bmp"
    } else if content_type.contains("tiff") {
        ".tiff"
    } else if content_type.contains("svg") {
        ".svg"
    } else if content_type.contains("avif") {
        ".avif"
    } else {
        ".jpg"
    }
}

pub fn write_manifest(path: &Path, images: &[SavedImage]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for image in images {
        writer.serialize(&image.record)?;
    }
    writer.flush()?;
    Ok(())
}
