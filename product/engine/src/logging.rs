use crate::paths::AppPaths;
use crate::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const EVENT_LOG_ROTATE_BYTES: u64 = 10 * 1024 * 1024;
const EVENT_LOG_MAX_BACKUPS: usize = 3;

#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
    run_id: String,
    rotate_bytes: u64,
    max_backups: usize,
}

impl EventLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            run_id: uuid::Uuid::new_v4().to_string(),
            rotate_bytes: EVENT_LOG_ROTATE_BYTES,
            max_backups: EVENT_LOG_MAX_BACKUPS,
        }
    }

    pub fn for_paths(paths: &AppPaths) -> Self {
        Self::new(paths.event_log_path())
    }

    pub fn with_rotation(mut self, rotate_bytes: u64, max_backups: usize) -> Self {
        self.rotate_bytes = rotate_bytes;
        self.max_backups = max_backups;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log(&self, level: &str, event: &str, data: serde_json::Value) -> Result<()> {
        let line = serde_json::json!({
            "ts_ms": now_ms(),
            "run_id": self.run_id,
            "level": level,
            "event": event,
            "data": data
        })
        .to_string();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.rotate_if_needed()?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(format!("{line}\n").as_bytes())?;
        Ok(())
    }

    fn rotate_if_needed(&self) -> Result<()> {
        let len = match std::fs::metadata(&self.path) {
            Ok(m) => m.len(),
            Err(_) => return Ok(()),
        };

        if len < self.rotate_bytes {
            return Ok(());
        }

        rotate_file_backups(&self.path, self.max_backups)?;
        Ok(())
    }
}

fn rotate_file_backups(path: &Path, max_backups: usize) -> std::io::Result<()> {
    if max_backups == 0 {
        let _ = std::fs::remove_file(path);
        return Ok(());
    }

    for i in (1..=max_backups).rev() {
        let dst = path_with_suffix(path, &format!(".{i}"));
        let src = if i == 1 {
            path.to_path_buf()
        } else {
            path_with_suffix(path, &format!(".{}", i - 1))
        };

        if !src.exists() {
            continue;
        }

        if dst.exists() {
            let _ = std::fs::remove_file(&dst);
        }
        std::fs::rename(src, dst)?;
    }
    Ok(())
}

fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let file_name = match path.file_name() {
        Some(n) => n.to_string_lossy().to_string(),
        None => suffix.to_string(),
    };
    path.with_file_name(format!("{file_name}{suffix}"))
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
