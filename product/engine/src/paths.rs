use std::path::{Path, PathBuf};

pub const BASE_DIR_ENV: &str = "PHOTOGRAB_BASE_DIR";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_dir: PathBuf,
}

impl AppPaths {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn from_env() -> std::io::Result<Self> {
        if let Ok(v) = std::env::var(BASE_DIR_ENV) {
            let t = v.trim();
            if !t.is_empty() {
                return Ok(Self::new(PathBuf::from(t)));
            }
        }
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir().join("photograb.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.logs_dir().join("photograb.jsonl")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.base_dir.join("downloads")
    }

    pub fn listing_dir(&self, slug: &str) -> PathBuf {
        self.downloads_dir().join(slug)
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.config_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        std::fs::create_dir_all(self.downloads_dir())?;
        Ok(())
    }

    pub fn relative_display(&self, path: &Path) -> String {
        path.strip_prefix(&self.base_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }
}
