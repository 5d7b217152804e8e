use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("could not retrieve the page {url}: {reason}")]
    PageUnreachable { url: String, reason: String },

    #[error("no photos found on this page")]
    NoPhotosFound,

    #[error("select at least one photo")]
    NoSelection,

    #[error("no valid selection")]
    NoValidSelection,

    #[error("no photos could be downloaded")]
    NothingDownloaded,

    #[error("session expired; grab the photos again")]
    SessionExpired,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to parse config at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidUrl(_) => "invalid_url",
            EngineError::PageUnreachable { .. } => "page_unreachable",
            EngineError::NoPhotosFound => "no_photos_found",
            EngineError::NoSelection => "no_selection",
            EngineError::NoValidSelection => "no_valid_selection",
            EngineError::NothingDownloaded => "nothing_downloaded",
            EngineError::SessionExpired => "session_expired",
            EngineError::NotFound(_) => "not_found",
            EngineError::ConfigInvalid { .. } => "config",
            EngineError::Json(_) => "json",
            EngineError::Io(_) => "io",
            EngineError::Zip(_) => "zip",
            EngineError::Csv(_) => "csv",
        }
    }

    pub fn is_user_facing(&self) -> bool {
        !matches!(
            self,
            EngineError::ConfigInvalid { .. }
                | EngineError::Json(_)
                | EngineError::Io(_)
                | EngineError::Zip(_)
                | EngineError::Csv(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
