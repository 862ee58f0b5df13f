use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum WallpaperError {
    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse TOML config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("remote request failed: {0}")]
    RemoteService(String),

    #[error("remote service returned status {status} for {url}")]
    RemoteStatus { status: u16, url: String },

    #[error("malformed metadata response: {0}")]
    MalformedMetadata(String),

    #[error("invalid page URL format: {0}")]
    InvalidPageUrl(String),

    #[error("date inference unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("page store error: {0}")]
    Store(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("layout migration failed moving {from} to {to}: {message}")]
    #[diagnostic(help("the archive was left untouched past the failing file; fix the cause and re-run"))]
    LayoutMigration {
        from: String,
        to: String,
        message: String,
    },

    #[error("invalid image file name: {0}")]
    InvalidImageName(String),

    #[error("failed to save image {path}: {message}")]
    ImageSave { path: String, message: String },

    #[error("all candidate URLs failed for {0}")]
    DownloadFailed(String),
}

impl From<rusqlite::Error> for WallpaperError {
    fn from(err: rusqlite::Error) -> Self {
        WallpaperError::Store(err.to_string())
    }
}
