use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DownloadError>;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// Zero or several captured requests looked like the book-data endpoint.
    #[error("book data request not found (expected exactly 1 match, got {matches})")]
    ManifestNotFound { matches: usize },

    /// Zero or several captured requests referenced the playlist.
    #[error("stream playlist request not found (expected exactly 1 match, got {matches})")]
    StreamNotFound { matches: usize },

    #[error("parse book data: {0}")]
    ManifestParse(String),

    #[error("parse chapter markup: {0}")]
    MarkupParse(String),

    #[error("fetch {source_url} -> {}: {status}: {stderr}", .dest.display())]
    Fetch {
        source_url: String,
        dest: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("split chapter {chapter:?} -> {}: {status}: {stderr}", .dest.display())]
    Split {
        chapter: String,
        dest: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("capture page traffic: {0}")]
    Capture(String),

    #[error("run {tool}: {message}")]
    Tool { tool: String, message: String },

    /// The tool binary could not be found, so no later run can succeed either.
    #[error("{tool} not found; install ffmpeg or pass --ffmpeg <PATH>")]
    ToolMissing { tool: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}
