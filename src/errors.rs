use std::path::PathBuf;

/// Per-entry failures. Every variant aborts the current manifest entry only;
/// the batch loop catches these at its boundary and moves on.
#[derive(thiserror::Error, Debug)]
pub enum EntryError {
    #[error("download of {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} for {url}")]
    FetchStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("no checksum entry for '{filename}' in {url}")]
    ChecksumNotFound { filename: String, url: String },
    #[error("checksum mismatch for {path}: expected {expected}, computed {computed}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        computed: String,
    },
    #[error("qemu-img failed (exit {code:?}): {stderr}")]
    Conversion { code: Option<i32>, stderr: String },
    #[error("host '{host}' did not answer ping probes")]
    Unreachable { host: String },
    #[error("property '{key}' must be a scalar value")]
    InvalidProperty { key: String },
    #[error("image API request failed: {context}: HTTP {status}: {detail}")]
    CloudApi {
        context: String,
        status: u16,
        detail: String,
    },
    #[error("image API transport error: {context}: {source}")]
    CloudTransport {
        context: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EntryError {
    /// Short machine-friendly kind tag, used in the run summary.
    pub fn kind(&self) -> &'static str {
        match self {
            EntryError::Fetch { .. } | EntryError::FetchStatus { .. } => "FetchError",
            EntryError::ChecksumNotFound { .. } => "ChecksumNotFoundError",
            EntryError::ChecksumMismatch { .. } => "ChecksumMismatchError",
            EntryError::Conversion { .. } => "ConversionError",
            EntryError::Unreachable { .. } => "UnreachableError",
            EntryError::InvalidProperty { .. }
            | EntryError::CloudApi { .. }
            | EntryError::CloudTransport { .. } => "CloudApiError",
            EntryError::Io { .. } => "IoError",
        }
    }
}
