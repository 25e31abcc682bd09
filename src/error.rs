use std::path::PathBuf;

/// Failure to turn a term table into queries. Aborts the run before any
/// scraping starts.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("term table is missing required columns: {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("load term table {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },
}

impl GenerateError {
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single search. Recorded per query; never fatal to a batch.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited by {platform}: {message}")]
    RateLimited { platform: String, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{platform} error: {message}")]
    Platform { platform: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("all platforms failed: {}", join_errors(.0))]
    AllPlatformsFailed(Vec<SearchError>),
}

impl SearchError {
    /// Configuration problems do not go away by asking again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::AllPlatformsFailed(errors) => errors.iter().any(Self::is_retryable),
            _ => true,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

fn join_errors(errors: &[SearchError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure to write an artifact. The destination is left untouched.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("io error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialize {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("write csv {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
