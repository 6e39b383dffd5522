use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Load failed: {0}")]
    LoadFailed(String),

    #[error("Count fetch failed: {0}")]
    CountFetchFailed(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid tree path: {0:?}")]
    InvalidPath(Vec<usize>),
}

/// Coarse classification used by hosts that only need to pick a message style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SchemaMismatch,
    Translation,
    LoadFailed,
    CountFetchFailed,
    Other,
}

impl FilterError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            Self::Translation(_) => ErrorKind::Translation,
            Self::LoadFailed(_) => ErrorKind::LoadFailed,
            Self::CountFetchFailed(_) => ErrorKind::CountFetchFailed,
            Self::Json(_) | Self::Toml(_) | Self::Io(_) | Self::InvalidPath(_) => ErrorKind::Other,
        }
    }
}

impl From<std::io::Error> for FilterError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
