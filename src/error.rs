use thiserror::Error;

/// Custom Result type for this crate.
pub type Result<T> = std::result::Result<T, YawlError>;

/// Enum representing all possible errors in the yawl_rs library.
#[derive(Error, Debug)]
pub enum YawlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("XML parsing error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Synset ID cannot be empty")]
    NullIdentifier,

    #[error("`{0}' is not a valid synset ID")]
    InvalidIdentifierFormat(String),

    #[error("Invalid part of speech: {0}")]
    InvalidPartOfSpeech(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Sense key {key} resolves to {count} synsets")]
    AmbiguousKey { key: String, count: usize },

    #[error("Feature not supported by this wordnet: {0}")]
    FeatureNotSupported(&'static str),

    #[error("Data integrity fault: {0}")]
    DataIntegrity(String),

    #[error("Data directory not found or could not be determined")]
    DataDirNotFound,

    #[error("Internal error: {0}")]
    Internal(String), // For unexpected situations
}

impl YawlError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, YawlError::NotFound(_))
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, YawlError::FeatureNotSupported(_))
    }
}
