use thiserror::Error;

#[derive(Debug, Error)]
pub enum SavezoneError {
    // IO
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Config
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration file not found at {0}, run `savezone init` first")]
    ConfigNotFound(String),

    // Remote
    #[error("Remote storage responded {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("HTTP transport error: {0}")]
    Http(String),

    // Auth
    #[error("Authorization error: {0}")]
    Auth(String),

    // Identifier codec
    #[error("Malformed resource identifier: {0}")]
    Format(String),

    // Restore
    #[error("Conflict: {0}")]
    Conflict(String),

    // Local resource
    #[error("Invalid resource: {0}")]
    Validation(String),

    // Archive
    #[error("Archive error: {0}")]
    Archive(String),

    // Registry
    #[error("Storage not found: {0}")]
    ProviderNotFound(String),

    // Serialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(String),

    #[error("TOML serialization error: {0}")]
    TomlSer(String),
}

impl SavezoneError {
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        SavezoneError::Remote {
            status,
            message: message.into(),
        }
    }

    /// True for a remote "not found" answer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SavezoneError::Remote { status: 404, .. })
    }
}

impl From<zip::result::ZipError> for SavezoneError {
    fn from(e: zip::result::ZipError) -> Self {
        SavezoneError::Archive(e.to_string())
    }
}

impl From<walkdir::Error> for SavezoneError {
    fn from(e: walkdir::Error) -> Self {
        SavezoneError::Archive(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SavezoneError>;
