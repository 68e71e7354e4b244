use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// An archive entry would escape the extraction directory.
    #[error("Unsafe file path detected: {0}")]
    UnsafePath(String),

    /// The archive could not be opened or read.
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<zip::result::ZipError> for CoreError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => CoreError::Io(io),
            other => CoreError::InvalidArchive(other.to_string()),
        }
    }
}
