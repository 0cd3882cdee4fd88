//! Error types for GeoDrop

use std::path::PathBuf;

use thiserror::Error;

use crate::identity::AnonymousId;

/// Main error type for GeoDrop operations
#[derive(Error, Debug)]
pub enum GeoDropError {
    /// No namespace exists for the codename presented at login
    #[error("Identity not found")]
    IdentityNotFound,

    /// Two distinct codenames derived the same anonymous id.
    ///
    /// Only ever logged; a collision is a weakness of the derivation
    /// function, not a request-level fault.
    #[error("Duplicate identity: {0}")]
    DuplicateIdentityCollision(AnonymousId),

    /// Decryption failed (wrong key, wrong codename, tampered or foreign data)
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Uploaded bytes are not a valid feature collection
    #[error("Geometry parse error: {0}")]
    GeometryParse(String),

    /// Overwrite or unlink of a stored object did not complete
    #[error("Secure delete failed for {path}: {reason}")]
    SecureDeleteFailed { path: PathBuf, reason: String },

    /// Cryptographic operation failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Key material could not be parsed
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The source has no keypair yet, so nothing can be sealed to it
    #[error("No keypair for identity {0}")]
    KeypairMissing(AnonymousId),

    /// Latitude/longitude input could not be normalized
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Codename request outside the accepted word range
    #[error("Invalid codename: {0}")]
    InvalidCodename(String),

    /// String is not a well-formed anonymous id
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Reply id is malformed or not present in the namespace
    #[error("Reply not found: {0}")]
    ReplyNotFound(String),

    /// Object name does not denote a stored submission
    #[error("Submission not found: {0}")]
    SubmissionNotFound(String),

    /// Configuration value rejected
    #[error("Config error: {0}")]
    Config(String),

    /// The external map renderer failed
    #[error("Render error: {0}")]
    Render(String),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using GeoDropError
pub type GeoDropResult<T> = Result<T, GeoDropError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GeoDropError::ReplyNotFound("reply-abc".to_string());
        assert_eq!(format!("{}", err), "Reply not found: reply-abc");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GeoDropError = io_err.into();
        assert!(matches!(err, GeoDropError::Io(_)));
    }

    #[test]
    fn test_identity_not_found_leaks_nothing() {
        assert_eq!(GeoDropError::IdentityNotFound.to_string(), "Identity not found");
    }
}
