//! Error types for the stamping pipeline.
//!
//! Every failure surfaced to a caller falls into one of four kinds. Lower-level
//! errors (image decoding, keystore access, lopdf) are folded into those kinds
//! at module boundaries.

/// Result type alias for stamping operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while stamping or signing a document.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// The source bytes could not be parsed as a PDF (corrupt, encrypted, no pages)
    #[error("Invalid document or document stream: {0}")]
    InvalidDocument(String),

    /// The output directory or file could not be prepared
    #[error("Could not prepare output location: {0}")]
    OutputUnavailable(String),

    /// Key retrieval or signing failed.
    ///
    /// The message never contains the passphrase.
    #[error("Credential error: {0}")]
    CredentialError(String),

    /// Rasterization, embedding or signature assembly failed
    #[error("Error processing PDF: {0}")]
    ProcessingError(String),
}

impl Error {
    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidDocument(_) => "invalid_document",
            Error::OutputUnavailable(_) => "output_unavailable",
            Error::CredentialError(_) => "credential_error",
            Error::ProcessingError(_) => "processing_error",
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        Error::ProcessingError(err.to_string())
    }
}

impl From<crate::writer::ImageError> for Error {
    fn from(err: crate::writer::ImageError) -> Self {
        Error::ProcessingError(err.to_string())
    }
}

impl From<crate::signatures::KeyStoreError> for Error {
    fn from(err: crate::signatures::KeyStoreError) -> Self {
        Error::CredentialError(err.to_string())
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Self {
        Error::ProcessingError(format!("DER encoding failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_document_error() {
        let err = Error::InvalidDocument("missing header".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid document or document stream"));
        assert!(msg.contains("missing header"));
        assert_eq!(err.kind(), "invalid_document");
    }

    #[test]
    fn test_output_unavailable_error() {
        let err = Error::OutputUnavailable("Could not create directory".to_string());
        assert!(err.to_string().contains("Could not create directory"));
        assert_eq!(err.kind(), "output_unavailable");
    }

    #[test]
    fn test_processing_error() {
        let err = Error::ProcessingError("bad image".to_string());
        assert_eq!(err.to_string(), "Error processing PDF: bad image");
    }

    #[test]
    fn test_keystore_error_maps_to_credential_error() {
        let err: Error = crate::signatures::KeyStoreError::UnknownAlias("signer".into()).into();
        assert_eq!(err.kind(), "credential_error");
        assert!(err.to_string().contains("signer"));
    }

    #[test]
    fn test_image_error_maps_to_processing_error() {
        let err: Error = crate::writer::ImageError::UnsupportedFormat.into();
        assert_eq!(err.kind(), "processing_error");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
