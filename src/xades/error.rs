use thiserror::Error;

/// Errors raised while signing or verifying an XML document.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SigningError {
    /// Certificate or private key content was not provided.
    #[error("signing input missing: {0}")]
    InputMissing(String),

    /// Key or certificate material could not be decoded.
    #[error("key import failed: {0}")]
    KeyImport(String),

    /// The document is not well-formed or lacks the expected structure.
    #[error("XML error: {0}")]
    Xml(String),

    /// The RSA primitive failed.
    #[error("cryptographic failure: {0}")]
    Crypto(String),

    /// A digest or the signature value does not match.
    #[error("signature verification failed: {0}")]
    Verification(String),
}

impl SigningError {
    /// Missing or unusable material and rejected signatures are the
    /// caller's to fix; XML and crypto failures on our side are not.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InputMissing(_) | Self::KeyImport(_) | Self::Verification(_)
        )
    }
}
