use thiserror::Error;

/// Errors raised by the invoicing core.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FacturaError {
    /// Malformed payload (items, annulment reason, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invoice, XML or referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller is not the invoice issuer.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Operation not allowed in the invoice's current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The persistence unit failed and was rolled back.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Signing or signature verification failed.
    #[cfg(feature = "xades")]
    #[error(transparent)]
    Signing(#[from] crate::xades::SigningError),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`FacturaError`], for mapping onto a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unauthorized,
    Conflict,
    Storage,
    Signing,
    Xml,
    Config,
}

impl FacturaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Storage(_) => ErrorKind::Storage,
            #[cfg(feature = "xades")]
            Self::Signing(_) => ErrorKind::Signing,
            Self::Xml(_) => ErrorKind::Xml,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// True when the caller can fix the request; false for server-side failures.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidInput(_)
            | Self::NotFound(_)
            | Self::Unauthorized(_)
            | Self::Conflict(_) => true,
            #[cfg(feature = "xades")]
            Self::Signing(e) => e.is_client_error(),
            Self::Storage(_) | Self::Xml(_) | Self::Config(_) => false,
        }
    }
}

/// Failures reported by an [`InvoiceStore`](crate::lifecycle::InvoiceStore)
/// implementation. Any of them aborts the whole write unit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("{entity} {id} does not exist")]
    Missing { entity: &'static str, id: String },

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("backend failure: {0}")]
    Backend(String),
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "items.0.quantity").
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Join validation errors into a single `InvalidInput`, or `Ok` when empty.
pub fn into_result(errors: Vec<ValidationError>) -> Result<(), FacturaError> {
    if errors.is_empty() {
        return Ok(());
    }
    let msg = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    Err(FacturaError::InvalidInput(msg))
}
