use thiserror::Error;

/// Errors raised while building or loading API credentials.
///
/// These surface at construction time so a misconfigured client is never
/// produced.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// The key/secret/passphrase combination is malformed.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A credentials document did not contain the expected field.
    #[error("Missing credentials field: {0}")]
    MissingField(String),

    /// A credentials document could not be parsed.
    #[error("Credentials JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A credentials document could not be read.
    #[error("Credentials I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while signing a single request.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The request requires authentication but no credentials are active.
    #[error("Request requires authentication but no credentials are set")]
    MissingCredentials,

    /// The array-serialization policy is unknown or not supported by the strategy.
    #[error("Unsupported array serialization: {0}")]
    UnsupportedSerialization(String),

    /// The underlying cryptographic primitive failed.
    #[error("Signing algorithm failure: {0}")]
    AlgorithmFailure(String),
}

impl SigningError {
    /// Signing errors are never worth retrying as-is.
    ///
    /// The transport may still retry after fixing the cause (e.g. resyncing
    /// its clock), but nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
