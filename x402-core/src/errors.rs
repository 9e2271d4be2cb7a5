/// Error types for X402 core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// JSON serialization/deserialization errors.
    #[error("Serde JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Base64 decoding errors while reading a protocol header.
    #[error("Base64 decode error: {0}")]
    Base64DecodeError(#[from] base64::DecodeError),

    /// A decoded header was not valid UTF-8.
    #[error("UTF-8 decode error: {0}")]
    Utf8DecodeError(#[from] std::string::FromUtf8Error),

    /// An amount string could not be read as token units.
    #[error("Invalid amount `{0}`")]
    InvalidAmount(String),
}

/// A specialized `Result` type for X402 core operations.
pub type Result<T> = std::result::Result<T, Error>;
