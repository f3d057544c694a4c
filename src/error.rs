//! Error types for the clearview crate.

/// Errors that can occur while loading, processing, or saving an image.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The selected file exceeds the upload limit.
    #[error("File too large. Please upload an image smaller than 5MB.")]
    FileTooLarge {
        /// Size of the rejected file in bytes.
        size: u64,
        /// Maximum accepted size in bytes.
        limit: u64,
    },

    /// No access credential is configured for the remote model.
    #[error("API Key is missing. Please check your environment configuration.")]
    MissingApiKey,

    /// The model answered with text and no image part.
    #[error(
        "The AI returned text instead of an image. Please try again with a different image or setting."
    )]
    TextInsteadOfImage {
        /// The text the model returned.
        text: String,
    },

    /// The model answered with neither an image nor text.
    #[error("Failed to generate processed image. No image data received.")]
    NoImageData,

    /// The remote API rejected the request.
    #[error("{message}")]
    Remote {
        /// HTTP status code returned by the API.
        status: u16,
        /// Message from the API error envelope, possibly empty.
        message: String,
    },

    /// The request could not be sent or its response could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The operation is not allowed while a request is in flight.
    #[error("a request is already in progress")]
    Busy,

    /// A string did not have the `data:<type>;base64,<payload>` shape.
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),

    /// The base64 payload of an encoded image could not be decoded.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
