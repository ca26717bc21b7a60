use thiserror::Error;

/// Everything a client operation can fail with. UI code typically shows
/// the `Display` text.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Sign-in or sign-up was refused (bad credentials, duplicate email).
    #[error("{0}")]
    Auth(String),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidInput(String),

    /// The same action is already in flight.
    #[error("Already in progress")]
    Busy,

    /// The view was closed before the response arrived.
    #[error("View closed")]
    ViewClosed,

    #[error("Server error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Change feed error: {0}")]
    Gateway(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
