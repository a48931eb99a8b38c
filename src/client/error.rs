use thiserror::Error;

/// Client-side error taxonomy for the sync workflow.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),

    /// Deliberately undifferentiated: an unknown username and a wrong
    /// password produce the same error, so accounts cannot be enumerated.
    #[error("incorrect username or password")]
    Authentication,

    #[error("Username already taken")]
    UsernameTaken,

    /// Decryption failed: wrong password, wrong salt, or tampered ciphertext.
    #[error("could not decrypt stored data")]
    Decryption,

    #[error("network error: {0}")]
    Network(String),

    #[error("session expired")]
    SessionExpired,

    #[error("not logged in")]
    NotLoggedIn,

    #[error("internal error: {0}")]
    Internal(String),
}
