use thiserror::Error;

/// Errors raised by the identity layer.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Registration attempted with a username that is already taken
    #[error("username already exists; please choose a different one")]
    DuplicateUsername,

    /// Login with an unknown username or a wrong password.
    /// Deliberately indistinguishable to the caller.
    #[error("invalid username or password")]
    InvalidCredential,

    /// Password hashing or verification failed
    #[error("credential processing failed: {0}")]
    Crypto(String),

    /// Underlying store failure
    #[error("identity store error: {0}")]
    Store(#[from] sled::Error),

    /// Stored record could not be (de)serialized
    #[error("identity record error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IdentityError>;
