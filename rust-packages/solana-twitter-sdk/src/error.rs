//! Error definitions for the Solana Twitter SDK.
//!
//! Every variant carries owned `String` context rather than a boxed source so
//! that the type stays `Clone`: a failed metadata fetch is shared by every
//! caller waiting on the same URI.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("No key file provided")]
    MissingKeyFile,

    #[error("No wallet connected")]
    NoWalletConnected,

    #[error("Upload failed with status {status}: {status_text}")]
    UploadFailed { status: u16, status_text: String },

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    /// Reading the user record failed for a reason other than absence.
    #[error("User record lookup failed: {0}")]
    RecordLookup(String),

    #[error("RPC client error: {0}")]
    Rpc(String),

    #[error("Storage network error: {0}")]
    Storage(String),

    #[error("Mint service error: {0}")]
    Mint(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("The provided topic should be 50 characters long maximum.")]
    TopicTooLong,

    #[error("The provided content should be 280 characters long maximum.")]
    ContentTooLong,

    #[error("Invalid message id: {0}")]
    InvalidMessageId(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Account not found")]
    AccountNotFound,

    #[error("Invalid account data: {0}")]
    InvalidAccountData(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<solana_client::client_error::ClientError> for Error {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        Error::Rpc(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}
