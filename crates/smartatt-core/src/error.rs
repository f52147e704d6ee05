use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Protocol errors
    #[error("Unknown device token: {0:?}")]
    UnknownToken(String),

    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
