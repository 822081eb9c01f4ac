use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Could not parse date '{input}' with any of the configured formats")]
    DateParse { input: String },

    #[error("Listing snapshots on '{host}' failed: {message}")]
    RemoteCall { host: String, message: String },

    #[error("No snapshot exists at or before {target}")]
    NoSnapshotBefore { target: NaiveDateTime },

    #[error("Local time {0} does not exist in the configured timezone")]
    InvalidLocalTime(NaiveDateTime),

    #[error("DST shift of {0} hours is out of range")]
    DstShiftOutOfRange(i64),

    #[error("Invalid addressing: {0}")]
    InvalidAddressing(String),

    #[error("Mail notification is not configured: '{0}' is empty")]
    MailNotConfigured(&'static str),

    #[error("E-mail notification was requested but no mailer is configured")]
    MailerMissing,

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("{0}")]
    Custom(String),

    #[error("Failed to walk directory: {0}")]
    WalkDir(#[from] walkdir::Error),
}

impl From<lettre::address::AddressError> for Error {
    fn from(err: lettre::address::AddressError) -> Self {
        Error::Mail(format!("invalid address: {}", err))
    }
}

impl From<lettre::error::Error> for Error {
    fn from(err: lettre::error::Error) -> Self {
        Error::Mail(format!("could not build message: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for Error {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Error::Mail(format!("relay rejected message: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
