use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between the login form and a `Person`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("network error on {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server answered {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("session expired")]
    SessionExpired,

    #[error("session is closed")]
    Closed,

    #[error("unexpected page structure: {0}")]
    Protocol(String),

    #[error("invalid record: {0}")]
    Validation(String),

    #[error("{0}")]
    Site(#[from] SiteError),

    #[error("fetch cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Login rejections, as worded by the intranet's error label.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("identifier or password is empty")]
    MissingCredentials,

    #[error("unknown user {0:?}")]
    UnknownUser(String),

    #[error("invalid password for user {0:?}")]
    InvalidPassword(String),

    #[error("user {0:?} is not allowed to log in")]
    Unauthorized(String),

    #[error("login rejected: {0}")]
    Rejected(String),
}

/// The intranet's own error pages, reached through a redirect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SiteError {
    #[error("intranet error page reached from {0}")]
    Unavailable(String),

    #[error("page not found: {0}")]
    NotFound(String),

    #[error("access forbidden: {0}")]
    Forbidden(String),
}

impl Error {
    /// Timeouts, connection failures and 5xx answers are worth one more try.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Network { source, .. } => source.is_timeout() || source.is_connect(),
            Error::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    /// Failures that end a whole fetch rather than a single page.
    pub fn is_session_level(&self) -> bool {
        !matches!(self, Error::Protocol(_) | Error::Validation(_))
    }
}
