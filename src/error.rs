use thiserror::Error;

/// Exit status for a failed tracker query.
pub const EXIT_QUERY_FAILED: i32 = 3;
/// Exit status for a failed tracker login.
pub const EXIT_LOGIN_FAILED: i32 = 4;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Jira API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Connection to Jira failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Jira login failed: {0}")]
    Login(String),

    #[error("Metric write failed for {key}: {message}")]
    Write { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid sprint pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl Error {
    /// True when the tracker refused the request for lack of permission.
    pub fn is_auth_denied(&self) -> bool {
        match self {
            Error::Api { status, .. } => *status == 401 || *status == 403,
            Error::Http(e) => e
                .status()
                .is_some_and(|s| s.as_u16() == 401 || s.as_u16() == 403),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Login(_) => EXIT_LOGIN_FAILED,
            Error::Api { .. } | Error::NotFound(_) | Error::Http(_) => EXIT_QUERY_FAILED,
            _ => 1,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Config(format!("invalid URL: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
