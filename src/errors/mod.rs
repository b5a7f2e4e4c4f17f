use thiserror::Error;

/// Coarse classification used when a feed's refresh has to be recorded as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Parse,
    Persistence,
    Other,
}

#[derive(Error, Debug)]
pub enum PithyError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar { name: String, value: String },

    // Account-facing errors
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("User already exists: {0}")]
    UserAlreadyExists(String),

    #[error("Feed not found: {0}")]
    FeedNotFound(i64),

    #[error("Unread item not found: {0}")]
    ItemNotFound(i64),

    // Network errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status: {0}")]
    HttpStatus(u16),

    #[error("Feed body too large: {0} bytes")]
    FeedTooLarge(u64),

    #[error("Fetch timed out")]
    Timeout,

    // Parsing errors
    #[error("Feed parsing failed: {0}")]
    FeedParse(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // User input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PithyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PithyError::Http(_)
            | PithyError::HttpStatus(_)
            | PithyError::FeedTooLarge(_)
            | PithyError::Timeout => ErrorKind::Transport,
            PithyError::FeedParse(_) => ErrorKind::Parse,
            PithyError::Database(_) | PithyError::StorageUnavailable(_) => {
                ErrorKind::Persistence
            }
            _ => ErrorKind::Other,
        }
    }

    /// Short, human readable classification stored as a feed's last failure.
    pub fn failure_reason(&self) -> String {
        match self {
            PithyError::Timeout => "timeout".to_string(),
            PithyError::HttpStatus(status) => format!("http {}", status),
            PithyError::FeedTooLarge(_) => "feed too large".to_string(),
            PithyError::Http(err) => classify_reqwest_error(err).to_string(),
            PithyError::FeedParse(_) => "parse error".to_string(),
            PithyError::Database(_) | PithyError::StorageUnavailable(_) => {
                "storage error".to_string()
            }
            PithyError::Task(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        return "timeout";
    }
    if err.is_connect() {
        if io_error_kind(err) == Some(std::io::ErrorKind::ConnectionRefused) {
            return "connection refused";
        }
        return "connection error";
    }
    if err.is_redirect() {
        return "too many redirects";
    }
    if err.is_body() || err.is_decode() {
        return "body read error";
    }
    "request error"
}

/// Walks the source chain looking for the underlying socket error.
fn io_error_kind(err: &reqwest::Error) -> Option<std::io::ErrorKind> {
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return Some(io.kind());
        }
        source = inner.source();
    }
    None
}

pub type PithyResult<T> = Result<T, PithyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reasons() {
        assert_eq!(PithyError::Timeout.failure_reason(), "timeout");
        assert_eq!(PithyError::HttpStatus(500).failure_reason(), "http 500");
        assert_eq!(PithyError::HttpStatus(404).failure_reason(), "http 404");
        assert_eq!(
            PithyError::FeedParse("no root element".to_string()).failure_reason(),
            "parse error"
        );
        assert_eq!(
            PithyError::Database(rusqlite::Error::InvalidQuery).failure_reason(),
            "storage error"
        );
        assert_eq!(PithyError::FeedTooLarge(10).failure_reason(), "feed too large");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(PithyError::Timeout.kind(), ErrorKind::Transport);
        assert_eq!(PithyError::HttpStatus(502).kind(), ErrorKind::Transport);
        assert_eq!(
            PithyError::FeedParse(String::new()).kind(),
            ErrorKind::Parse
        );
        assert_eq!(
            PithyError::StorageUnavailable("poisoned".to_string()).kind(),
            ErrorKind::Persistence
        );
        assert_eq!(
            PithyError::InvalidInput("x".to_string()).kind(),
            ErrorKind::Other
        );
    }
}
