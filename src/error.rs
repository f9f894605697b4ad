//! Unified error handling for the track engine.
//!
//! Only two things can fail: turning a file into a track (`Parse`) and talking
//! to the store (`NotFound`, `Storage`). Every analytic function is total over
//! its inputs and returns plain values.

use thiserror::Error;

/// Why a track file was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// The container is not well-formed XML (or has no root element).
    #[error("malformed track file: {message}")]
    Malformed { message: String },

    /// A track point has a missing or unparsable `lat`/`lon` attribute.
    #[error("track point {index} has malformed {attribute}: {value:?}")]
    MalformedCoordinate {
        index: usize,
        attribute: &'static str,
        value: Option<String>,
    },
}

impl ParseError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        ParseError::Malformed {
            message: message.into(),
        }
    }
}

/// Unified error type for track engine operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackError {
    /// Fatal for the single file being parsed; batch callers skip it.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Store lookup by id yielded nothing.
    #[error("track '{id}' not found")]
    NotFound { id: String },

    /// Store/back-end failure, surfaced unmodified.
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl TrackError {
    pub fn storage(message: impl Into<String>) -> Self {
        TrackError::Storage {
            message: message.into(),
        }
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self, TrackError::Parse(_))
    }
}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for TrackError {
    fn from(e: rusqlite::Error) -> Self {
        TrackError::storage(e.to_string())
    }
}

impl From<tokio::task::JoinError> for TrackError {
    fn from(e: tokio::task::JoinError) -> Self {
        TrackError::storage(format!("store task failed: {}", e))
    }
}

/// Result type alias for track engine operations.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Extension trait for converting store misses into [`TrackError::NotFound`].
pub trait OptionExt<T> {
    fn ok_or_not_found(self, id: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, id: &str) -> Result<T> {
        self.ok_or_else(|| TrackError::NotFound { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackError::from(ParseError::MalformedCoordinate {
            index: 3,
            attribute: "lat",
            value: Some("north".to_string()),
        });
        assert!(err.is_parse_error());
        assert!(err.to_string().contains("track point 3"));
        assert!(err.to_string().contains("north"));

        let err = TrackError::NotFound {
            id: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "track 'abc' not found");
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_not_found("missing");
        assert!(matches!(result, Err(TrackError::NotFound { ref id }) if id == "missing"));

        assert_eq!(Some(5).ok_or_not_found("x"), Ok(5));
    }
}
