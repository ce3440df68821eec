use common::ErrorLocation;

use feed_core::error::CoreError;
use feed_core::error::client::ClientError;

use thiserror::Error;

/// Errors surfaced by the feedwatch binary.
///
/// Everything coming out of feed-core is wrapped into `Core` at the
/// boundary so exit paths carry one error type with location tracking.
#[derive(Debug, Error)]
pub enum FeedwatchError {
    /// Error from this app
    #[error("Feedwatch Error: {message} {location}")]
    Feedwatch {
        message: String,
        location: ErrorLocation,
    },

    /// Error from feed-core operations (connect, config, subscribe, etc.)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for FeedwatchError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        FeedwatchError::Core {
            message: error.to_string(),
            location: ErrorLocation::caller(),
        }
    }
}

impl From<ClientError> for FeedwatchError {
    #[track_caller]
    fn from(error: ClientError) -> Self {
        FeedwatchError::Core {
            message: error.to_string(),
            location: ErrorLocation::caller(),
        }
    }
}
