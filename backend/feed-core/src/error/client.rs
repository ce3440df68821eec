use common::ErrorLocation;

use thiserror::Error as ThisError;
use url::ParseError;

#[derive(Debug, ThisError)]
pub enum ClientError {
    #[error("Endpoint Error: {message} {location}")]
    Endpoint {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Detached Error: {message} {location}")]
    Detached {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ParseError> for ClientError {
    #[track_caller]
    fn from(error: ParseError) -> Self {
        ClientError::Endpoint {
            message: error.to_string(),
            location: ErrorLocation::caller(),
        }
    }
}
