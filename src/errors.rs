use thiserror::Error;

use crate::model::GeocodeAttempt;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Config(String),
}

/// Failure of a single outbound provider call. Absorbed by the pipeline and
/// recorded in the debug trail; never returned to the caller directly.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider unreachable: {0}")]
    Unreachable(String),
    #[error("provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ProviderError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs carry the API key as a query parameter.
        let err = err.without_url();
        if err.is_decode() {
            return ProviderError::Malformed(err.to_string());
        }
        match err.status() {
            Some(status) => ProviderError::Rejected {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => ProviderError::Unreachable(err.to_string()),
        }
    }
}

/// Terminal failure of a whole resolution request.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid coordinates.")]
    InvalidCoordinateInput,
    #[error("Please provide a valid address or lat/lng.")]
    NoCoordinateFound {
        hint: String,
        debug: Vec<GeocodeAttempt>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_errors_expose_status() {
        let err = ProviderError::Rejected {
            status: 403,
            message: "denied".into(),
        };
        assert_eq!(err.http_status(), Some(403));
        assert_eq!(ProviderError::Unreachable("timeout".into()).http_status(), None);
    }
}
