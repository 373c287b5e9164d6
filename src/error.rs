use std::error::Error as StdError;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Error)]
pub enum PreviewError {
    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL scheme not allowed: {0}")]
    InvalidUrlScheme(String),

    #[error("Failed to resolve host {host}: {message}")]
    ResolutionError { host: String, message: String },

    #[error("All addresses of host {0} are blacklisted")]
    AllBlacklisted(String),

    #[error("Stopped after {0} redirects")]
    TooManyRedirects(usize),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout: {0}")]
    TimeoutError(String),

    #[error("Failed to decode image header: {0}")]
    DecodeError(String),

    #[error("Failed to extract metadata: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

impl PreviewError {
    pub fn log(&self) {
        match self {
            PreviewError::UrlParseError(e) => {
                warn!(error = %e, "URL parsing failed");
            }
            PreviewError::InvalidUrl(e) => {
                warn!(error = %e, "Invalid URL");
            }
            PreviewError::InvalidUrlScheme(scheme) => {
                warn!(scheme = %scheme, "Refused URL scheme");
            }
            PreviewError::ResolutionError { host, message } => {
                warn!(host = %host, error = %message, "DNS resolution failed");
            }
            PreviewError::AllBlacklisted(host) => {
                warn!(host = %host, "Every resolved address is blacklisted");
            }
            PreviewError::TooManyRedirects(count) => {
                warn!(count, "Redirect limit reached");
            }
            PreviewError::NetworkError(e) => {
                error!(error = %e, "Content fetch failed");
            }
            PreviewError::TimeoutError(e) => {
                warn!(error = %e, "Request timed out");
            }
            PreviewError::DecodeError(e) => {
                debug!(error = %e, "Image header decoding failed");
            }
            PreviewError::ParseError(e) => {
                debug!(error = %e, "Metadata extraction failed");
            }
            PreviewError::ConfigError(e) => {
                error!(error = %e, "Invalid resolver configuration");
            }
        }
    }

    /// Maps a transport error onto the taxonomy. Errors raised by our own DNS
    /// resolver travel inside reqwest's source chain and come back unchanged.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        let mut source: Option<&(dyn StdError + 'static)> = err.source();
        while let Some(cause) = source {
            if let Some(inner) = cause.downcast_ref::<PreviewError>() {
                return inner.clone();
            }
            source = cause.source();
        }

        if err.is_timeout() {
            PreviewError::TimeoutError(err.to_string())
        } else {
            PreviewError::NetworkError(err.to_string())
        }
    }
}
