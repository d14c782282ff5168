use reqwest::StatusCode;
use thiserror::Error;

use crate::cipher::CipherError;

use super::client::UpstreamError;
use super::resolve::ResolveError;
use super::validate::ValidationError;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to decrypt query string: {0}")]
    Cipher(#[from] CipherError),
    #[error("enc query parameter is set but the data parameter is missing")]
    MissingEncryptedData,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid playback url: {0}")]
    BadUrl(#[from] url::ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl PlaybackError {
    /// The status surfaced to the inbound client. A `Forbidden` resolve
    /// outcome is forwarded verbatim by the server layer instead of using
    /// the error display string as the body.
    pub fn status(&self) -> StatusCode {
        match self {
            PlaybackError::Cipher(_)
            | PlaybackError::MissingEncryptedData
            | PlaybackError::Validation(_)
            | PlaybackError::BadUrl(_) => StatusCode::BAD_REQUEST,
            PlaybackError::Resolve(ResolveError::Forbidden { .. }) => StatusCode::FORBIDDEN,
            PlaybackError::Resolve(_) | PlaybackError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

pub type PlaybackResult<T> = Result<T, PlaybackError>;
