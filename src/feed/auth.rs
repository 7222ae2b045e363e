use crate::feed::config::{APP_KEY, APP_SECRET};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedAuthError {
    #[error("missing feed app credentials in env")]
    MissingCredentials,
}

/// `Authorization: Basic` value for the feed gateway. The gateway accepts the
/// app key/secret pair directly; there is no token exchange.
pub fn basic_auth_header() -> Result<String, FeedAuthError> {
    if APP_KEY.is_empty() || APP_SECRET.is_empty() {
        return Err(FeedAuthError::MissingCredentials);
    }
    let raw = format!("{}:{}", *APP_KEY, *APP_SECRET);
    Ok(format!("Basic {}", BASE64.encode(raw)))
}
