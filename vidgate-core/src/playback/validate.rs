use std::collections::HashMap;

use regex::Regex;
use thiserror::Error;

const HOST_PATTERN: &str = r"^[\w-]+\.googlevideo\.com$";

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("host query parameter is missing or does not name a googlevideo host")]
    Host,
    #[error("expire query parameter is missing, malformed, or the url has expired")]
    Expired,
    #[error("c query parameter is missing")]
    Client,
}

/// Fields the rest of the pipeline needs after validation has passed.
#[derive(Debug, Clone)]
pub struct ValidatedFields {
    pub host: String,
    pub client: String,
}

/// Checks `host`, `expire`, and `c` in that order, stopping at the first
/// failure. `now_epoch` is the arrival time in unix seconds; an `expire`
/// equal to it is still accepted.
pub fn validate(
    params: &HashMap<String, String>,
    now_epoch: i64,
) -> Result<ValidatedFields, ValidationError> {
    let host = params.get("host").ok_or(ValidationError::Host)?;
    let pattern = Regex::new(HOST_PATTERN).unwrap();
    if !pattern.is_match(host) {
        return Err(ValidationError::Host);
    }
    let expire = params.get("expire").ok_or(ValidationError::Expired)?;
    let expire: i64 = expire.parse().map_err(|_| ValidationError::Expired)?;
    if expire < now_epoch {
        return Err(ValidationError::Expired);
    }
    let client = params
        .get("c")
        .filter(|client| !client.is_empty())
        .ok_or(ValidationError::Client)?;
    Ok(ValidatedFields {
        host: host.clone(),
        client: client.clone(),
    })
}
