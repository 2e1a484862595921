use serde::de::DeserializeOwned;

use crate::{Response, Result, ValidationError};

/// Parses a response body into `T`.
///
/// Any mismatch between the body and `T` surfaces as
/// [`crate::ClientError::Validation`] with per-field details.
pub fn parse<T: DeserializeOwned>(response: &Response) -> Result<T> {
    parse_slice(response.content())
}

/// Parses raw JSON bytes into `T`. Trailing data after the document is an
/// error.
pub fn parse_slice<T: DeserializeOwned>(content: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(content);
    let value = serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|err| ValidationError::wrap(&err))?;
    deserializer
        .end()
        .map_err(|err| ValidationError::wrap(&err))?;
    Ok(value)
}
