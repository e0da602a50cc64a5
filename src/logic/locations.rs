use reqwest::Url;

use crate::error::{Error, Result};

pub(crate) fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Upstream base URL: absolute, with a scheme and a host.
pub fn validate_base_url(field: &'static str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| Error::validation(field, format!("invalid URL {value:?}: {e}")))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(Error::validation(field, format!("URL {value:?} has no host")));
    }
    Ok(())
}

/// Schema location: an absolute URI or a local filesystem path.
pub fn validate_schema_location(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(field, "schema location is empty"));
    }
    if is_remote(value) {
        return validate_base_url(field, value);
    }
    Ok(())
}
