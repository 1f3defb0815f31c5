//! Common validation utilities.

use std::collections::BTreeMap;
use validator::ValidationError;

/// HTTP methods an endpoint may be configured with.
pub const ALLOWED_HTTP_METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

/// Maximum number of custom headers per endpoint.
const MAX_CUSTOM_HEADERS: usize = 32;

/// Validates that a URL targets plain HTTP or HTTPS.
///
/// Syntax is checked separately with `#[validate(url)]`.
pub fn validate_http_scheme(url: &str) -> Result<(), ValidationError> {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") {
        Ok(())
    } else {
        let mut err = ValidationError::new("url_scheme");
        err.message = Some("URL must use http or https".into());
        Err(err)
    }
}

/// Validates an HTTP method name (case-insensitive).
pub fn validate_http_method(method: &str) -> Result<(), ValidationError> {
    if ALLOWED_HTTP_METHODS
        .iter()
        .any(|m| m.eq_ignore_ascii_case(method))
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("http_method");
        err.message = Some("Method must be one of GET, POST, PUT, PATCH, DELETE".into());
        Err(err)
    }
}

/// Validates custom header names and values.
///
/// Names must be RFC 7230 tokens; values must not contain control characters.
pub fn validate_custom_headers(headers: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    if headers.len() > MAX_CUSTOM_HEADERS {
        let mut err = ValidationError::new("headers_count");
        err.message = Some(format!("At most {} custom headers are allowed", MAX_CUSTOM_HEADERS).into());
        return Err(err);
    }

    for (name, value) in headers {
        if name.is_empty() || !name.bytes().all(is_token_char) {
            let mut err = ValidationError::new("header_name");
            err.message = Some(format!("Invalid header name: {}", name).into());
            return Err(err);
        }
        if value.bytes().any(|b| (b < 0x20 && b != b'\t') || b == 0x7f) {
            let mut err = ValidationError::new("header_value");
            err.message = Some(format!("Invalid value for header: {}", name).into());
            return Err(err);
        }
    }

    Ok(())
}

fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}
