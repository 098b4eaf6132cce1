use std::collections::HashMap;

use axum::http::{header, HeaderMap, HeaderValue, Method};

use crate::models::errors::AppError;

/// The inbound `Cookie` header as raw bytes, passed on to the backend untouched.
pub fn cookie_header(headers: &HeaderMap) -> Option<HeaderValue> {
    headers.get(header::COOKIE).cloned()
}

pub fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

pub fn require_method(method: &Method, allowed: Method) -> Result<(), AppError> {
    if *method == allowed {
        Ok(())
    } else {
        Err(AppError::MethodNotAllowed)
    }
}

/// A non-blank path parameter, percent-encoded for use in a backend path.
pub fn required_param(
    params: &HashMap<String, String>,
    name: &str,
    missing_message: &str,
) -> Result<String, AppError> {
    params
        .get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| urlencoding::encode(value).into_owned())
        .ok_or_else(|| AppError::validation_failed(missing_message))
}
