//! HTTP status code to user-facing message mapping.

use reqwest::StatusCode;

/// Message shown to the user for a non-2xx HTTP status.
pub fn check_status(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "Request failed! Please try again later.",
        401 => "Login expired! Please log in again.",
        403 => "The current account has no permission to access this resource!",
        404 => "The resource you are accessing does not exist!",
        405 => "Wrong request method! Please try again later.",
        408 => "Request timed out! Please try again later.",
        500 => "Service error!",
        502 => "Gateway error!",
        503 => "Service unavailable!",
        504 => "Gateway timeout!",
        _ => "Request failed!",
    }
}
