//! Map transport failures onto retry kinds.

use crate::http::HttpError;
use crate::retry::policy::ErrorKind;

pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        429 | 500..=599 => ErrorKind::Server(code),
        _ => ErrorKind::Permanent,
    }
}

pub fn classify(e: &HttpError) -> ErrorKind {
    match e {
        HttpError::Timeout { .. } | HttpError::Connection { .. } => ErrorKind::Network,
        HttpError::Status { status, .. } => classify_http_status(*status),
        HttpError::Other { .. } => ErrorKind::Permanent,
    }
}
