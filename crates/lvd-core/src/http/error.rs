use thiserror::Error;

/// Transport-level failure. Classified into retry kinds by `retry::classify`.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Other { url: String, message: String },
}

impl HttpError {
    pub fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        let url = url.to_string();
        if e.is_timeout() {
            HttpError::Timeout { url }
        } else if e.is_connect() || e.is_request() {
            HttpError::Connection {
                url,
                message: e.to_string(),
            }
        } else if let Some(status) = e.status() {
            HttpError::Status {
                url,
                status: status.as_u16(),
            }
        } else {
            HttpError::Other {
                url,
                message: e.to_string(),
            }
        }
    }
}
