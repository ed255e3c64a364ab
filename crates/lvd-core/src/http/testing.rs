//! Scripted in-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{HttpError, HttpTransport, Page};

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Html(String),
    /// Page served from a different final URL (redirect).
    Redirected { to: String, body: String },
    Bytes(Vec<u8>),
    Status(u16),
    Timeout,
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub method: &'static str,
    pub url: String,
    pub form: Vec<(String, String)>,
}

/// Routes keyed by exact URL. Each route holds a queue of replies; the last
/// reply repeats once the queue is down to one entry.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
    delay: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn route(self, url: &str, reply: Reply) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn html(self, url: &str, body: &str) -> Self {
        self.route(url, Reply::Html(body.to_string()))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.url == url)
            .count()
    }

    async fn next(&self, method: &'static str, url: &str, form: &[(&str, &str)]) -> Reply {
        self.calls.lock().unwrap().push(Call {
            method,
            url: url.to_string(),
            form: form
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(url) {
            Some(q) if q.len() > 1 => q.pop_front().unwrap_or(Reply::Status(404)),
            Some(q) => q.front().cloned().unwrap_or(Reply::Status(404)),
            None => Reply::Status(404),
        }
    }

    fn into_page(url: &str, reply: Reply) -> Result<Page, HttpError> {
        match reply {
            Reply::Html(body) => Ok(Page {
                url: url.to_string(),
                status: 200,
                body,
            }),
            Reply::Redirected { to, body } => Ok(Page {
                url: to,
                status: 200,
                body,
            }),
            Reply::Bytes(b) => Ok(Page {
                url: url.to_string(),
                status: 200,
                body: String::from_utf8_lossy(&b).into_owned(),
            }),
            Reply::Status(status) => Err(HttpError::Status {
                url: url.to_string(),
                status,
            }),
            Reply::Timeout => Err(HttpError::Timeout {
                url: url.to_string(),
            }),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<Page, HttpError> {
        let reply = self.next("GET", url, &[]).await;
        Self::into_page(url, reply)
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Page, HttpError> {
        let reply = self.next("POST", url, form).await;
        Self::into_page(url, reply)
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, HttpError> {
        let bytes = match self.next("GET", url, &[]).await {
            Reply::Bytes(b) => b,
            other => Self::into_page(url, other)?.body.into_bytes(),
        };
        let receipt = crate::sink::write_payload(dest, &bytes)
            .await
            .map_err(|e| HttpError::Other {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(receipt.bytes)
    }

    fn reset_session(&self) {}
}
