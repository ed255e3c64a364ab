//! Production transport: one reqwest client with an in-memory cookie store.

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use super::{HttpError, HttpTransport, Page};
use crate::config::LvdConfig;
use crate::sink::{discard, temp_path};

pub struct ReqwestTransport {
    client: RwLock<Client>,
    user_agent: String,
    referer: String,
    request_timeout: Duration,
    payload_timeout: Duration,
}

impl ReqwestTransport {
    pub fn from_config(cfg: &LvdConfig) -> Result<Self> {
        let user_agent = cfg.user_agent.clone();
        let referer = format!("{}/", cfg.platform_base());
        let client = build_client(&user_agent, &referer)?;
        Ok(Self {
            client: RwLock::new(client),
            user_agent,
            referer,
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            payload_timeout: Duration::from_secs(cfg.payload_timeout_secs),
        })
    }

    fn client(&self) -> Client {
        // Client is a cheap Arc handle.
        self.client.read().unwrap().clone()
    }

    async fn read_page(url: &str, resp: reqwest::Response) -> Result<Page, HttpError> {
        let status = resp.status();
        let final_url = resp.url().to_string();
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = resp
            .text()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?;
        Ok(Page {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

fn file_error(url: &str, path: &Path, e: std::io::Error) -> HttpError {
    HttpError::Other {
        url: url.to_string(),
        message: format!("{}: {}", path.display(), e),
    }
}

/// Copy the response body chunk by chunk; the payload is never held whole.
async fn stream_body(url: &str, mut resp: reqwest::Response, tmp: &Path) -> Result<u64, HttpError> {
    let mut file = tokio::fs::File::create(tmp)
        .await
        .map_err(|e| file_error(url, tmp, e))?;
    let mut written = 0u64;
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| HttpError::from_reqwest(url, e))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| file_error(url, tmp, e))?;
        written += chunk.len() as u64;
    }
    file.sync_all().await.map_err(|e| file_error(url, tmp, e))?;
    Ok(written)
}

fn build_client(user_agent: &str, referer: &str) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        REFERER,
        HeaderValue::from_str(referer).context("platform origin is not a valid header value")?,
    );
    Client::builder()
        .cookie_store(true)
        .user_agent(user_agent)
        .default_headers(headers)
        .build()
        .context("build http client")
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<Page, HttpError> {
        tracing::debug!(url, "GET");
        let resp = self
            .client()
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?;
        Self::read_page(url, resp).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Page, HttpError> {
        tracing::debug!(url, fields = form.len(), "POST");
        let resp = self
            .client()
            .post(url)
            .form(form)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?;
        Self::read_page(url, resp).await
    }

    async fn download_to(&self, url: &str, dest: &Path) -> Result<u64, HttpError> {
        tracing::debug!(url, path = %dest.display(), "GET (payload)");
        let resp = self
            .client()
            .get(url)
            .timeout(self.payload_timeout)
            .send()
            .await
            .map_err(|e| HttpError::from_reqwest(url, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| file_error(url, parent, e))?;
        }
        let tmp = temp_path(dest);
        let written = match stream_body(url, resp, &tmp).await {
            Ok(n) => n,
            Err(e) => {
                discard(&tmp).await;
                return Err(e);
            }
        };
        tokio::fs::rename(&tmp, dest)
            .await
            .map_err(|e| file_error(url, dest, e))?;
        Ok(written)
    }

    fn reset_session(&self) {
        match build_client(&self.user_agent, &self.referer) {
            Ok(fresh) => *self.client.write().unwrap() = fresh,
            Err(e) => tracing::warn!("could not rebuild http client: {:#}", e),
        }
    }
}
