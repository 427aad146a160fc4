use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::config::HttpSettings;
use crate::error::HubError;

pub const BODY_PREVIEW_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct SessionProfile {
    pub timeout: Duration,
    pub connect_timeout: Option<Duration>,
    pub bearer_token: Option<String>,
}

impl SessionProfile {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            connect_timeout: None,
            bearer_token: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn preview(&self) -> &str {
        body_preview(&self.body, BODY_PREVIEW_CHARS)
    }

    pub fn into_success(self, url: &str) -> Result<Self, HubError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(HubError::Status {
            url: url.to_string(),
            status: self.status,
            message: self.preview().to_string(),
        })
    }

    pub fn json(&self, url: &str) -> Result<Value, HubError> {
        serde_json::from_str(&self.body).map_err(|err| HubError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

pub fn body_preview(body: &str, limit: usize) -> &str {
    match body.char_indices().nth(limit) {
        Some((index, _)) => &body[..index],
        None => body,
    }
}

pub async fn get_json(session: &dyn HttpSession, url: &str) -> Result<Value, HubError> {
    session.get(url).await?.into_success(url)?.json(url)
}

#[async_trait]
pub trait HttpSession: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, HubError>;
}

pub trait HttpBackend: Send + Sync {
    fn open(&self, profile: &SessionProfile) -> Result<Box<dyn HttpSession>, HubError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    settings: HttpSettings,
}

impl ReqwestBackend {
    pub fn new(settings: HttpSettings) -> Self {
        Self { settings }
    }
}

impl HttpBackend for ReqwestBackend {
    fn open(&self, profile: &SessionProfile) -> Result<Box<dyn HttpSession>, HubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.settings.user_agent)
                .map_err(|err| HubError::HttpClient(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = &profile.bearer_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|err| HubError::HttpClient(err.to_string()))?,
            );
        }
        let mut builder = Client::builder()
            .default_headers(headers)
            .timeout(profile.timeout);
        if let Some(connect_timeout) = profile.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder
            .build()
            .map_err(|err| HubError::HttpClient(err.to_string()))?;
        Ok(Box::new(ReqwestSession {
            client,
            max_retries: self.settings.max_retries,
            retry_delay: self.settings.retry_delay,
        }))
    }
}

struct ReqwestSession {
    client: Client,
    max_retries: u32,
    retry_delay: Duration,
}

#[async_trait]
impl HttpSession for ReqwestSession {
    async fn get(&self, url: &str) -> Result<RawResponse, HubError> {
        let mut attempt = 0u32;
        loop {
            tracing::debug!(url, attempt, "GET");
            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        tokio::time::sleep(self.retry_delay * (attempt + 1)).await;
                        attempt += 1;
                        continue;
                    }
                    let body = resp.text().await.map_err(|err| HubError::Transport {
                        url: url.to_string(),
                        message: err.to_string(),
                    })?;
                    return Ok(RawResponse { status, body });
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        tokio::time::sleep(self.retry_delay * (attempt + 1)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(HubError::Transport {
                        url: url.to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

// Timed-out requests are never repeated.
fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() && !err.is_timeout()
}
