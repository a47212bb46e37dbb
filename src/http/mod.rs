//! The HTTP gateway every client call goes through.

pub mod client;
pub mod memory;
pub mod paths;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::notify::{Notification, Notifier};

pub use client::ReqwestTransport;
pub use memory::MemoryBackend;

pub const GENERIC_FAILURE: &str = "An unexpected error occurred.";

/// One request against the API, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }
}

/// A response as seen by the gateway: status plus the decoded JSON body.
///
/// Bodies that are empty decode to `Value::Null`; bodies that are not JSON are
/// kept as `Value::String`.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The server's explanation for a failure, if it sent one.
    pub fn message(&self) -> Option<&str> {
        self.body
            .get("message")
            .or_else(|| self.body.get("error"))
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
    }

    fn into_error(self) -> ClientError {
        let message = self.message().unwrap_or(GENERIC_FAILURE).to_string();
        ClientError::Api {
            status: self.status,
            message,
        }
    }
}

/// Moves requests to a server and back. Cookies are the transport's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError>;
}

/// The single configured client shared by the session and the managers.
///
/// Failed responses are turned into one error notification and then returned
/// to the caller unchanged, so call sites can still react to them.
#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn Transport>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            transport,
            notifier,
        }
    }

    /// Gateway talking HTTP to the server named in `config`.
    pub fn connect(config: &ClientConfig, notifier: Arc<dyn Notifier>) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(&config.api_url, config.timeout())?;
        Ok(Self::new(Arc::new(transport), notifier))
    }

    pub fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// Send a request and decode a successful body into `T`.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let value = self.send(method.clone(), path, body).await?;
        serde_json::from_value(value).map_err(|e| {
            log::warn!("{} {}: undecodable response: {}", method, path, e);
            self.notifier.notify(Notification::error(GENERIC_FAILURE));
            ClientError::Decode(e.to_string())
        })
    }

    /// Send a request, notifying on any failure. Returns the response body.
    pub async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ClientError> {
        let result = self.send_quiet(method.clone(), path, body).await.and_then(|resp| {
            if resp.is_success() {
                Ok(resp.body)
            } else {
                Err(resp.into_error())
            }
        });

        if let Err(e) = &result {
            log::warn!("{} {} failed: {}", method, path, e);
            let message = match e {
                ClientError::Api { message, .. } => message.clone(),
                _ => GENERIC_FAILURE.to_string(),
            };
            self.notifier.notify(Notification::error(message));
        }
        result
    }

    /// Send a request without interception. Non-2xx statuses are not errors here.
    pub async fn send_quiet(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, ClientError> {
        log::debug!("{} {}", method, path);
        let resp = self
            .transport
            .send(ApiRequest::new(method.clone(), path, body))
            .await?;
        log::debug!("{} {} -> {}", method, path, resp.status);
        Ok(resp)
    }

    /// Like [`send_quiet`](Self::send_quiet) but maps non-2xx statuses to
    /// [`ClientError::Api`], still without notifying.
    pub async fn send_unnotified(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let resp = self.send_quiet(method, path, body).await?;
        if resp.is_success() {
            Ok(resp.body)
        } else {
            Err(resp.into_error())
        }
    }
}
