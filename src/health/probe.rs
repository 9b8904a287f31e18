//! Endpoint probing.
//!
//! # Responsibilities
//! - Send one bounded HTTP request to an endpoint
//! - Report the status code, a timeout, a transport error or cancellation
//!
//! Classifying the outcome (2xx or not) is left to the caller.

use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::{header, StatusCode};
use thiserror::Error;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::{ProbeConfig, ProbeMethod};
use crate::pool::endpoint::Endpoint;

const USER_AGENT: &str = concat!("chain-view-probe/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("probe cancelled")]
    Cancelled,
}

/// Checks one endpoint on behalf of a worker.
pub trait Prober: Send + Sync + std::fmt::Debug {
    /// Returns the status code the endpoint answered with.
    fn check<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<StatusCode, ProbeError>>;
}

/// HTTP client used for every probe of every pool.
#[derive(Debug, Clone)]
pub struct HttpProber {
    client: reqwest::Client,
    method: ProbeMethod,
    body: Option<String>,
}

impl HttpProber {
    pub fn new(config: &ProbeConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        Ok(Self {
            client,
            method: config.method,
            body: config.body.clone(),
        })
    }

    /// Probe `endpoint` with the configured request shape.
    pub async fn probe(
        &self,
        endpoint: &Endpoint,
        cancel: &CancellationToken,
    ) -> Result<StatusCode, ProbeError> {
        let body = match self.method {
            ProbeMethod::Post => self.body.as_deref(),
            ProbeMethod::Get => None,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
            result = self.send(endpoint, self.method, body) => result,
        }
    }

    /// POST `body` to `endpoint`, or send the configured probe when `body` is `None`.
    pub async fn request(
        &self,
        endpoint: &Endpoint,
        body: Option<&str>,
    ) -> Result<StatusCode, ProbeError> {
        match body {
            Some(body) => self.send(endpoint, ProbeMethod::Post, Some(body)).await,
            None => self.probe(endpoint, &CancellationToken::new()).await,
        }
    }

    async fn send(
        &self,
        endpoint: &Endpoint,
        method: ProbeMethod,
        body: Option<&str>,
    ) -> Result<StatusCode, ProbeError> {
        let url = endpoint.address().clone();
        let request = match method {
            ProbeMethod::Get => self.client.get(url),
            ProbeMethod::Post => {
                let request = self.client.post(url);
                match body {
                    Some(body) => request
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(body.to_owned()),
                    None => request,
                }
            }
        };

        let timeout = endpoint.timeout();
        match time::timeout(timeout, request.send()).await {
            Ok(Ok(response)) => {
                let status = response.status();
                tracing::debug!(endpoint = %endpoint.name(), status = %status, "Probe answered");
                Ok(status)
            }
            Ok(Err(e)) => Err(ProbeError::Transport(e)),
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }
}

impl Prober for HttpProber {
    fn check<'a>(
        &'a self,
        endpoint: &'a Endpoint,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<StatusCode, ProbeError>> {
        Box::pin(self.probe(endpoint, cancel))
    }
}
