//! Network infrastructure: implements `NetworkProbe` for HTTP and TCP health checks.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::application::ports::NetworkProbe;

/// Production probe backed by a shared `reqwest::Client` and tokio sockets.
#[derive(Debug, Clone)]
pub struct HttpNetworkProbe {
    client: reqwest::Client,
}

impl HttpNetworkProbe {
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("websoft9-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NetworkProbe for HttpNetworkProbe {
    async fn http_status(&self, url: &str, timeout: Duration) -> Result<u16> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        Ok(response.status().as_u16())
    }

    async fn tcp_connect(&self, target: &str, timeout: Duration) -> Result<bool> {
        match tokio::time::timeout(timeout, tokio::net::TcpStream::connect(target)).await {
            Ok(Ok(_stream)) => Ok(true),
            Ok(Err(_)) => Ok(false),
            Err(_) => anyhow::bail!("connect to {target} timed out after {}s", timeout.as_secs()),
        }
    }
}
