//! Valkey pub/sub transport.
//!
//! Tasks arrive on `websoft9:agent:{id}:tasks`. Results and metrics are
//! published to their own channels; the heartbeat is a key that expires
//! after several missed beats.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fred::prelude::*;
use fred::types::Message;
use tokio::sync::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use websoft9_common::{
    Heartbeat, MetricsReport, Task, TaskResult, heartbeat_key, metrics_channel, results_channel,
    tasks_channel, ttl, validate_agent_id,
};

use crate::application::ports::Transport;
use crate::domain::config::ValkeySection;

pub struct ValkeyTransport {
    agent_id: String,
    publisher: Client,
    subscriber: Client,
    messages: Mutex<broadcast::Receiver<Message>>,
    heartbeat_ttl_secs: u64,
}

impl ValkeyTransport {
    /// Connect, verify the server with PING and subscribe to the task channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the agent id is invalid, the password file cannot
    /// be read, or the server is unreachable.
    pub async fn connect(
        section: &ValkeySection,
        agent_id: &str,
        heartbeat_interval_secs: u64,
    ) -> Result<Self> {
        validate_agent_id(agent_id).map_err(|e| anyhow::anyhow!("invalid agent id: {e}"))?;

        let mut config = Config::from_url(&section.url).context("invalid valkey.url")?;
        config.username.clone_from(&section.username);
        if let Some(path) = &section.password_file {
            let password = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            config.password = Some(password.trim().to_string());
        }

        let publisher = Builder::from_config(config)
            .with_connection_config(|conn_config| {
                conn_config.connection_timeout = Duration::from_secs(5);
                conn_config.internal_command_timeout = Duration::from_secs(10);
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 100, 5000, 5))
            .build()?;
        publisher.init().await?;
        publisher
            .ping::<String>(None)
            .await
            .context("Valkey startup PING failed")?;

        let subscriber = publisher.clone_new();
        subscriber.init().await?;
        let messages = subscriber.message_rx();
        let channel = tasks_channel(agent_id);
        subscriber
            .subscribe(channel.clone())
            .await
            .with_context(|| format!("failed to subscribe to {channel}"))?;

        info!(%agent_id, %channel, "Valkey transport ready");
        Ok(Self {
            agent_id: agent_id.to_string(),
            publisher,
            subscriber,
            messages: Mutex::new(messages),
            heartbeat_ttl_secs: ttl::heartbeat_secs(heartbeat_interval_secs),
        })
    }

    /// Close both connections.
    pub async fn close(&self) {
        if let Err(e) = self.subscriber.quit().await {
            debug!(error = %e, "subscriber quit failed");
        }
        if let Err(e) = self.publisher.quit().await {
            debug!(error = %e, "publisher quit failed");
        }
    }

    async fn publish_json<T: serde::Serialize + Sync>(&self, channel: String, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let receivers: i64 = self
            .publisher
            .publish(channel.as_str(), json)
            .await
            .with_context(|| format!("failed to publish to {channel}"))?;
        if receivers == 0 {
            debug!(%channel, "published with no subscribers");
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for ValkeyTransport {
    async fn next_task(&self) -> Result<Option<Task>> {
        let mut messages = self.messages.lock().await;
        loop {
            match messages.recv().await {
                Ok(message) => {
                    let Some(payload) = message.value.as_str() else {
                        warn!("discarding non-text task message");
                        continue;
                    };
                    match serde_json::from_str::<Task>(&payload) {
                        Ok(task) => return Ok(Some(task)),
                        Err(e) => warn!(error = %e, "discarding malformed task payload"),
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "task subscriber lagged, messages dropped");
                }
                Err(RecvError::Closed) => return Ok(None),
            }
        }
    }

    async fn send_result(&self, result: &TaskResult) -> Result<()> {
        self.publish_json(results_channel(&self.agent_id), result).await
    }

    async fn send_heartbeat(&self, heartbeat: &Heartbeat) -> Result<()> {
        let json = serde_json::to_string(heartbeat)?;
        #[allow(clippy::cast_possible_wrap)]
        let ttl = self.heartbeat_ttl_secs as i64;
        self.publisher
            .set::<(), _, _>(
                heartbeat_key(&self.agent_id),
                json,
                Some(Expiration::EX(ttl)),
                None,
                false,
            )
            .await
            .context("failed to write heartbeat")?;
        Ok(())
    }

    async fn send_metrics(&self, report: &MetricsReport) -> Result<()> {
        self.publish_json(metrics_channel(&self.agent_id), report).await
    }
}
