use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

/// One alarm delivery target.
#[async_trait]
pub trait AlarmChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, message: &str) -> anyhow::Result<()>;
}

/// Channel that emits alarms into the tracing log. Always available as the
/// default delivery target.
pub struct LogAlarmChannel;

#[async_trait]
impl AlarmChannel for LogAlarmChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, message: &str) -> anyhow::Result<()> {
        info!(target: "splitrecon::alarm", "{message}");
        Ok(())
    }
}

/// Channel that posts alarms to a configured webhook as a JSON payload.
pub struct WebhookAlarmChannel {
    url: String,
    client: reqwest::Client,
}

impl WebhookAlarmChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AlarmChannel for WebhookAlarmChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, message: &str) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": message }))
            .send()
            .await?;
        response.error_for_status()?;
        Ok(())
    }
}

/// Alarm fan-out over the configured channels.
///
/// Each channel's failure is isolated: a failing webhook never suppresses
/// delivery to the log or to any other channel.
pub struct AlarmService {
    channels: Vec<Arc<dyn AlarmChannel>>,
}

impl AlarmService {
    /// The log channel is always present.
    pub fn new() -> Self {
        Self {
            channels: vec![Arc::new(LogAlarmChannel)],
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn AlarmChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub async fn send_alarm(&self, message: &str) {
        for channel in &self.channels {
            if let Err(e) = channel.send(message).await {
                error!(channel = channel.name(), "alarm delivery failed: {e:?}");
            }
        }
    }

    pub async fn send_recon_alarm(&self, order_no: &str, merchant_id: &str, message: &str) {
        let full = format!(
            "[recon alarm] order_no: {order_no}, merchant_id: {merchant_id}, message: {message}"
        );
        self.send_alarm(&full).await;
    }
}

impl Default for AlarmService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingChannel {
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl AlarmChannel for CountingChannel {
        fn name(&self) -> &str {
            "counting"
        }

        async fn send(&self, _message: &str) -> anyhow::Result<()> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingChannel;

    #[async_trait]
    impl AlarmChannel for FailingChannel {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(&self, _message: &str) -> anyhow::Result<()> {
            anyhow::bail!("channel down")
        }
    }

    #[tokio::test]
    async fn failing_channel_does_not_block_the_others() {
        let counting = Arc::new(CountingChannel {
            delivered: AtomicUsize::new(0),
        });
        let service = AlarmService::new()
            .with_channel(Arc::new(FailingChannel))
            .with_channel(counting.clone());

        service.send_alarm("settlement mismatch").await;
        assert_eq!(counting.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recon_alarm_carries_order_context() {
        let service = AlarmService::new();
        // Delivers through the log channel; just ensure it does not panic.
        service.send_recon_alarm("ORD-1", "SELF", "amount mismatch").await;
    }
}
