use std::time::Duration;

use anyhow::{Context, Result};
use buildmon_core::{models::BuildEvent, traits::EventSink};

/// Posts each build event as a JSON document to a configured endpoint.
pub struct HttpEventSink {
    client: reqwest::Client,
    url: String,
}

impl HttpEventSink {
    pub fn new(url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build event sink HTTP client")?;
        Ok(Self { client, url })
    }
}

impl EventSink for HttpEventSink {
    async fn publish(&self, event: BuildEvent) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&event)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("Failed to publish event for {}", event.slug))?;
        Ok(())
    }
}
