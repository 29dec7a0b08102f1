use super::{DriveAdapter, DriveWrite, WriteOutcome};
use crate::config::RemoteConfig;
use crate::error::{NotepadError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// A drive that mirrors writes to an HTTP endpoint.
///
/// Each write is a `POST` of `{ "id", "path", "json" }`. Transport errors and
/// non-2xx responses come back as [`WriteOutcome::Failed`].
pub struct RemoteDrive {
    name: String,
    endpoint: String,
    client: Client,
}

impl RemoteDrive {
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotepadError::Remote(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn from_config(config: &RemoteConfig, timeout: Duration) -> Result<Self> {
        Self::new(&config.name, &config.endpoint, timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DriveAdapter for RemoteDrive {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, write: &DriveWrite) -> WriteOutcome {
        let body = json!({
            "id": write.id,
            "path": write.path,
            "json": write.json,
        });
        match self.client.post(&self.endpoint).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!(drive = %self.name, id = %write.id, "remote write ok");
                WriteOutcome::Ok
            }
            Ok(resp) => {
                let error = format!("HTTP {}", resp.status());
                warn!(drive = %self.name, id = %write.id, %error, "remote write rejected");
                WriteOutcome::failed(error)
            }
            Err(err) => {
                warn!(drive = %self.name, id = %write.id, error = %err, "remote write failed");
                WriteOutcome::failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_failure_not_error() {
        let drive = RemoteDrive::new(
            "mirror",
            "http://127.0.0.1:9/ingest",
            Duration::from_secs(2),
        )
        .unwrap();
        let outcome = drive
            .write(&DriveWrite::new("r1", serde_json::json!({"a": 1})))
            .await;
        assert!(matches!(outcome, WriteOutcome::Failed { .. }));
        assert_eq!(drive.name(), "mirror");
    }
}
