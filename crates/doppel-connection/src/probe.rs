// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP liveness probe: a GET that counts as healthy on any 2xx.

use std::time::Duration;

use doppel_core::{DoppelError, HealthStatus};

#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
    url: String,
    bearer_token: Option<String>,
}

impl HttpHealthProbe {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `Healthy` on 2xx, `Unhealthy` on any other status, `Err` when the
    /// endpoint cannot be reached at all.
    pub async fn check(&self, timeout: Duration) -> Result<HealthStatus, DoppelError> {
        let mut request = self.client.get(&self.url).timeout(timeout);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DoppelError::Timeout { duration: timeout }
            } else {
                DoppelError::Transport {
                    message: format!("health probe to {} failed", self.url),
                    source: Some(Box::new(e)),
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy(format!(
                "health endpoint answered {status}"
            )))
        }
    }
}
