//! Slack incoming-webhook notifier.

#![allow(missing_docs)]

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;
use tracing::debug;

use super::{Notifier, render};
use crate::core::config::SlackConfig;
use crate::core::errors::{Result, UwError};
use crate::units::model::Transition;

const POST_TIMEOUT: Duration = Duration::from_secs(10);

/// Body accepted by Slack incoming webhooks.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SlackMessage<'a> {
    pub channel: &'a str,
    pub username: &'a str,
    pub icon_url: &'a str,
    pub text: String,
}

#[derive(Debug)]
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
    config: SlackConfig,
}

impl SlackNotifier {
    /// Build a notifier for `config`. Requires `config.webhook_url`.
    pub fn new(config: SlackConfig) -> Result<Self> {
        let webhook_url = match config.webhook_url.as_deref() {
            Some(url) if url.starts_with("https://") || url.starts_with("http://") => {
                url.to_string()
            }
            Some(url) => {
                return Err(UwError::InvalidConfig {
                    details: format!("webhook url must be http(s), got {url:?}"),
                });
            }
            None => {
                return Err(UwError::InvalidConfig {
                    details: "slack webhook url is not set".to_string(),
                });
            }
        };
        let client = Client::builder()
            .timeout(POST_TIMEOUT)
            .build()
            .map_err(|err| UwError::Delivery {
                channel: "slack",
                details: format!("client setup failed: {err}"),
            })?;
        Ok(Self {
            client,
            webhook_url,
            config,
        })
    }

    #[must_use]
    pub fn message(&self, transition: &Transition) -> SlackMessage<'_> {
        SlackMessage {
            channel: &self.config.channel,
            username: &self.config.username,
            icon_url: &self.config.icon_url,
            text: render(transition),
        }
    }
}

impl Notifier for SlackNotifier {
    fn post(&mut self, transition: &Transition) -> Result<()> {
        let message = self.message(transition);
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .map_err(|err| UwError::Delivery {
                channel: "slack",
                details: err.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(UwError::Delivery {
                channel: "slack",
                details: format!("webhook answered {status}: {}", body.trim()),
            });
        }
        debug!(unit = %transition.unit.name, "posted to slack");
        Ok(())
    }
}
