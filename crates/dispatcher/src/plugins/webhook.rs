//! WebhookPlugin - chat notifications for running/stopped resources
//!
//! Posts a Slack-compatible incoming-webhook message for containers and
//! services entering `running`, `stopped`, `active` or `inactive`. Other
//! states are ignored. Messages over the rate limit are dropped, not queued.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use contracts::{ContractError, Event, EventKind, HealthState, InstanceState, Plugin};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// Kinds the webhook plugin is registered for
pub const WEBHOOK_KINDS: [EventKind; 2] = [EventKind::Container, EventKind::Service];

const NEUTRAL_COLOR: &str = "#CFCDC9";
const GOOD_COLOR: &str = "#99CC99";
const BAD_COLOR: &str = "#F2777A";

/// Configuration for WebhookPlugin
#[derive(Debug, Clone)]
pub struct WebhookPluginConfig {
    /// Incoming webhook URL; required before `init`
    pub url: Option<String>,
    pub channel: Option<String>,
    pub username: String,
    pub icon: String,
    /// One message token is refilled every `rate_period`
    pub rate_period: Duration,
    /// Token bucket size
    pub rate_burst: NonZeroU32,
    pub timeout: Duration,
}

impl Default for WebhookPluginConfig {
    fn default() -> Self {
        Self {
            url: None,
            channel: None,
            username: "eventbridge".to_string(),
            icon: ":mega:".to_string(),
            rate_period: Duration::from_secs(5),
            rate_burst: NonZeroU32::MIN.saturating_add(9),
            timeout: Duration::from_secs(10),
        }
    }
}

impl WebhookPluginConfig {
    /// Create config from params map
    ///
    /// # Errors
    /// Returns `ConfigValidation` for unparsable numeric params.
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ContractError> {
        let mut config = Self {
            url: params
                .get("url")
                .or_else(|| params.get("webhookurl"))
                .cloned(),
            channel: params.get("channel").cloned(),
            ..Self::default()
        };

        if let Some(username) = params.get("username") {
            config.username = username.clone();
        }
        if let Some(icon) = params.get("icon") {
            config.icon = icon.clone();
        }
        if let Some(secs) = params.get("rate_period_secs") {
            config.rate_period = Duration::from_secs(parse_param("rate_period_secs", secs)?);
        }
        if let Some(burst) = params.get("rate_burst") {
            config.rate_burst = parse_param("rate_burst", burst)?;
        }
        if let Some(secs) = params.get("timeout_secs") {
            config.timeout = Duration::from_secs(parse_param("timeout_secs", secs)?);
        }
        Ok(config)
    }
}

fn parse_param<T>(field: &str, value: &str) -> Result<T, ContractError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ContractError::config_validation(format!("params.{field}"), format!("{e}")))
}

/// Whether a resource entering `state` is worth a notification
pub fn should_notify(state: InstanceState) -> bool {
    matches!(
        state,
        InstanceState::Running
            | InstanceState::Stopped
            | InstanceState::Active
            | InstanceState::Inactive
    )
}

/// Attachment color for a state and health pair
///
/// Stopped resources are grey. Running resources take their health color
/// and fall back to green.
pub fn message_color(state: InstanceState, health: HealthState) -> &'static str {
    match state {
        InstanceState::Running | InstanceState::Active => match health {
            HealthState::Healthy => GOOD_COLOR,
            HealthState::Unhealthy | HealthState::Degraded => BAD_COLOR,
            _ => GOOD_COLOR,
        },
        _ => NEUTRAL_COLOR,
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<&'a str>,
    icon_emoji: &'a str,
    attachments: [Attachment; 1],
}

#[derive(Debug, Serialize)]
struct Attachment {
    pretext: &'static str,
    text: String,
    fallback: String,
    color: &'static str,
    mrkdwn_in: [&'static str; 2],
    fields: [Field; 2],
}

#[derive(Debug, Serialize)]
struct Field {
    title: &'static str,
    value: String,
    short: bool,
}

/// Plugin posting resource state changes to a chat webhook
pub struct WebhookPlugin {
    name: String,
    config: WebhookPluginConfig,
    client: reqwest::Client,
    limiter: DefaultDirectRateLimiter,
}

impl WebhookPlugin {
    /// Create a new WebhookPlugin
    ///
    /// # Errors
    /// Fails if the rate period is zero or the HTTP client cannot be built.
    pub fn new(name: impl Into<String>, config: WebhookPluginConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let quota = Quota::with_period(config.rate_period)
            .ok_or_else(|| {
                ContractError::config_validation("params.rate_period_secs", "must be > 0")
            })?
            .allow_burst(config.rate_burst);

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ContractError::plugin_init(&name, e.to_string()))?;

        Ok(Self {
            name,
            config,
            client,
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        Self::new(name, WebhookPluginConfig::from_params(params)?)
    }

    fn message<'a>(&'a self, event: &Event) -> Message<'a> {
        let state = event.state();
        let health = event.health_state();
        Message {
            username: &self.config.username,
            channel: self.config.channel.as_deref(),
            icon_emoji: &self.config.icon,
            attachments: [Attachment {
                pretext: "Resource change event",
                text: format!(
                    "{} `{}` @`{}`",
                    event.kind(),
                    event.name(),
                    event.timestamp.format("%Y-%m-%d %H:%M:%S")
                ),
                fallback: event.to_string(),
                color: message_color(state, health),
                mrkdwn_in: ["text", "fields"],
                fields: [
                    Field {
                        title: "State",
                        value: format!("`{state}`"),
                        short: true,
                    },
                    Field {
                        title: "Health",
                        value: format!("`{health}`"),
                        short: true,
                    },
                ],
            }],
        }
    }
}

#[async_trait]
impl Plugin for WebhookPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<(), ContractError> {
        match self.config.url.as_deref() {
            Some(url) if !url.is_empty() => {
                debug!(plugin = %self.name, "WebhookPlugin ready");
                Ok(())
            }
            _ => Err(ContractError::plugin_init(
                &self.name,
                "missing 'url' parameter",
            )),
        }
    }

    #[instrument(
        name = "webhook_plugin_process",
        skip(self, event),
        fields(plugin = %self.name, event_id = %event.id)
    )]
    async fn process(&self, event: &Event) -> Result<(), ContractError> {
        if !should_notify(event.state()) {
            return Ok(());
        }

        if self.limiter.check().is_err() {
            warn!(plugin = %self.name, event_id = %event.id, "rate limit exceeded, dropping notification");
            return Ok(());
        }

        let url = self
            .config
            .url
            .as_deref()
            .ok_or_else(|| ContractError::plugin_process(&self.name, "plugin is not initialized"))?;

        self.client
            .post(url)
            .json(&self.message(event))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ContractError::plugin_process(&self.name, e.to_string()))?;

        debug!(plugin = %self.name, event_id = %event.id, "notification sent");
        Ok(())
    }

    async fn close(&self) -> Result<(), ContractError> {
        Ok(())
    }
}
