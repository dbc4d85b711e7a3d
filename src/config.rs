use std::{str::FromStr, time::Duration};

use rand::Rng;

use crate::{error::ConfigError, image::DEFAULT_MAX_IMAGE_BYTES};

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_url: String,
    pub push_url: String,
    pub max_image_bytes: usize,
    pub reconnect: ReconnectPolicy,
    pub refresh_contacts_on_presence: bool,
    pub event_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            push_url: push_url_for(DEFAULT_API_URL),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            reconnect: ReconnectPolicy::default(),
            refresh_contacts_on_presence: true,
            event_capacity: 256,
        }
    }
}

impl ChatConfig {
    /// Reads `CHAT_*` variables, honouring a `.env` file if one is present.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ChatConfig::default();
        let api_url = lookup("CHAT_API_URL")
            .map(|url| url.trim_end_matches('/').to_owned())
            .unwrap_or(defaults.api_url);
        let push_url = lookup("CHAT_PUSH_URL").unwrap_or_else(|| push_url_for(&api_url));

        let reconnect = ReconnectPolicy {
            max_attempts: parse(&lookup, "CHAT_RECONNECT_ATTEMPTS", defaults.reconnect.max_attempts)?,
            initial_delay: Duration::from_millis(parse(
                &lookup,
                "CHAT_RECONNECT_INITIAL_MS",
                defaults.reconnect.initial_delay.as_millis() as u64,
            )?),
            max_delay: Duration::from_millis(parse(
                &lookup,
                "CHAT_RECONNECT_MAX_MS",
                defaults.reconnect.max_delay.as_millis() as u64,
            )?),
            stable_after: Duration::from_millis(parse(
                &lookup,
                "CHAT_RECONNECT_STABLE_MS",
                defaults.reconnect.stable_after.as_millis() as u64,
            )?),
        };

        let event_capacity = parse(&lookup, "CHAT_EVENT_CAPACITY", defaults.event_capacity)?;
        if event_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "CHAT_EVENT_CAPACITY",
                value: "0".to_owned(),
            });
        }

        Ok(Self {
            api_url,
            push_url,
            max_image_bytes: parse(&lookup, "CHAT_MAX_IMAGE_BYTES", defaults.max_image_bytes)?,
            reconnect,
            refresh_contacts_on_presence: parse(
                &lookup,
                "CHAT_REFRESH_ON_PRESENCE",
                defaults.refresh_contacts_on_presence,
            )?,
            event_capacity,
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

/// `http://host/api` becomes `ws://host/api/ws`.
pub fn push_url_for(api_url: &str) -> String {
    let base = api_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_owned()
    };
    format!("{base}/ws")
}

/// Bounded exponential backoff for the presence channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// How long a connection must stay up, delivering events, before its
    /// loss stops counting toward `max_attempts`.
    pub stable_after: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            stable_after: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based), jittered by up to 20%.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let base = self
            .initial_delay
            .saturating_mul(1 << shift)
            .min(self.max_delay);
        let jitter = base.as_millis() as u64 / 5;
        if jitter == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter))
    }

    /// Whether a connection that was up for `uptime` earned a fresh
    /// attempt budget.
    pub fn was_stable(&self, uptime: Duration, delivered: bool) -> bool {
        delivered && uptime >= self.stable_after
    }
}
