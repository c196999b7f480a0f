//! Pushover Notifier

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Notifier, NotifyError};

/// Public Pushover API root
pub const DEFAULT_API_URL: &str = "https://api.pushover.net";

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

/// `pushover` section of the configuration document
///
/// `user` and `token` may be given as `${ENV_VAR}` references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushoverConfig {
    /// User or group key
    pub user: String,
    /// Application API token
    pub token: String,
    /// Restrict delivery to one device
    #[serde(default)]
    pub device: Option<String>,
    /// Message priority (-2..=2)
    #[serde(default)]
    pub priority: Option<i8>,
    /// Notification sound name
    #[serde(default)]
    pub sound: Option<String>,
    /// API root, overridable for testing
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

/// Body returned by the messages endpoint
#[derive(Debug, Deserialize)]
struct PushoverResponse {
    status: i64,
    #[serde(default)]
    request: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

fn resolve_secret(field: &str, value: &str) -> Result<String, NotifyError> {
    let resolved = match value.strip_prefix("${") {
        Some(rest) => {
            let var_name = rest.strip_suffix('}').ok_or_else(|| {
                NotifyError::Config(format!("Malformed env var reference for {}: {}", field, value))
            })?;
            std::env::var(var_name).map_err(|_| {
                NotifyError::Config(format!("Environment variable '{}' is not set", var_name))
            })?
        }
        None => value.to_string(),
    };

    if resolved.trim().is_empty() {
        return Err(NotifyError::Config(format!("Pushover {} must not be empty", field)));
    }
    Ok(resolved)
}

/// Sends notifications through the Pushover messages API
#[derive(Debug)]
pub struct PushoverNotifier {
    user: String,
    token: String,
    device: Option<String>,
    priority: Option<i8>,
    sound: Option<String>,
    endpoint: String,
    client: reqwest::Client,
}

impl PushoverNotifier {
    /// Build a notifier, resolving credential references
    pub fn new(config: PushoverConfig) -> Result<Self, NotifyError> {
        let user = resolve_secret("user", &config.user)?;
        let token = resolve_secret("token", &config.token)?;

        if let Some(priority) = config.priority {
            if !(-2..=2).contains(&priority) {
                return Err(NotifyError::Config(format!(
                    "Pushover priority {} is outside -2..=2",
                    priority
                )));
            }
        }

        let endpoint = format!("{}/1/messages.json", config.api_url.trim_end_matches('/'));
        info!("Pushover notifier configured for {}", endpoint);

        Ok(Self {
            user,
            token,
            device: config.device,
            priority: config.priority,
            sound: config.sound,
            endpoint,
            client: reqwest::Client::new(),
        })
    }

    fn form(&self, title: &str, message: &str) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("token", self.token.clone()),
            ("user", self.user.clone()),
            ("title", title.to_string()),
            ("message", message.to_string()),
        ];
        if let Some(device) = &self.device {
            form.push(("device", device.clone()));
        }
        if let Some(priority) = self.priority {
            form.push(("priority", priority.to_string()));
        }
        if let Some(sound) = &self.sound {
            form.push(("sound", sound.clone()));
        }
        form
    }
}

#[async_trait::async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, title: &str, message: &str) -> Result<(), NotifyError> {
        debug!(title, "Sending Pushover notification");

        let response = self
            .client
            .post(&self.endpoint)
            .form(&self.form(title, message))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let parsed: Option<PushoverResponse> = serde_json::from_str(&body).ok();

        if let Some(reply) = parsed.as_ref().filter(|r| status.is_success() && r.status == 1) {
            debug!(request = ?reply.request, "Pushover accepted notification");
            return Ok(());
        }

        let reason = match parsed {
            Some(reply) if !reply.errors.is_empty() => reply.errors.join("; "),
            _ => format!("unexpected response: {}", body.trim()),
        };

        Err(NotifyError::Rejected {
            status: status.as_u16(),
            reason,
        })
    }

    fn channel_name(&self) -> &str {
        "pushover"
    }
}
