//! Cooldown Controller Implementation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{AlertError, AlertEvent};

/// Dedup key shared by all channels when cooldown is global
pub const GLOBAL_KEY: &str = "all";

/// Summary label used for the global key
pub const ALL_CAMERAS_LABEL: &str = "all cameras";

/// Notification title for cooldown summaries
pub const SUMMARY_TITLE: &str = "Alerts Summary";

/// `cooldown` section of the configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownSettings {
    /// Window length in seconds, fractions allowed
    #[serde(alias = "time")]
    pub duration: f64,
    /// Track each channel separately instead of one global window
    #[serde(default, alias = "per_camera")]
    pub per_channel: bool,
    /// Send a summary of suppressed alerts when a window ends
    #[serde(default)]
    pub summarize: bool,
}

/// Validated cooldown policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownConfig {
    pub duration: Duration,
    pub per_channel: bool,
    pub summarize: bool,
}

impl CooldownConfig {
    /// Create a policy; the window must be non-zero
    pub fn new(duration: Duration, per_channel: bool, summarize: bool) -> Result<Self, AlertError> {
        if duration.is_zero() {
            return Err(AlertError::InvalidCooldown(
                "duration must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            duration,
            per_channel,
            summarize,
        })
    }
}

impl TryFrom<CooldownSettings> for CooldownConfig {
    type Error = AlertError;

    fn try_from(settings: CooldownSettings) -> Result<Self, Self::Error> {
        let seconds = settings.duration;
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(AlertError::InvalidCooldown(format!(
                "duration must be a positive number of seconds, got {}",
                seconds
            )));
        }
        let duration = Duration::try_from_secs_f64(seconds)
            .map_err(|e| AlertError::InvalidCooldown(format!("duration {}: {}", seconds, e)))?;

        Self::new(duration, settings.per_channel, settings.summarize)
    }
}

/// Outcome of registering an alert with the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Key was idle; notify now
    Deliver,
    /// Key is cooling down; the alert was buffered
    Suppress,
}

/// Emitted when a window that suppressed alerts expires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownSummary {
    pub key: String,
    pub label: String,
    pub count: usize,
    pub window: Duration,
}

impl CooldownSummary {
    pub fn title(&self) -> &'static str {
        SUMMARY_TITLE
    }

    pub fn message(&self) -> String {
        format!(
            "{} alerts seen on {} in the last {} seconds",
            self.count,
            self.label,
            self.window.as_secs_f64()
        )
    }
}

/// Runtime state of one cooling-down key
#[derive(Debug)]
struct CooldownEntry {
    key: String,
    label: String,
    suppressed: Vec<AlertEvent>,
    expires_at: Instant,
    /// Distinguishes this entry from later ones on the same key
    epoch: u64,
    timer: AbortHandle,
}

type EntryMap = Arc<Mutex<HashMap<String, CooldownEntry>>>;

/// Per-key cooldown state machine (`Idle` / `CoolingDown`)
///
/// Expiry timers and [`register`](Self::register) serialize on the same
/// lock, so a buffered alert is never lost to a concurrent expiry.
pub struct CooldownController {
    config: CooldownConfig,
    entries: EntryMap,
    summaries: mpsc::UnboundedSender<CooldownSummary>,
    next_epoch: AtomicU64,
}

impl CooldownController {
    /// Create a controller that reports summaries on `summaries`
    pub fn new(config: CooldownConfig, summaries: mpsc::UnboundedSender<CooldownSummary>) -> Self {
        info!(
            "Creating cooldown controller: duration={:?}, per_channel={}, summarize={}",
            config.duration,
            config.per_channel,
            config.summarize
        );
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
            summaries,
            next_epoch: AtomicU64::new(0),
        }
    }

    /// Create a controller together with its summary receiver
    pub fn channel(config: CooldownConfig) -> (Self, mpsc::UnboundedReceiver<CooldownSummary>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(config, tx), rx)
    }

    /// Dedup key for an event under the configured policy
    pub fn key_for(&self, event: &AlertEvent) -> String {
        if self.config.per_channel {
            event.channel().to_string()
        } else {
            GLOBAL_KEY.to_string()
        }
    }

    /// Register an alert, arming a new window if its key is idle
    pub async fn register(&self, event: AlertEvent) -> Decision {
        let key = self.key_for(&event);
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get_mut(&key) {
            debug!(
                "Not sending alert, cooldown active for \"{}\" ({:?} left)",
                key,
                entry.expires_at.saturating_duration_since(Instant::now())
            );
            entry.suppressed.push(event);
            return Decision::Suppress;
        }

        let label = if self.config.per_channel {
            event.source_label().to_string()
        } else {
            ALL_CAMERAS_LABEL.to_string()
        };
        let epoch = self.next_epoch.fetch_add(1, Ordering::Relaxed);
        let expires_at = Instant::now() + self.config.duration;
        let timer = self.arm(key.clone(), epoch, expires_at);

        debug!("Cooldown started for \"{}\" ({})", key, label);
        entries.insert(
            key.clone(),
            CooldownEntry {
                key,
                label,
                suppressed: Vec::new(),
                expires_at,
                epoch,
                timer,
            },
        );

        Decision::Deliver
    }

    /// Whether `key` is currently cooling down
    pub async fn is_active(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    /// Keys currently cooling down, sorted
    pub async fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of alerts buffered for `key`, if it is cooling down
    pub async fn suppressed_count(&self, key: &str) -> Option<usize> {
        self.entries
            .lock()
            .await
            .get(key)
            .map(|entry| entry.suppressed.len())
    }

    /// Cancel every armed timer and forget all windows
    pub async fn shutdown(&self) {
        let mut entries = self.entries.lock().await;
        let cancelled = entries.len();
        for (_, entry) in entries.drain() {
            entry.timer.abort();
        }
        info!("Cooldown controller stopped, {} timers cancelled", cancelled);
    }

    fn arm(&self, key: String, epoch: u64, expires_at: Instant) -> AbortHandle {
        let entries = Arc::clone(&self.entries);
        let summaries = self.summaries.clone();
        let summarize = self.config.summarize;
        let window = self.config.duration;

        tokio::spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            expire(entries, key, epoch, summarize, window, summaries).await;
        })
        .abort_handle()
    }
}

impl Drop for CooldownController {
    fn drop(&mut self) {
        if let Ok(mut entries) = self.entries.try_lock() {
            for (_, entry) in entries.drain() {
                entry.timer.abort();
            }
        }
    }
}

async fn expire(
    entries: EntryMap,
    key: String,
    epoch: u64,
    summarize: bool,
    window: Duration,
    summaries: mpsc::UnboundedSender<CooldownSummary>,
) {
    let entry = {
        let mut entries = entries.lock().await;
        let current = entries.get(&key).map_or(false, |entry| entry.epoch == epoch);
        if current {
            entries.remove(&key)
        } else {
            None
        }
    };
    let Some(entry) = entry else {
        return;
    };

    let count = entry.suppressed.len();
    debug!(
        "Coming off cooldown for \"{}\" ({}), {} events seen",
        entry.key, entry.label, count
    );

    if !summarize || count == 0 {
        return;
    }

    let summary = CooldownSummary {
        key: entry.key,
        label: entry.label,
        count,
        window,
    };
    if summaries.send(summary).is_err() {
        debug!("Summary receiver closed, dropping cooldown summary");
    }
}
