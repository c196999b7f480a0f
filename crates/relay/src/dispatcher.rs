//! Alert Dispatcher
//!
//! Applies schedule and cooldown policy to each incoming alert and hands
//! survivors to the notifier. Notifications are sent on their own task, so a
//! slow or failing push service never stalls alert processing.

use alerting::{AlertEvent, CooldownController, CooldownSummary, Decision};
use notifier::Notifier;
use schedule::ScheduleResolver;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

const MOTION_ALARM: &str = "Motion Alarm";

/// What happened to a dispatched alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Handed to the notifier
    Delivered,
    /// Outside the channel's schedule window
    OffDuty,
    /// Absorbed by an active cooldown
    Suppressed,
}

/// Notification title for an alarm kind
pub fn alarm_title(kind: &str) -> String {
    match kind {
        MOTION_ALARM => "Motion detected".to_string(),
        other => other.to_string(),
    }
}

/// One-line description of an alert
pub fn describe(event: &AlertEvent) -> String {
    format!(
        "{} {} (channel {})",
        event.kind(),
        event.source_label(),
        event.channel()
    )
}

pub struct AlertDispatcher {
    schedule: Option<ScheduleResolver>,
    cooldown: Option<CooldownController>,
    notifier: Arc<dyn Notifier>,
}

impl AlertDispatcher {
    /// Dispatcher that forwards everything
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            schedule: None,
            cooldown: None,
            notifier,
        }
    }

    pub fn with_schedule(mut self, schedule: ScheduleResolver) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn with_cooldown(mut self, cooldown: CooldownController) -> Self {
        self.cooldown = Some(cooldown);
        self
    }

    pub fn cooldown(&self) -> Option<&CooldownController> {
        self.cooldown.as_ref()
    }

    /// Run one alert through schedule and cooldown policy
    ///
    /// Off-duty alerts never reach the cooldown controller.
    pub async fn dispatch(&self, event: AlertEvent) -> Outcome {
        let description = describe(&event);
        info!(raw = %event.raw(), "{}", description);

        if let Some(schedule) = &self.schedule {
            if !schedule.is_on_duty(event.channel(), event.timestamp()) {
                debug!(channel = event.channel(), "Alert outside schedule, discarding");
                return Outcome::OffDuty;
            }
        }

        let title = alarm_title(event.kind());

        if let Some(cooldown) = &self.cooldown {
            if cooldown.register(event).await == Decision::Suppress {
                return Outcome::Suppressed;
            }
        }

        self.notify(title, description);
        Outcome::Delivered
    }

    /// Send the summary produced when a cooldown expires
    pub fn notify_summary(&self, summary: &CooldownSummary) -> JoinHandle<()> {
        debug!(
            key = %summary.key,
            count = summary.count,
            "Sending cooldown summary"
        );
        self.notify(summary.title().to_string(), summary.message())
    }

    /// Cancel every pending cooldown timer
    pub async fn shutdown(&self) {
        if let Some(cooldown) = &self.cooldown {
            cooldown.shutdown().await;
        }
    }

    fn notify(&self, title: String, message: String) -> JoinHandle<()> {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            match notifier.send(&title, &message).await {
                Ok(()) => debug!(channel = notifier.channel_name(), "Notification sent: {}", title),
                Err(e) => error!(
                    channel = notifier.channel_name(),
                    "Failed to send notification \"{}\": {}", title, e
                ),
            }
        })
    }
}
