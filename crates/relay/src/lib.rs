//! Camwatch Relay
//!
//! Wires an alert source to a notifier through schedule and cooldown policy.

pub mod config;
pub mod dispatcher;

pub use config::{AppConfig, ConfigError, RelaySettings, SourceConfig};
pub use dispatcher::{alarm_title, describe, AlertDispatcher, Outcome};

use alert_source::SourceEvent;
use alerting::{CooldownConfig, CooldownController, CooldownSummary};
use notifier::Notifier;
use schedule::ScheduleResolver;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Capacity of the source-to-relay event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Initialize logging
pub fn init_logging(level: Level, json: bool) -> Result<(), SetGlobalDefaultError> {
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    }
}

/// The relay event loop
pub struct Relay {
    dispatcher: AlertDispatcher,
    summaries: mpsc::UnboundedReceiver<CooldownSummary>,
    summary_tx: mpsc::UnboundedSender<CooldownSummary>,
}

impl Relay {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        schedule: Option<ScheduleResolver>,
        cooldown: Option<CooldownConfig>,
    ) -> Self {
        let (summary_tx, summaries) = mpsc::unbounded_channel();

        let mut dispatcher = AlertDispatcher::new(notifier);
        if let Some(schedule) = schedule {
            info!("Schedule enabled with {} window(s)", schedule.window_count());
            dispatcher = dispatcher.with_schedule(schedule);
        }
        if let Some(config) = cooldown {
            info!(
                per_channel = config.per_channel,
                summarize = config.summarize,
                "Cooldown enabled for {:?}",
                config.duration
            );
            dispatcher = dispatcher.with_cooldown(CooldownController::new(config, summary_tx.clone()));
        }

        Self {
            dispatcher,
            summaries,
            summary_tx,
        }
    }

    /// Build a relay from validated settings
    pub fn from_settings(notifier: Arc<dyn Notifier>, settings: RelaySettings) -> Self {
        Self::new(notifier, settings.schedule, settings.cooldown)
    }

    /// Process source events and cooldown summaries until `shutdown`
    /// resolves or the source goes away, then cancel pending timers.
    pub async fn run<F>(self, mut events: mpsc::Receiver<SourceEvent>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Relay {
            dispatcher,
            mut summaries,
            summary_tx: _summary_tx,
        } = self;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => handle_source_event(&dispatcher, event).await,
                    None => {
                        info!("Alert source closed");
                        break;
                    }
                },
                Some(summary) = summaries.recv() => {
                    dispatcher.notify_summary(&summary);
                }
            }
        }

        dispatcher.shutdown().await;
        info!("Relay stopped");
    }
}

async fn handle_source_event(dispatcher: &AlertDispatcher, event: SourceEvent) {
    match event {
        SourceEvent::Ready { endpoint } => info!("Alert source ready on {}", endpoint),
        SourceEvent::Warning(message) => warn!("Alert source: {}", message),
        SourceEvent::Alert(alert) => {
            let outcome = dispatcher.dispatch(alert).await;
            debug!(?outcome, "Alert dispatched");
        }
    }
}
