//! Expiry Scheduler
//!
//! Timers never touch hub state. They only push events back into the hub's
//! queue, where they are handled in order with everything else.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::hub::core::HubEvent;

/// Periodically enqueue [`HubEvent::Tick`] until the queue closes.
pub fn spawn_expiry_ticker(events: mpsc::Sender<HubEvent>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if events.send(HubEvent::Tick).await.is_err() {
                debug!("Hub queue closed, stopping expiry ticker");
                break;
            }
        }
    })
}

/// Deferred events addressed back to the hub.
///
/// Holds only a weak handle so pending timers do not keep the queue alive.
#[derive(Debug, Clone)]
pub struct Scheduler {
    events: mpsc::WeakSender<HubEvent>,
}

impl Scheduler {
    /// Schedule into the queue behind `events`.
    pub fn new(events: mpsc::WeakSender<HubEvent>) -> Self {
        Self { events }
    }

    /// Enqueue `event` after `delay`.
    pub fn schedule(&self, delay: Duration, event: HubEvent) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(events) = events.upgrade() {
                let _ = events.send(event).await;
            }
        });
    }
}
