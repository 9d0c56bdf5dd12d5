//! Queue between the tailing thread and the network.
//!
//! The worker thread pushes [`Outbound`] items through a [`QueuedDispatcher`]
//! without blocking; [`run_delivery`] drains them in order on a tokio task.

use killtrack_game_log::{CredentialCell, Dispatcher};
use killtrack_protocol::{DeathEvent, KillReport};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::Client;

/// An item waiting to be delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Kill(KillReport),
    Death(DeathEvent),
    /// The local player boarded a ship. Logged only.
    ZoneEnter(String),
}

/// [`Dispatcher`] that enqueues onto an unbounded channel.
#[derive(Debug, Clone)]
pub struct QueuedDispatcher {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl QueuedDispatcher {
    /// Creates a dispatcher and the receiver to hand to [`run_delivery`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn enqueue(&self, item: Outbound) {
        if self.tx.send(item).is_err() {
            warn!("delivery task gone, dropping event");
        }
    }
}

impl Dispatcher for QueuedDispatcher {
    fn report_kill(&mut self, report: KillReport) {
        self.enqueue(Outbound::Kill(report));
    }

    fn report_death(&mut self, event: DeathEvent) {
        self.enqueue(Outbound::Death(event));
    }

    fn notify_zone_enter(&mut self, ship: &str) {
        self.enqueue(Outbound::ZoneEnter(ship.to_string()));
    }
}

/// Local side effects of a successful delivery.
pub trait Feedback: Send + Sync {
    fn kill_recorded(&self) {}

    fn death_recorded(&self) {}
}

/// Feedback that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFeedback;

impl Feedback for NoFeedback {}

/// Counters returned when the delivery loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub delivered: usize,
    pub failed: usize,
    /// Dropped because no key was available at delivery time.
    pub skipped: usize,
}

/// Drains `rx` until every sender is dropped or `cancel` fires.
///
/// The key is read from `credential` per item, so a key cleared after the
/// event was queued causes the item to be skipped. Failed posts are logged
/// and not retried.
pub async fn run_delivery<F: Feedback>(
    client: Client,
    mut rx: mpsc::UnboundedReceiver<Outbound>,
    credential: CredentialCell,
    feedback: F,
    cancel: CancellationToken,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("delivery cancelled");
                break;
            }
            item = rx.recv() => item,
        };
        let Some(item) = item else {
            debug!("delivery queue closed");
            break;
        };

        if let Outbound::ZoneEnter(ship) = &item {
            info!(ship = %ship, "boarded ship");
            continue;
        }

        let Some(key) = credential.get() else {
            warn!("no key at delivery time, event dropped");
            stats.skipped += 1;
            continue;
        };

        match deliver(&client, &key, &item).await {
            Ok(()) => {
                stats.delivered += 1;
                match &item {
                    Outbound::Kill(report) => {
                        info!(victim = %report.victim, "kill recorded");
                        feedback.kill_recorded();
                    }
                    Outbound::Death(event) => {
                        info!(time = event.time(), "death recorded");
                        feedback.death_recorded();
                    }
                    Outbound::ZoneEnter(_) => {}
                }
            }
            Err(e) => {
                stats.failed += 1;
                warn!(error = %e, "failed to deliver event");
            }
        }
    }

    stats
}

async fn deliver(client: &Client, key: &str, item: &Outbound) -> Result<(), crate::client::Error> {
    match item {
        Outbound::Kill(report) => client.post_kill(key, report).await,
        Outbound::Death(event) => client.post_death(key, event).await,
        Outbound::ZoneEnter(_) => Ok(()),
    }
}
