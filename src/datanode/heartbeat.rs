//! Liveness reporter
//!
//! Sends `KeepAlive` to the coordinator on a fixed interval for as long as the
//! node runs. The connection is reused across ticks and re-dialed after a
//! failure. Missed heartbeats are logged and never retried out of band.

use crate::common::NodeIdentity;
use crate::coordinator::CoordinatorClient;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub struct LivenessReporter {
    identity: NodeIdentity,
    master_addr: String,
    interval: Duration,
    connect_timeout: Duration,
}

impl LivenessReporter {
    pub fn new(
        identity: NodeIdentity,
        master_addr: impl Into<String>,
        interval: Duration,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            identity,
            master_addr: master_addr.into(),
            interval,
            connect_timeout,
        }
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped)
    pub fn start(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Heartbeat to {} every {:?}",
            self.master_addr,
            self.interval
        );

        // First beat one interval after startup, like every following one.
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut client: Option<CoordinatorClient> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.beat(&mut client).await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Heartbeat stopped");
    }

    async fn beat(&self, client: &mut Option<CoordinatorClient>) {
        if client.is_none() {
            match CoordinatorClient::connect(&self.master_addr, self.connect_timeout).await {
                Ok(connected) => *client = Some(connected),
                Err(e) => {
                    tracing::warn!("Cannot send KeepAlive: {}", e);
                    return;
                }
            }
        }

        if let Some(connected) = client.as_mut() {
            if let Err(e) = connected.keep_alive(&self.identity).await {
                tracing::warn!("Cannot send KeepAlive: {}", e);
                *client = None;
            }
        }
    }
}
