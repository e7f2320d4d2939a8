//! Timed recovery of unhealthy backends.
//!
//! # Responsibilities
//! - Periodically walk every pool
//! - Flip backends that have been unhealthy longer than the recovery window
//!   back to healthy so they get traffic again

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::load_balancer::LoadBalancer;

pub struct RecoverySweep {
    balancer: Arc<LoadBalancer>,
    interval: Duration,
}

impl RecoverySweep {
    pub fn new(balancer: Arc<LoadBalancer>, interval: Duration) -> Self {
        Self { balancer, interval }
    }

    /// Run on a background task until `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            recovery_window_secs = self.balancer.recovery_window().as_secs_f64(),
            "Recovery sweep starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Recovery sweep received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn sweep(&self) {
        let recovered = self.balancer.recover_expired(Instant::now());
        if recovered > 0 {
            tracing::debug!(recovered, "Recovery sweep pass complete");
        }
    }
}
