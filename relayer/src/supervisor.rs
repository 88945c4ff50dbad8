//! Keeps the dispatch loop running: polls on a fixed interval and restarts
//! with exponential backoff when a cycle fails.
//!
//! Each cycle runs in its own task, so a panic inside a cycle surfaces as an
//! error here instead of unwinding through the loop.

use crate::dispatch::Dispatcher;
use crate::error::{RelayerError, Result};
use crate::ledger::RelayState;
use crate::pending::PendingSource;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct RestartBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl RestartBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay before the next restart; doubles up to the maximum.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

pub struct Supervisor {
    dispatcher: Arc<Dispatcher>,
    source: Arc<Mutex<Box<dyn PendingSource>>>,
    state: Arc<Mutex<RelayState>>,
    poll_interval: Duration,
    backoff: RestartBackoff,
}

impl Supervisor {
    pub fn new(
        dispatcher: Dispatcher,
        source: Box<dyn PendingSource>,
        state: RelayState,
        poll_interval: Duration,
        backoff: RestartBackoff,
    ) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            source: Arc::new(Mutex::new(source)),
            state: Arc::new(Mutex::new(state)),
            poll_interval,
            backoff,
        }
    }

    /// Snapshot of the relay state.
    pub async fn state(&self) -> RelayState {
        self.state.lock().await.clone()
    }

    /// One poll: evict stale bookkeeping, then relay everything pending.
    pub async fn cycle(&mut self) -> Result<usize> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let source = Arc::clone(&self.source);
        let state = Arc::clone(&self.state);

        let task = tokio::spawn(async move {
            let mut state = state.lock().await;
            let evicted = state.evict_stale(Utc::now());
            if evicted > 0 {
                debug!("Evicted {} stale attempt records", evicted);
            }
            let mut source = source.lock().await;
            dispatcher.run_cycle(&mut state, &mut **source).await
        });

        let outcomes = task
            .await
            .map_err(|e| RelayerError::CycleAborted(e.to_string()))??;
        Ok(outcomes.len())
    }

    async fn run_until_error(&mut self) -> Result<()> {
        let mut tick = interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            self.cycle().await?;
            self.backoff.reset();
        }
    }

    /// Run forever. Relay state survives restarts; only the loop is rebuilt.
    pub async fn run(&mut self) {
        info!(
            "Relaying to chain {} every {:?}",
            self.dispatcher.policy().destination_chain_id,
            self.poll_interval
        );
        loop {
            if let Err(e) = self.run_until_error().await {
                let delay = self.backoff.next_delay();
                error!("Relay loop failed: {}. Restarting in {:?}", e, delay);
                sleep(delay).await;
            }
        }
    }
}
