//! Flush triggers - what wakes the dispatcher between intake batches

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Source of periodic dispatch cycles.
///
/// Retries happen only when a trigger fires, so swapping the trigger changes
/// the retry cadence without touching queue logic.
#[trait_variant::make(FlushTrigger: Send)]
pub trait LocalFlushTrigger {
    /// Resolve when the next dispatch cycle is due
    async fn tick(&mut self);
}

/// Fixed-period trigger; the first tick fires one period after creation
#[derive(Debug)]
pub struct IntervalTrigger {
    period: Duration,
    interval: Interval,
}

impl IntervalTrigger {
    /// Create a trigger firing every `period`
    pub fn new(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { period, interval }
    }

    /// Configured period
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl FlushTrigger for IntervalTrigger {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}
