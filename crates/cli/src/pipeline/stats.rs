//! Relay run statistics.

use std::time::Duration;

use dispatcher::QueueStatus;

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct RelayStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Events accepted by the intake
    pub events_accepted: u64,

    /// Events dropped for naming an unknown destination
    pub events_dropped: u64,

    /// Requests refused with a 4xx status
    pub requests_rejected: u64,

    /// Final per-destination queue state
    pub queues: Vec<QueueStatus>,
}

impl RelayStats {
    /// Events confirmed delivered across all destinations
    pub fn delivered_total(&self) -> u64 {
        self.queues.iter().map(|q| q.delivered_total).sum()
    }

    /// Events still pending or in flight at shutdown
    pub fn undelivered(&self) -> usize {
        self.queues.iter().map(|q| q.pending + q.in_flight).sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Relay Statistics ===\n");
        println!("Overview");
        println!("  Duration:          {:.2}s", self.duration.as_secs_f64());
        println!("  Events accepted:   {}", self.events_accepted);
        println!("  Events dropped:    {}", self.events_dropped);
        println!("  Requests rejected: {}", self.requests_rejected);
        println!("  Events delivered:  {}", self.delivered_total());
        println!("  Undelivered:       {}", self.undelivered());

        if !self.queues.is_empty() {
            println!("\nDestinations");
            for queue in &self.queues {
                println!(
                    "  - {:<20} delivered={} failed_attempts={} pending={} in_flight={}",
                    queue.destination,
                    queue.delivered_total,
                    queue.failed_attempts,
                    queue.pending,
                    queue.in_flight
                );
            }
        }
        println!();
    }
}
