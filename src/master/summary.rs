//! Run statistics and shutdown outcome.

use std::time::Duration;

/// Statistics from a completed round loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rounds in which at least one variant was assigned.
    pub rounds: u64,
    pub problems_sent: u64,
    /// Every answer read, judged or drained after cancellation.
    pub answers_received: u64,
    pub accepted: u64,
    pub rejected: u64,
    /// Attempts abandoned because another worker won the round.
    pub cancelled: u64,
    /// Rounds in which every variant was rejected.
    pub unsolved_rounds: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Fraction of judged answers that were accepted (0.0 to 1.0).
    pub fn acceptance_rate(&self) -> f64 {
        let judged = self.accepted + self.rejected;
        if judged == 0 {
            0.0
        } else {
            self.accepted as f64 / judged as f64
        }
    }

    /// Format statistics as a human-readable string
    pub fn format_summary(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!("Rounds: {}\n", self.rounds));
        s.push_str(&format!("Time: {:.2?}\n", self.elapsed));
        s.push_str(&format!("Problems sent: {}\n", self.problems_sent));
        s.push_str(&format!("Answers received: {}\n", self.answers_received));
        s.push_str(&format!(
            "Accepted: {} ({:.1}% of judged)\n",
            self.accepted,
            self.acceptance_rate() * 100.0
        ));
        s.push_str(&format!("Rejected: {}\n", self.rejected));
        s.push_str(&format!("Cancelled: {}\n", self.cancelled));
        s.push_str(&format!("Unsolved rounds: {}", self.unsolved_rounds));
        s
    }
}

/// How each worker ended at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers that exited with status 0.
    pub exited: Vec<usize>,
    /// Workers that exited otherwise, with a description of how.
    pub aborted: Vec<(usize, String)>,
}

impl ShutdownReport {
    /// True when every worker exited cleanly.
    pub fn success(&self) -> bool {
        self.aborted.is_empty()
    }

    /// Number of workers reaped.
    pub fn reaped(&self) -> usize {
        self.exited.len() + self.aborted.len()
    }
}

/// Everything a full farm run produces.
#[derive(Debug, Clone)]
pub struct FarmOutcome {
    pub summary: RunSummary,
    pub shutdown: ShutdownReport,
}

impl FarmOutcome {
    pub fn success(&self) -> bool {
        self.shutdown.success()
    }
}
