//! Consecutive decode-failure budget for a single run.

/// Bounds how many undecodable responses in a row the driver tolerates
/// before aborting. Created once per run, mutated only by the turn driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureBudget {
    consecutive_failures: u32,
    limit: u32,
}

impl FailureBudget {
    /// Create a budget with the given limit. The limit must be positive;
    /// callers validate it at configuration time.
    pub fn new(limit: u32) -> Self {
        Self {
            consecutive_failures: 0,
            limit,
        }
    }

    /// A turn decoded successfully: the consecutive counter resets.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// A recoverable decode failure occurred. Returns `true` when the budget
    /// is now exhausted and the run must abort instead of retrying.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;
        self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.consecutive_failures >= self.limit
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}
