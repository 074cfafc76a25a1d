use std::collections::HashMap;

/// What the dispatcher should do with a submission after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptDecision {
    Retry { attempt: u32 },
    Parked { attempts: u32 },
}

/// Counts consecutive failed attempts per submission for this process.
///
/// With no limit every failure is retried on the next cycle. With a limit a
/// submission that keeps failing is parked and left out of later batches.
#[derive(Debug, Default)]
pub struct AttemptTracker {
    max_attempts: Option<u32>,
    failures: HashMap<i32, u32>,
}

impl AttemptTracker {
    pub fn new(max_attempts: Option<u32>) -> Self {
        Self {
            max_attempts,
            failures: HashMap::new(),
        }
    }

    pub fn record_failure(&mut self, submission_id: i32) -> AttemptDecision {
        let attempts = self.failures.entry(submission_id).or_insert(0);
        *attempts += 1;

        match self.max_attempts {
            Some(max) if *attempts >= max => AttemptDecision::Parked {
                attempts: *attempts,
            },
            _ => AttemptDecision::Retry { attempt: *attempts },
        }
    }

    pub fn clear(&mut self, submission_id: i32) {
        self.failures.remove(&submission_id);
    }

    /// Submissions that exhausted their attempts, sorted by id.
    pub fn parked(&self) -> Vec<i32> {
        let Some(max) = self.max_attempts else {
            return Vec::new();
        };
        let mut parked: Vec<i32> = self
            .failures
            .iter()
            .filter(|(_, attempts)| **attempts >= max)
            .map(|(id, _)| *id)
            .collect();
        parked.sort_unstable();
        parked
    }
}
