//! Fixed-capacity window of recent request outcomes

use std::collections::VecDeque;

use crate::monitoring::log_parser::LogOutcome;
use crate::utils::AppError;

/// FIFO ring of the most recent [`LogOutcome`]s.
///
/// Capacity is fixed at construction. Once full, every push evicts exactly
/// one oldest entry.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    entries: VecDeque<LogOutcome>,
    capacity: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Result<Self, AppError> {
        if capacity == 0 {
            return Err(AppError::internal_error(
                "sliding window capacity must be at least 1",
            ));
        }

        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    pub fn push(&mut self, outcome: LogOutcome) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(outcome);
    }

    /// Fraction of error entries; `0.0` for an empty window
    pub fn error_rate(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.error_count() as f64 / self.entries.len() as f64
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|o| o.is_error).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &LogOutcome> {
        self.entries.iter()
    }
}
