//! Cumulative outcome counters for the generation loop

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Terminal branch of one generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    SafetyViolation,
    CompilationFailure,
    Success,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStatsSnapshot {
    pub total_attempts: u64,
    pub safety_violations: u64,
    pub compilation_failures: u64,
    pub successes: u64,
}

impl LoopStatsSnapshot {
    /// Every attempt ended on exactly one branch
    pub fn is_consistent(&self) -> bool {
        self.total_attempts == self.safety_violations + self.compilation_failures + self.successes
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.successes as f64 / self.total_attempts as f64
        }
    }
}

/// Monotonic counters shared by concurrent generation calls.
///
/// All four counters live behind one mutex, so a snapshot never observes a
/// total that disagrees with its parts.
#[derive(Debug, Default)]
pub struct LoopStats {
    inner: Mutex<LoopStatsSnapshot>,
}

impl LoopStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed attempt on its terminal branch
    pub fn record(&self, terminal: Terminal) {
        let mut stats = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        stats.total_attempts += 1;
        match terminal {
            Terminal::SafetyViolation => stats.safety_violations += 1,
            Terminal::CompilationFailure => stats.compilation_failures += 1,
            Terminal::Success => stats.successes += 1,
        }
    }

    pub fn snapshot(&self) -> LoopStatsSnapshot {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
