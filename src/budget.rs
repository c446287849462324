//! Resource limits for a solve call
//!
//! The search loop polls its budget at conflict granularity and bails out
//! with an `Interrupted` outcome when something ran out.  The original
//! rlimit-and-signal approach doesn't translate: a signal can't safely
//! interrupt a search loop holding `&mut` state, so the engine cooperates
//! instead.

use std::fmt;
use std::time::{Duration, Instant};

/// Why a limited solve call gave up
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Interrupt {
    CpuLimit,
    MemLimit,
    ConflictLimit,
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupt::CpuLimit => write!(f, "cpu time limit"),
            Interrupt::MemLimit => write!(f, "memory limit"),
            Interrupt::ConflictLimit => write!(f, "conflict budget"),
        }
    }
}

/// Limits on a single solve call.  The default is no limits at all.
#[derive(Debug, Clone, Default)]
pub struct Budget {
    deadline: Option<Instant>,
    memory_cap: Option<usize>,
    max_conflicts: Option<u64>,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Give up `secs` seconds from now.  Wall clock stands in for CPU time;
    /// the solver is single-threaded.
    pub fn with_cpu_limit(mut self, secs: u64) -> Self {
        self.deadline = Instant::now().checked_add(Duration::from_secs(secs));
        self
    }

    pub fn with_memory_limit(mut self, megabytes: u64) -> Self {
        self.memory_cap = Some(megabytes as usize * 1024 * 1024);
        self
    }

    pub fn with_conflict_limit(mut self, conflicts: u64) -> Self {
        self.max_conflicts = Some(conflicts);
        self
    }

    /// Check every limit.  `memory` is a thunk since the estimate walks the
    /// clause arena; the solver only calls this every ~1k steps.
    pub fn exhausted(&self, conflicts: u64, memory: impl FnOnce() -> usize) -> Option<Interrupt> {
        if let Some(cap) = self.max_conflicts {
            if conflicts >= cap {
                return Some(Interrupt::ConflictLimit);
            }
        }
        if let Some(deadline) = self.deadline {
            if deadline <= Instant::now() {
                return Some(Interrupt::CpuLimit);
            }
        }
        if let Some(cap) = self.memory_cap {
            if memory() >= cap {
                return Some(Interrupt::MemLimit);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_never_fires() {
        assert_eq!(Budget::unlimited().exhausted(u64::MAX, || usize::MAX), None);
    }

    #[test]
    fn conflict_cap() {
        let budget = Budget::unlimited().with_conflict_limit(100);
        assert_eq!(budget.exhausted(99, || 0), None);
        assert_eq!(budget.exhausted(100, || 0), Some(Interrupt::ConflictLimit));
    }

    #[test]
    fn memory_cap() {
        let budget = Budget::unlimited().with_memory_limit(1);
        assert_eq!(budget.exhausted(0, || 2 * 1024 * 1024), Some(Interrupt::MemLimit));
        assert_eq!(budget.exhausted(0, || 1024), None);
    }
}
