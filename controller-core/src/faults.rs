//! Per-step timeout fault counters.
//!
//! The rig keeps a persistent count of timeouts attributed to each cycle step
//! so recurring problem steps stand out across power cycles. The storage
//! medium is target specific; [`RamFaultCounters`] is the volatile baseline
//! used by tests and wrapped by persistent implementations.

use core::fmt;

use crate::cycle::MAX_CYCLE_STEPS;

/// Errors surfaced by a [`FaultCounterStore`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FaultStoreError {
    /// The step index is outside the store.
    UnknownStep(usize),
    /// The backing medium rejected the write.
    Storage,
}

impl fmt::Display for FaultStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultStoreError::UnknownStep(step) => write!(f, "no fault counter for step {step}"),
            FaultStoreError::Storage => f.write_str("fault counter storage unavailable"),
        }
    }
}

/// Snapshot of every step's fault count.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FaultCounts {
    counts: [u16; MAX_CYCLE_STEPS],
    len: usize,
}

impl FaultCounts {
    /// Builds a snapshot from a slice of counts (truncated to [`MAX_CYCLE_STEPS`]).
    pub fn from_slice(counts: &[u16]) -> Self {
        let len = counts.len().min(MAX_CYCLE_STEPS);
        let mut snapshot = Self {
            counts: [0; MAX_CYCLE_STEPS],
            len,
        };
        snapshot.counts[..len].copy_from_slice(&counts[..len]);
        snapshot
    }

    /// Returns the count for `step`, if tracked.
    pub fn get(&self, step: usize) -> Option<u16> {
        self.as_slice().get(step).copied()
    }

    /// Number of tracked steps.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no steps are tracked.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sum of every step's count.
    pub fn total(&self) -> u32 {
        self.as_slice().iter().map(|&count| u32::from(count)).sum()
    }

    /// Counts as a slice indexed by step.
    pub fn as_slice(&self) -> &[u16] {
        &self.counts[..self.len]
    }

    /// Iterates `(step, count)` pairs in step order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u16)> + '_ {
        self.as_slice().iter().copied().enumerate()
    }
}

/// Key-indexed occurrence counter, one slot per cycle step.
pub trait FaultCounterStore {
    /// Adds one occurrence to `step`, returning the new count.
    fn increment(&mut self, step: usize) -> Result<u16, FaultStoreError>;

    /// Returns the count recorded for `step`.
    fn read(&self, step: usize) -> Result<u16, FaultStoreError>;

    /// Returns every step's count.
    fn read_all(&self) -> FaultCounts;

    /// Maintenance operation that zeroes every counter.
    fn clear_all(&mut self) -> Result<(), FaultStoreError>;
}

/// Volatile fault counters backed by a fixed array.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RamFaultCounters {
    counts: [u16; MAX_CYCLE_STEPS],
    steps: usize,
}

impl RamFaultCounters {
    /// Creates zeroed counters for `steps` cycle steps.
    pub fn new(steps: usize) -> Self {
        Self {
            counts: [0; MAX_CYCLE_STEPS],
            steps: steps.min(MAX_CYCLE_STEPS),
        }
    }

    /// Restores counters from a previously persisted snapshot.
    pub fn from_counts(steps: usize, persisted: &[u16]) -> Self {
        let mut counters = Self::new(steps);
        let len = persisted.len().min(counters.steps);
        counters.counts[..len].copy_from_slice(&persisted[..len]);
        counters
    }

    fn slot(&self, step: usize) -> Result<usize, FaultStoreError> {
        if step < self.steps {
            Ok(step)
        } else {
            Err(FaultStoreError::UnknownStep(step))
        }
    }
}

impl FaultCounterStore for RamFaultCounters {
    fn increment(&mut self, step: usize) -> Result<u16, FaultStoreError> {
        let slot = self.slot(step)?;
        self.counts[slot] = self.counts[slot].saturating_add(1);
        Ok(self.counts[slot])
    }

    fn read(&self, step: usize) -> Result<u16, FaultStoreError> {
        let slot = self.slot(step)?;
        Ok(self.counts[slot])
    }

    fn read_all(&self) -> FaultCounts {
        FaultCounts::from_slice(&self.counts[..self.steps])
    }

    fn clear_all(&mut self) -> Result<(), FaultStoreError> {
        self.counts = [0; MAX_CYCLE_STEPS];
        Ok(())
    }
}
