//! Interrupt-to-tick handoff for the start/stop button.
//!
//! The button interrupt is the only producer and the control tick the only
//! consumer. Each side owns its own counter, so the latch only ever needs
//! atomic loads and stores and works on cores without compare-and-swap.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use core::time::Duration;

/// Debounced single-producer/single-consumer start/stop request flag.
#[derive(Debug)]
pub struct StartStopLatch {
    /// Edges accepted by the interrupt side. Written only by [`signal`](Self::signal).
    accepted: AtomicU32,
    /// Edges drained by the tick side. Written only by [`take`](Self::take).
    drained: AtomicU32,
    last_accepted_ms: AtomicU32,
    has_accepted: AtomicBool,
    debounce_ms: u32,
}

impl StartStopLatch {
    /// Creates a latch rejecting edges closer than `debounce` to the last accepted one.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(debounce: Duration) -> Self {
        let millis = debounce.as_millis();
        let debounce_ms = if millis > u32::MAX as u128 {
            u32::MAX
        } else {
            millis as u32
        };
        Self {
            accepted: AtomicU32::new(0),
            drained: AtomicU32::new(0),
            last_accepted_ms: AtomicU32::new(0),
            has_accepted: AtomicBool::new(false),
            debounce_ms,
        }
    }

    pub const fn debounce_ms(&self) -> u32 {
        self.debounce_ms
    }

    /// Registers a button edge at `now_ms` (wrapping millisecond clock).
    ///
    /// Returns `true` when the edge was accepted.
    pub fn signal(&self, now_ms: u32) -> bool {
        if self.has_accepted.load(Ordering::Acquire) {
            let last = self.last_accepted_ms.load(Ordering::Relaxed);
            if now_ms.wrapping_sub(last) < self.debounce_ms {
                return false;
            }
        }

        self.last_accepted_ms.store(now_ms, Ordering::Relaxed);
        self.has_accepted.store(true, Ordering::Release);
        let accepted = self.accepted.load(Ordering::Relaxed);
        self.accepted.store(accepted.wrapping_add(1), Ordering::Release);
        true
    }

    /// Returns `true` once if any edge was accepted since the last call.
    pub fn take(&self) -> bool {
        let accepted = self.accepted.load(Ordering::Acquire);
        if accepted == self.drained.load(Ordering::Relaxed) {
            return false;
        }
        self.drained.store(accepted, Ordering::Release);
        true
    }

    /// Returns `true` while an accepted edge waits to be drained.
    pub fn is_pending(&self) -> bool {
        self.accepted.load(Ordering::Acquire) != self.drained.load(Ordering::Relaxed)
    }
}

/// Rising-edge detector for level-sampled inputs.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RisingEdge {
    last: bool,
}

impl RisingEdge {
    pub const fn new(initial: bool) -> Self {
        Self { last: initial }
    }

    /// Feeds the latest level; returns `true` on a low-to-high transition.
    pub fn update(&mut self, level: bool) -> bool {
        let rose = level && !self.last;
        self.last = level;
        rose
    }

    pub const fn level(&self) -> bool {
        self.last
    }
}
