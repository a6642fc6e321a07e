//! Blinking fault lamp.

use core::ops::Add;
use core::time::Duration;

/// Toggles a lamp on a fixed interval while a fault is latched.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FaultIndicator<I> {
    interval: Duration,
    active: bool,
    lit: bool,
    next_toggle: Option<I>,
}

impl<I> FaultIndicator<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: false,
            lit: false,
            next_toggle: None,
        }
    }

    /// Latches the fault and lights the lamp. Re-activating keeps the phase.
    pub fn activate(&mut self, now: I) {
        if self.active {
            return;
        }
        self.active = true;
        self.lit = true;
        self.next_toggle = Some(now + self.interval);
    }

    pub fn clear(&mut self) {
        self.active = false;
        self.lit = false;
        self.next_toggle = None;
    }

    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Returns the lamp level for this tick.
    pub fn poll(&mut self, now: I) -> bool {
        if let Some(toggle_at) = self.next_toggle
            && self.active
            && now >= toggle_at
        {
            self.lit = !self.lit;
            self.next_toggle = Some(now + self.interval);
        }
        self.lit
    }

    pub const fn is_lit(&self) -> bool {
        self.lit
    }
}
