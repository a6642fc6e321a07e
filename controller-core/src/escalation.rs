//! Progress timeout detection and strike escalation.
//!
//! The escalator watches the progress signal while the rig runs in auto mode.
//! Silence for the configured timeout is a strike; strikes escalate from an
//! immediate reset, through a cooldown hold, to a full stop at the strike
//! limit. Any progress edge forgives every strike and cancels a pending hold.

use core::ops::Add;
use core::time::Duration;

use crate::config::{EscalationConfig, EscalationPolicy};

/// Transient escalation bookkeeping.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EscalationState {
    pub strike_count: u8,
    pub pending_delayed_reset: bool,
}

/// Response the controller must carry out for this tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EscalationAction<I> {
    /// Record the fault, then reset and resume without pausing.
    ResetAndResume { strike: u8 },
    /// Record the fault, stop, and wait until `until` before resetting.
    HoldForCooldown { strike: u8, until: I },
    /// The cooldown hold elapsed; reset and resume.
    CooldownElapsed,
    /// Record the fault and stop for good; a manual restart is required.
    Shutdown { strike: u8 },
    /// A progress edge cleared `strikes` and any pending hold.
    Forgiven { strikes: u8, cancelled_hold: bool },
}

impl<I> EscalationAction<I> {
    /// Strike number for actions that record a fault.
    pub const fn strike(&self) -> Option<u8> {
        match self {
            EscalationAction::ResetAndResume { strike }
            | EscalationAction::HoldForCooldown { strike, .. }
            | EscalationAction::Shutdown { strike } => Some(*strike),
            EscalationAction::CooldownElapsed | EscalationAction::Forgiven { .. } => None,
        }
    }
}

/// Three-tier timeout escalator.
#[derive(Clone, Debug)]
pub struct TimeoutEscalator<I> {
    config: EscalationConfig,
    state: EscalationState,
    timeout_deadline: Option<I>,
    cooldown_deadline: Option<I>,
}

impl<I> TimeoutEscalator<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    pub const fn new(config: EscalationConfig) -> Self {
        Self {
            config,
            state: EscalationState {
                strike_count: 0,
                pending_delayed_reset: false,
            },
            timeout_deadline: None,
            cooldown_deadline: None,
        }
    }

    pub const fn config(&self) -> &EscalationConfig {
        &self.config
    }

    pub const fn state(&self) -> EscalationState {
        self.state
    }

    pub const fn strike_count(&self) -> u8 {
        self.state.strike_count
    }

    pub const fn pending_delayed_reset(&self) -> bool {
        self.state.pending_delayed_reset
    }

    /// Deadline of the running timeout clock, if armed.
    pub const fn timeout_deadline(&self) -> Option<I> {
        self.timeout_deadline
    }

    /// End of the pending cooldown hold, if any.
    pub const fn cooldown_deadline(&self) -> Option<I> {
        self.cooldown_deadline
    }

    /// Advances the escalator by one tick.
    ///
    /// `armed` is true while running in auto mode outside a reset; the timeout
    /// clock is held reset otherwise. `progress` is the rising edge of the
    /// progress signal observed this tick.
    pub fn poll(&mut self, armed: bool, progress: bool, now: I) -> Option<EscalationAction<I>> {
        if progress {
            return self.forgive(armed, now);
        }

        if let Some(until) = self.cooldown_deadline {
            if now < until {
                return None;
            }
            self.cooldown_deadline = None;
            self.state.pending_delayed_reset = false;
            return Some(EscalationAction::CooldownElapsed);
        }

        if !armed {
            self.timeout_deadline = None;
            return None;
        }

        match self.timeout_deadline {
            None => {
                self.timeout_deadline = Some(now + self.config.progress_timeout);
                None
            }
            Some(deadline) if now >= deadline => {
                self.timeout_deadline = None;
                Some(self.strike(now))
            }
            Some(_) => None,
        }
    }

    /// Drops a pending cooldown hold after an operator takes over.
    ///
    /// Strikes are kept; only a progress edge proves the rig recovered.
    pub fn cancel_cooldown(&mut self) -> bool {
        let pending = self.state.pending_delayed_reset;
        self.state.pending_delayed_reset = false;
        self.cooldown_deadline = None;
        pending
    }

    fn forgive(&mut self, armed: bool, now: I) -> Option<EscalationAction<I>> {
        let strikes = self.state.strike_count;
        let cancelled_hold = self.cancel_cooldown();
        self.state.strike_count = 0;
        self.timeout_deadline = armed.then(|| now + self.config.progress_timeout);

        (strikes > 0 || cancelled_hold).then_some(EscalationAction::Forgiven {
            strikes,
            cancelled_hold,
        })
    }

    fn strike(&mut self, now: I) -> EscalationAction<I> {
        self.state.strike_count = self.state.strike_count.saturating_add(1);
        let strike = self.state.strike_count;

        if strike >= self.config.strike_limit {
            self.state.strike_count = 0;
            return EscalationAction::Shutdown { strike };
        }

        match self.config.policy {
            EscalationPolicy::DelayedRetry { cooldown } if strike > 1 => {
                let until = now + cooldown;
                self.state.pending_delayed_reset = true;
                self.cooldown_deadline = Some(until);
                EscalationAction::HoldForCooldown { strike, until }
            }
            EscalationPolicy::DelayedRetry { .. } | EscalationPolicy::ImmediateRetry => {
                EscalationAction::ResetAndResume { strike }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
    struct Millis(u64);

    impl Add<Duration> for Millis {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            Self(self.0 + u64::try_from(rhs.as_millis()).unwrap())
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(20);
    const COOLDOWN: Duration = Duration::from_secs(180);

    fn delayed() -> TimeoutEscalator<Millis> {
        TimeoutEscalator::new(EscalationConfig::new(
            TIMEOUT,
            3,
            EscalationPolicy::DelayedRetry { cooldown: COOLDOWN },
        ))
    }

    /// Arms the clock at `start` and returns the action at its deadline.
    fn time_out(
        escalator: &mut TimeoutEscalator<Millis>,
        start: u64,
    ) -> Option<EscalationAction<Millis>> {
        assert_eq!(escalator.poll(true, false, Millis(start)), None);
        assert_eq!(escalator.poll(true, false, Millis(start + 19_999)), None);
        escalator.poll(true, false, Millis(start + 20_000))
    }

    #[test]
    fn clock_held_while_disarmed() {
        let mut escalator = delayed();
        assert_eq!(escalator.poll(false, false, Millis(0)), None);
        assert_eq!(escalator.poll(false, false, Millis(100_000)), None);
        assert_eq!(escalator.timeout_deadline(), None);

        escalator.poll(true, false, Millis(0));
        escalator.poll(false, false, Millis(10_000));
        // Re-arming restarts the full window.
        assert_eq!(escalator.poll(true, false, Millis(15_000)), None);
        assert_eq!(escalator.poll(true, false, Millis(34_999)), None);
        assert!(escalator.poll(true, false, Millis(35_000)).is_some());
    }

    #[test]
    fn delayed_policy_escalates_through_three_tiers() {
        let mut escalator = delayed();

        assert_eq!(
            time_out(&mut escalator, 0),
            Some(EscalationAction::ResetAndResume { strike: 1 })
        );
        assert_eq!(escalator.strike_count(), 1);

        let hold = time_out(&mut escalator, 30_000);
        assert_eq!(
            hold,
            Some(EscalationAction::HoldForCooldown {
                strike: 2,
                until: Millis(50_000 + 180_000)
            })
        );
        assert!(escalator.pending_delayed_reset());

        // The hold ignores arming until it elapses.
        assert_eq!(escalator.poll(true, false, Millis(229_999)), None);
        assert_eq!(
            escalator.poll(false, false, Millis(230_000)),
            Some(EscalationAction::CooldownElapsed)
        );
        assert!(!escalator.pending_delayed_reset());
        assert_eq!(escalator.strike_count(), 2);

        assert_eq!(
            time_out(&mut escalator, 240_000),
            Some(EscalationAction::Shutdown { strike: 3 })
        );
        assert_eq!(escalator.strike_count(), 0);
    }

    #[test]
    fn immediate_policy_retries_until_limit() {
        let mut escalator = TimeoutEscalator::new(EscalationConfig::new(
            TIMEOUT,
            4,
            EscalationPolicy::ImmediateRetry,
        ));

        for strike in 1..4 {
            let start = u64::from(strike) * 100_000;
            assert_eq!(
                time_out(&mut escalator, start),
                Some(EscalationAction::ResetAndResume { strike })
            );
        }
        assert_eq!(
            time_out(&mut escalator, 900_000),
            Some(EscalationAction::Shutdown { strike: 4 })
        );
    }

    #[test]
    fn progress_forgives_strikes_and_cancels_hold() {
        let mut escalator = delayed();
        time_out(&mut escalator, 0);
        time_out(&mut escalator, 30_000);
        assert!(escalator.pending_delayed_reset());

        assert_eq!(
            escalator.poll(false, true, Millis(60_000)),
            Some(EscalationAction::Forgiven {
                strikes: 2,
                cancelled_hold: true
            })
        );
        assert_eq!(escalator.strike_count(), 0);
        assert!(!escalator.pending_delayed_reset());
        assert_eq!(escalator.cooldown_deadline(), None);

        // Back to tier 1 after forgiveness.
        assert_eq!(
            time_out(&mut escalator, 70_000),
            Some(EscalationAction::ResetAndResume { strike: 1 })
        );
    }

    #[test]
    fn progress_restarts_the_clock() {
        let mut escalator = delayed();
        escalator.poll(true, false, Millis(0));
        assert_eq!(escalator.poll(true, true, Millis(15_000)), None);
        assert_eq!(escalator.timeout_deadline(), Some(Millis(35_000)));
        assert_eq!(escalator.poll(true, false, Millis(34_999)), None);
        assert_eq!(
            escalator.poll(true, false, Millis(35_000)),
            Some(EscalationAction::ResetAndResume { strike: 1 })
        );
    }

    #[test]
    fn strike_limit_of_one_stops_immediately() {
        let mut escalator = TimeoutEscalator::new(EscalationConfig::new(
            TIMEOUT,
            1,
            EscalationPolicy::default(),
        ));
        assert_eq!(
            time_out(&mut escalator, 0),
            Some(EscalationAction::Shutdown { strike: 1 })
        );
    }

    #[test]
    fn cancel_cooldown_keeps_strikes() {
        let mut escalator = delayed();
        time_out(&mut escalator, 0);
        time_out(&mut escalator, 30_000);
        assert!(escalator.cancel_cooldown());
        assert!(!escalator.pending_delayed_reset());
        assert_eq!(escalator.strike_count(), 2);
        assert_eq!(escalator.poll(false, false, Millis(500_000)), None);
    }
}
