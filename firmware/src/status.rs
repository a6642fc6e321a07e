#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The control task publishes a compact copy of the controller state after
//! every tick; the heartbeat task rebuilds a [`StatusSnapshot`] from it
//! without touching the controller itself.

use controller_core::controller::StatusSnapshot;
use controller_core::cycle::{step_name, strap_cycle};
use controller_core::reset::{ResetStage, StrokePhase};
use controller_core::sequencer::{ControlMode, RunMode};
use portable_atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

const FLAG_RUNNING: u8 = 1 << 0;
const FLAG_AUTO: u8 = 1 << 1;
const FLAG_RESUME: u8 = 1 << 2;
const FLAG_COOLDOWN: u8 = 1 << 3;
const FLAG_LAMP: u8 = 1 << 4;

static CURRENT_STEP: AtomicU8 = AtomicU8::new(0);
static FLAGS: AtomicU8 = AtomicU8::new(0);
static RESET_STAGE: AtomicU8 = AtomicU8::new(0);
static STRIKES: AtomicU8 = AtomicU8::new(0);
static STRIKE_LIMIT: AtomicU8 = AtomicU8::new(0);
/// Wrapping millisecond timestamp of the last published tick.
static LAST_TICK_MS: AtomicU32 = AtomicU32::new(0);
static PUBLISHED: AtomicBool = AtomicBool::new(false);

/// Stores the controller state observed at `tick_ms`.
pub fn publish(snapshot: &StatusSnapshot, tick_ms: u32) {
    let mut flags = 0;
    if snapshot.run_mode == RunMode::Running {
        flags |= FLAG_RUNNING;
    }
    if snapshot.control_mode == ControlMode::Auto {
        flags |= FLAG_AUTO;
    }
    if snapshot.resume_after_reset {
        flags |= FLAG_RESUME;
    }
    if snapshot.cooldown_pending {
        flags |= FLAG_COOLDOWN;
    }
    if snapshot.indicator_active {
        flags |= FLAG_LAMP;
    }

    CURRENT_STEP.store(
        u8::try_from(snapshot.current_step).unwrap_or(u8::MAX),
        Ordering::Relaxed,
    );
    FLAGS.store(flags, Ordering::Relaxed);
    RESET_STAGE.store(stage_code(snapshot.reset_stage), Ordering::Relaxed);
    STRIKES.store(snapshot.strike_count, Ordering::Relaxed);
    STRIKE_LIMIT.store(snapshot.strike_limit, Ordering::Relaxed);
    LAST_TICK_MS.store(tick_ms, Ordering::Relaxed);
    PUBLISHED.store(true, Ordering::Release);
}

/// Rebuilds the last published snapshot, if the control loop has ticked yet.
pub fn snapshot() -> Option<StatusSnapshot> {
    if !PUBLISHED.load(Ordering::Acquire) {
        return None;
    }
    let flags = FLAGS.load(Ordering::Relaxed);
    let current_step = usize::from(CURRENT_STEP.load(Ordering::Relaxed));
    Some(StatusSnapshot {
        current_step,
        step_name: step_name(strap_cycle(), current_step),
        run_mode: if flags & FLAG_RUNNING == 0 {
            RunMode::Stopped
        } else {
            RunMode::Running
        },
        control_mode: ControlMode::from_switch(flags & FLAG_AUTO != 0),
        reset_stage: stage_from_code(RESET_STAGE.load(Ordering::Relaxed)),
        resume_after_reset: flags & FLAG_RESUME != 0,
        strike_count: STRIKES.load(Ordering::Relaxed),
        strike_limit: STRIKE_LIMIT.load(Ordering::Relaxed),
        cooldown_pending: flags & FLAG_COOLDOWN != 0,
        indicator_active: flags & FLAG_LAMP != 0,
    })
}

/// Milliseconds since the last published tick, on the wrapping clock.
pub fn millis_since_tick(now_ms: u32) -> Option<u32> {
    PUBLISHED
        .load(Ordering::Acquire)
        .then(|| now_ms.wrapping_sub(LAST_TICK_MS.load(Ordering::Relaxed)))
}

const fn stage_code(stage: ResetStage) -> u8 {
    match stage {
        ResetStage::Idle => 0,
        ResetStage::DeEnergize => 1,
        ResetStage::RecoveryStroke(StrokePhase::Extend) => 2,
        ResetStage::RecoveryStroke(StrokePhase::Return) => 3,
        ResetStage::Rearm => 4,
    }
}

const fn stage_from_code(code: u8) -> ResetStage {
    match code {
        1 => ResetStage::DeEnergize,
        2 => ResetStage::RecoveryStroke(StrokePhase::Extend),
        3 => ResetStage::RecoveryStroke(StrokePhase::Return),
        4 => ResetStage::Rearm,
        _ => ResetStage::Idle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn published_snapshot_round_trips() {
        let published = StatusSnapshot {
            current_step: 5,
            step_name: "RELEASE TENSION",
            run_mode: RunMode::Stopped,
            control_mode: ControlMode::Auto,
            reset_stage: ResetStage::RecoveryStroke(StrokePhase::Return),
            resume_after_reset: true,
            strike_count: 2,
            strike_limit: 3,
            cooldown_pending: false,
            indicator_active: true,
        };
        publish(&published, 1_000);

        assert_eq!(snapshot(), Some(published));
        assert_eq!(millis_since_tick(1_250), Some(250));
        assert_eq!(millis_since_tick(999), Some(u32::MAX));
    }

    #[test]
    fn unknown_stage_codes_read_as_idle() {
        assert_eq!(stage_from_code(9), ResetStage::Idle);
        assert_eq!(stage_from_code(stage_code(ResetStage::Rearm)), ResetStage::Rearm);
    }
}
