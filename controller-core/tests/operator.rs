mod common;

use core::time::Duration;

use common::Bench;
use controller_core::cycle::{ActuatorId, CYCLE_STEPS};
use controller_core::reset::ResetProgress;
use controller_core::sequencer::{ControlMode, RunMode};
use controller_core::telemetry::TelemetryEventKind;

fn start(bench: &mut Bench) {
    assert!(bench.press());
    let report = bench.tick();
    assert_eq!(report.run_mode, RunMode::Running);
}

fn run_to_step(bench: &mut Bench, step: usize) {
    bench.run_until(Duration::from_secs(15), |report, _| {
        report.step_switched == Some(step)
    });
}

#[test]
fn missing_material_stops_without_a_strike() {
    let mut bench = Bench::standard();
    start(&mut bench);
    run_to_step(&mut bench, 4);

    bench.material = false;
    let report = bench.tick();
    assert_eq!(report.run_mode, RunMode::Stopped);
    assert_eq!(report.current_step, 4);
    assert!(!bench.rig.port().any_energised());
    assert!(bench.rig.indicator().is_active());
    assert_eq!(bench.rig.fault_counts().total(), 0);
    assert_eq!(bench.rig.escalator().strike_count(), 0);
    assert!(bench.events().contains(&TelemetryEventKind::MaterialMissing));

    // Stays parked while the strap is missing, even well past the timeout.
    let parked = bench.run_for(Duration::from_secs(40));
    assert!(parked.iter().all(|report| report.escalation.is_none()));
    assert!(parked.iter().all(|report| report.run_mode == RunMode::Stopped));

    bench.material = true;
    bench.run_for(Duration::from_millis(300));
    start(&mut bench);
    assert!(!bench.rig.indicator().is_active());
    assert_eq!(bench.rig.sequencer().current_step(), 4);
}

#[test]
fn missing_material_during_reset_cancels_the_resume() {
    let mut bench = Bench::standard();
    bench.jam(Some(ActuatorId::Clamp));
    start(&mut bench);
    bench.run_until(Duration::from_secs(21), |_, rig| rig.sequencer().reset_mode());

    bench.material = false;
    bench.tick();
    bench.material = true;
    let done = bench.run_until(Duration::from_secs(10), |report, _| {
        matches!(report.reset, ResetProgress::Completed { .. })
    });
    assert_eq!(done.reset, ResetProgress::Completed { resumed: false });
    assert_eq!(done.run_mode, RunMode::Stopped);
    assert!(bench.rig.indicator().is_active());
}

#[test]
fn presses_inside_debounce_window_make_one_change() {
    let mut bench = Bench::standard();
    assert!(bench.press());
    bench.run_for(Duration::from_millis(100));
    assert!(!bench.press(), "bounce 100 ms later must be ignored");

    let reports = bench.run_for(Duration::from_millis(500));
    assert!(reports.iter().all(|report| report.run_mode == RunMode::Running));
    assert_eq!(
        bench
            .events()
            .iter()
            .filter(|&&event| event == TelemetryEventKind::RunStarted)
            .count(),
        1
    );

    assert!(bench.press());
    assert_eq!(bench.tick().run_mode, RunMode::Stopped);
}

#[test]
fn stop_preempts_the_step_in_progress() {
    let mut bench = Bench::standard();
    start(&mut bench);
    run_to_step(&mut bench, 1);
    bench.run_for(Duration::from_millis(300));

    let drives = bench.rig.port().drives;
    assert!(bench.press());
    let report = bench.tick();
    assert_eq!(report.run_mode, RunMode::Stopped);
    assert_eq!(bench.rig.port().drives, drives);

    bench.run_for(Duration::from_secs(5));
    assert_eq!(bench.rig.port().drives, drives);
    assert_eq!(bench.rig.sequencer().current_step(), 1);
}

#[test]
fn step_mode_walks_the_cycle_one_press_at_a_time() {
    let mut bench = Bench::standard();
    bench.auto = false;

    for expected in (1..CYCLE_STEPS.len()).chain([0]) {
        start(&mut bench);
        let report = bench.run_until(Duration::from_secs(5), |report, _| {
            report.step_switched.is_some()
        });
        assert_eq!(report.step_switched, Some(expected));
        assert_eq!(report.run_mode, RunMode::Stopped);

        let idle = bench.run_for(Duration::from_millis(300));
        assert!(idle.iter().all(|report| report.step_switched.is_none()));
    }
    assert_eq!(bench.rig.status().control_mode, ControlMode::Step);
}

#[test]
fn switching_to_step_mode_halts_after_current_step() {
    let mut bench = Bench::standard();
    start(&mut bench);
    bench.run_for(Duration::from_millis(100));

    bench.auto = false;
    let report = bench.run_until(Duration::from_secs(5), |report, _| {
        report.step_switched.is_some()
    });
    assert_eq!(report.step_switched, Some(1));
    assert_eq!(report.run_mode, RunMode::Stopped);
    assert!(bench.events().contains(&TelemetryEventKind::ModeChanged));
}

#[test]
fn press_during_reset_flips_the_resume_decision() {
    let mut bench = Bench::standard();
    bench.jam(Some(ActuatorId::Clamp));
    start(&mut bench);
    bench.run_until(Duration::from_secs(21), |_, rig| rig.sequencer().reset_mode());
    assert!(bench.rig.sequencer().resume_after_reset());

    assert!(bench.press());
    bench.tick();
    assert!(bench.rig.sequencer().reset_mode(), "reset keeps going");
    assert!(!bench.rig.sequencer().resume_after_reset());

    let done = bench.run_until(Duration::from_secs(10), |report, _| {
        matches!(report.reset, ResetProgress::Completed { .. })
    });
    assert_eq!(done.reset, ResetProgress::Completed { resumed: false });
    assert_eq!(done.run_mode, RunMode::Stopped);
    assert_eq!(done.current_step, 0);
}

#[test]
fn second_press_during_reset_restores_resume() {
    let mut bench = Bench::standard();
    bench.jam(Some(ActuatorId::Clamp));
    start(&mut bench);
    bench.run_until(Duration::from_secs(21), |_, rig| rig.sequencer().reset_mode());

    assert!(bench.press());
    bench.tick();
    bench.run_for(Duration::from_millis(250));
    assert!(bench.press());
    bench.tick();

    let done = bench.run_until(Duration::from_secs(10), |report, _| {
        matches!(report.reset, ResetProgress::Completed { .. })
    });
    assert_eq!(done.reset, ResetProgress::Completed { resumed: true });
    assert_eq!(done.run_mode, RunMode::Running);
}

#[test]
fn reset_stalls_while_recovery_stroke_is_jammed() {
    let mut bench = Bench::standard();
    bench.jam(Some(ActuatorId::Clamp));
    start(&mut bench);
    bench.run_until(Duration::from_secs(21), |_, rig| rig.sequencer().reset_mode());

    bench.jam(Some(ActuatorId::Sled));
    let stalled = bench.run_for(Duration::from_secs(60));
    assert!(
        stalled
            .iter()
            .all(|report| matches!(report.reset, ResetProgress::InProgress(_)))
    );
    assert!(bench.rig.sequencer().reset_mode());
    assert_eq!(bench.fault_count(0), 1);
}

#[test]
fn cleared_fault_counters_read_zero() {
    let mut bench = Bench::standard();
    bench.jam(Some(ActuatorId::Clamp));
    start(&mut bench);
    bench.run_until(Duration::from_secs(21), |_, rig| rig.sequencer().reset_mode());
    assert_eq!(bench.fault_count(0), 1);

    bench.rig.clear_faults().unwrap();
    assert_eq!(bench.rig.fault_counts().total(), 0);
}
