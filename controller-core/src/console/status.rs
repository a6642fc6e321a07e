//! Text rendering for console status, fault dumps and diagnostics lines.
//!
//! The firmware log and the emulator console print the same wording, so the
//! formatting lives here rather than in each front-end.

use core::fmt;
use core::time::Duration;

use crate::controller::StatusSnapshot;
use crate::cycle::{CycleStep, step_name};
use crate::faults::FaultCounts;
use crate::sequencer::{ControlMode, RunMode};
use crate::telemetry::{TelemetryEventKind, TelemetryPayload};

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the run line (e.g. `run=running mode=auto step=3 COOL WELD`).
    pub fn write_run_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.snapshot;
        write!(
            writer,
            "run={} mode={} step={} {}",
            run_label(snapshot.run_mode),
            mode_label(snapshot.control_mode),
            snapshot.current_step,
            snapshot.step_name
        )
    }

    /// Writes the recovery line (e.g. `reset=idle strikes=1/3 cooldown=no lamp=off`).
    pub fn write_recovery_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.snapshot;
        write!(writer, "reset={}", snapshot.reset_stage.label())?;
        if snapshot.reset_stage.is_active() {
            write!(writer, " resume={}", yes_no(snapshot.resume_after_reset))?;
        }
        write!(
            writer,
            " strikes={}/{} cooldown={} lamp={}",
            snapshot.strike_count,
            snapshot.strike_limit,
            yes_no(snapshot.cooldown_pending),
            if snapshot.indicator_active {
                "blinking"
            } else {
                "off"
            }
        )
    }

    /// Renders both lines into owned strings.
    #[cfg(feature = "alloc")]
    pub fn lines(&self) -> [alloc::string::String; 2] {
        let mut run = alloc::string::String::new();
        let mut recovery = alloc::string::String::new();
        // Writing into a `String` cannot fail.
        let _ = self.write_run_line(&mut run);
        let _ = self.write_recovery_line(&mut recovery);
        [run, recovery]
    }
}

impl fmt::Display for StatusFormatter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_run_line(f)?;
        f.write_str("\n")?;
        self.write_recovery_line(f)
    }
}

/// Operator dump of the persistent fault counters.
#[derive(Clone, Copy, Debug)]
pub struct FaultReport<'a> {
    counts: &'a FaultCounts,
    steps: &'a [CycleStep],
}

impl<'a> FaultReport<'a> {
    #[must_use]
    pub const fn new(counts: &'a FaultCounts, steps: &'a [CycleStep]) -> Self {
        Self { counts, steps }
    }
}

impl fmt::Display for FaultReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "faults total={}", self.counts.total())?;
        for (step, count) in self.counts.iter() {
            write!(f, "\n  {step} {:<16} {count}", step_name(self.steps, step))?;
        }
        Ok(())
    }
}

/// Single diagnostics line for a telemetry event.
#[derive(Clone, Copy, Debug)]
pub struct DiagnosticLine {
    event: TelemetryEventKind,
    payload: TelemetryPayload,
}

impl DiagnosticLine {
    #[must_use]
    pub const fn new(event: TelemetryEventKind, payload: TelemetryPayload) -> Self {
        Self { event, payload }
    }
}

impl fmt::Display for DiagnosticLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload {
            TelemetryPayload::Step(step) => {
                write!(f, "step {} {}", step.index, step.name)?;
                if let Some(elapsed) = step.elapsed_since_previous {
                    f.write_str(" after ")?;
                    write_duration(f, elapsed)?;
                }
                Ok(())
            }
            TelemetryPayload::Fault(fault) => {
                write!(f, "fault {} count=", fault.name)?;
                match fault.occurrences {
                    Some(count) => write!(f, "{count}")?,
                    None => f.write_str("?")?,
                }
                write!(f, " {} strike={}", fault.reason, fault.strike)
            }
            TelemetryPayload::Reset(reset) => write!(
                f,
                "{} stage={} resume={}",
                self.event,
                reset.stage.label(),
                yes_no(reset.resume)
            ),
            TelemetryPayload::Mode(mode) => write!(f, "mode {}", mode_label(mode)),
            TelemetryPayload::None => write!(f, "{}", self.event),
        }
    }
}

const fn run_label(mode: RunMode) -> &'static str {
    match mode {
        RunMode::Running => "running",
        RunMode::Stopped => "stopped",
    }
}

const fn mode_label(mode: ControlMode) -> &'static str {
    match mode {
        ControlMode::Auto => "auto",
        ControlMode::Step => "step",
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Duration) -> fmt::Result {
    if duration >= Duration::from_secs(1) {
        let millis = duration.as_millis();
        let seconds = millis / 1_000;
        let tenths = (millis % 1_000) / 100;
        write!(writer, "{seconds}.{tenths}s")
    } else {
        write!(writer, "{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::{CYCLE_STEPS, strap_cycle};
    use crate::reset::ResetStage;
    use crate::telemetry::{FaultTelemetry, ResetTelemetry, StepTelemetry};
    use heapless::String;

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot {
            current_step: 3,
            step_name: "COOL WELD",
            run_mode: RunMode::Running,
            control_mode: ControlMode::Auto,
            reset_stage: ResetStage::Idle,
            resume_after_reset: false,
            strike_count: 1,
            strike_limit: 3,
            cooldown_pending: false,
            indicator_active: false,
        }
    }

    #[test]
    fn renders_status_lines() {
        let snapshot = snapshot();
        let formatter = StatusFormatter::new(&snapshot);

        let mut run: String<64> = String::new();
        formatter.write_run_line(&mut run).unwrap();
        assert_eq!(run.as_str(), "run=running mode=auto step=3 COOL WELD");

        let mut recovery: String<64> = String::new();
        formatter.write_recovery_line(&mut recovery).unwrap();
        assert_eq!(
            recovery.as_str(),
            "reset=idle strikes=1/3 cooldown=no lamp=off"
        );
    }

    #[test]
    fn recovery_line_shows_resume_while_resetting() {
        let mut snapshot = snapshot();
        snapshot.reset_stage = ResetStage::Rearm;
        snapshot.resume_after_reset = true;
        snapshot.indicator_active = true;

        let mut line: String<80> = String::new();
        StatusFormatter::new(&snapshot)
            .write_recovery_line(&mut line)
            .unwrap();
        assert_eq!(
            line.as_str(),
            "reset=rearm resume=yes strikes=1/3 cooldown=no lamp=blinking"
        );
    }

    #[test]
    fn fault_report_lists_every_step() {
        let counts = FaultCounts::from_slice(&[0, 2, 0, 0, 0, 0, 0, 0, 1]);
        let mut text: String<512> = String::new();
        core::fmt::write(&mut text, format_args!("{}", FaultReport::new(&counts, strap_cycle())))
            .unwrap();

        assert!(text.starts_with("faults total=3\n"));
        assert!(text.contains("1 TENSION STRAP"));
        assert_eq!(text.lines().count(), 10);
    }

    #[test]
    fn diagnostic_lines_match_event_payloads() {
        let mut text: String<96> = String::new();
        let step = TelemetryPayload::Step(StepTelemetry::new(
            &CYCLE_STEPS[2],
            Some(Duration::from_millis(1_250)),
        ));
        core::fmt::write(
            &mut text,
            format_args!("{}", DiagnosticLine::new(TelemetryEventKind::StepSwitched(2), step)),
        )
        .unwrap();
        assert_eq!(text.as_str(), "step 2 WELD after 1.2s");

        text.clear();
        let fault = TelemetryPayload::Fault(FaultTelemetry::timeout(&CYCLE_STEPS[0], Some(4), 1));
        core::fmt::write(
            &mut text,
            format_args!("{}", DiagnosticLine::new(TelemetryEventKind::StepTimeout(0), fault)),
        )
        .unwrap();
        assert_eq!(text.as_str(), "fault CLAMP STRAP count=4 timeout strike=1");

        text.clear();
        let reset = TelemetryPayload::Reset(ResetTelemetry::new(ResetStage::DeEnergize, true));
        core::fmt::write(
            &mut text,
            format_args!("{}", DiagnosticLine::new(TelemetryEventKind::ResetRequested, reset)),
        )
        .unwrap();
        assert_eq!(text.as_str(), "reset-requested stage=de-energize resume=yes");
    }
}
