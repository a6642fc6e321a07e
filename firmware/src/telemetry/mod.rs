//! Diagnostics sink for the firmware control loop.
//!
//! Every event lands in the fixed-capacity `controller-core` telemetry ring
//! and is mirrored to defmt on target (stdout on host) using the console's
//! diagnostic wording, so RTT logs read the same as emulator transcripts.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use controller_core::console::status::DiagnosticLine;
use controller_core::cycle::CycleStep;
use controller_core::telemetry::{
    DiagnosticsSink, TelemetryEventKind, TelemetryPayload, TelemetryRecord, TelemetryRecorder,
};

use crate::rig::FirmwareInstant;

/// Telemetry ring bound to the firmware clock.
pub type FirmwareRecorder = TelemetryRecorder<FirmwareInstant>;

/// Log level chosen for an event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Severity {
    Info,
    Warn,
}

/// Classifies events that need an operator's attention.
pub const fn severity(event: TelemetryEventKind) -> Severity {
    match event {
        TelemetryEventKind::StepTimeout(_)
        | TelemetryEventKind::CooldownStarted
        | TelemetryEventKind::Shutdown
        | TelemetryEventKind::MaterialMissing
        | TelemetryEventKind::FaultStoreError => Severity::Warn,
        _ => Severity::Info,
    }
}

/// Sink that records into a statically allocated ring and logs each event.
pub struct LoggingSink {
    recorder: &'static mut FirmwareRecorder,
}

impl LoggingSink {
    pub fn new(recorder: &'static mut FirmwareRecorder) -> Self {
        Self { recorder }
    }

    pub fn recorder(&self) -> &FirmwareRecorder {
        self.recorder
    }

    fn log_latest(&self) {
        if let Some(record) = self.recorder.latest() {
            emit_log(record);
        }
    }
}

impl DiagnosticsSink<FirmwareInstant> for LoggingSink {
    fn emit(&mut self, event: TelemetryEventKind, payload: TelemetryPayload, at: FirmwareInstant) {
        self.recorder.record(event, payload, at);
        self.log_latest();
    }

    fn step_switched(&mut self, step: &CycleStep, at: FirmwareInstant) {
        self.recorder.record_step_switch(step, at);
        self.log_latest();
    }
}

#[cfg(target_os = "none")]
fn emit_log(record: &TelemetryRecord<FirmwareInstant>) {
    let line = DiagnosticLine::new(record.event, record.details);
    let at_ms = record.timestamp.into_embassy().as_millis();
    match severity(record.event) {
        Severity::Warn => defmt::warn!(
            "diag #{} t={}ms {}",
            record.id,
            at_ms,
            defmt::Display2Format(&line)
        ),
        Severity::Info => defmt::info!(
            "diag #{} t={}ms {}",
            record.id,
            at_ms,
            defmt::Display2Format(&line)
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(record: &TelemetryRecord<FirmwareInstant>) {
    let line = DiagnosticLine::new(record.event, record.details);
    let at_ms = record.timestamp.into_embassy().as_millis();
    let level = match severity(record.event) {
        Severity::Warn => "WARN",
        Severity::Info => "INFO",
    };
    println!("{level} diag #{} t={at_ms}ms {line}", record.id);
}
