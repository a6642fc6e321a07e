//! Diagnostics event catalog and ring-buffer recorder shared by firmware and host targets.
//!
//! Event kinds serialize to compact numeric codes so the firmware can log
//! them cheaply, while payloads keep the step names and fault counts the
//! operator console prints. Everything stays `no_std` compatible.

use core::{convert::TryFrom, fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::cycle::{CycleStep, MAX_CYCLE_STEPS};
use crate::reset::ResetStage;
use crate::sequencer::ControlMode;

/// Monotonic identifier assigned to each telemetry record.
pub type EventId = u32;

/// Discriminated telemetry events emitted by the rig controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    StepSwitched(u8),
    StepTimeout(u8),
    CooldownStarted,
    CooldownElapsed,
    StrikesForgiven,
    ResetRequested,
    ResetStageChanged,
    ResetCompleted,
    Shutdown,
    MaterialMissing,
    RunStarted,
    RunStopped,
    ModeChanged,
    FaultStoreError,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::StepSwitched(step) => write!(f, "step-switched {step}"),
            TelemetryEventKind::StepTimeout(step) => write!(f, "step-timeout {step}"),
            TelemetryEventKind::CooldownStarted => f.write_str("cooldown-started"),
            TelemetryEventKind::CooldownElapsed => f.write_str("cooldown-elapsed"),
            TelemetryEventKind::StrikesForgiven => f.write_str("strikes-forgiven"),
            TelemetryEventKind::ResetRequested => f.write_str("reset-requested"),
            TelemetryEventKind::ResetStageChanged => f.write_str("reset-stage"),
            TelemetryEventKind::ResetCompleted => f.write_str("reset-completed"),
            TelemetryEventKind::Shutdown => f.write_str("shutdown"),
            TelemetryEventKind::MaterialMissing => f.write_str("material-missing"),
            TelemetryEventKind::RunStarted => f.write_str("run-started"),
            TelemetryEventKind::RunStopped => f.write_str("run-stopped"),
            TelemetryEventKind::ModeChanged => f.write_str("mode-changed"),
            TelemetryEventKind::FaultStoreError => f.write_str("fault-store-error"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const STEP_SWITCHED_BASE: u16 = 0x0000;
    const STEP_TIMEOUT_BASE: u16 = 0x0010;
    const COOLDOWN_STARTED_CODE: u16 = 0x0020;
    const COOLDOWN_ELAPSED_CODE: u16 = 0x0021;
    const STRIKES_FORGIVEN_CODE: u16 = 0x0022;
    const RESET_REQUESTED_CODE: u16 = 0x0023;
    const RESET_STAGE_CODE: u16 = 0x0024;
    const RESET_COMPLETED_CODE: u16 = 0x0025;
    const SHUTDOWN_CODE: u16 = 0x0026;
    const MATERIAL_MISSING_CODE: u16 = 0x0027;
    const RUN_STARTED_CODE: u16 = 0x0028;
    const RUN_STOPPED_CODE: u16 = 0x0029;
    const MODE_CHANGED_CODE: u16 = 0x002A;
    const FAULT_STORE_ERROR_CODE: u16 = 0x002B;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::StepSwitched(step) => Self::STEP_SWITCHED_BASE + u16::from(step),
            TelemetryEventKind::StepTimeout(step) => Self::STEP_TIMEOUT_BASE + u16::from(step),
            TelemetryEventKind::CooldownStarted => Self::COOLDOWN_STARTED_CODE,
            TelemetryEventKind::CooldownElapsed => Self::COOLDOWN_ELAPSED_CODE,
            TelemetryEventKind::StrikesForgiven => Self::STRIKES_FORGIVEN_CODE,
            TelemetryEventKind::ResetRequested => Self::RESET_REQUESTED_CODE,
            TelemetryEventKind::ResetStageChanged => Self::RESET_STAGE_CODE,
            TelemetryEventKind::ResetCompleted => Self::RESET_COMPLETED_CODE,
            TelemetryEventKind::Shutdown => Self::SHUTDOWN_CODE,
            TelemetryEventKind::MaterialMissing => Self::MATERIAL_MISSING_CODE,
            TelemetryEventKind::RunStarted => Self::RUN_STARTED_CODE,
            TelemetryEventKind::RunStopped => Self::RUN_STOPPED_CODE,
            TelemetryEventKind::ModeChanged => Self::MODE_CHANGED_CODE,
            TelemetryEventKind::FaultStoreError => Self::FAULT_STORE_ERROR_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant into a telemetry event, falling back to [`Custom`].
    ///
    /// [`Custom`]: TelemetryEventKind::Custom
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::COOLDOWN_STARTED_CODE => TelemetryEventKind::CooldownStarted,
            Self::COOLDOWN_ELAPSED_CODE => TelemetryEventKind::CooldownElapsed,
            Self::STRIKES_FORGIVEN_CODE => TelemetryEventKind::StrikesForgiven,
            Self::RESET_REQUESTED_CODE => TelemetryEventKind::ResetRequested,
            Self::RESET_STAGE_CODE => TelemetryEventKind::ResetStageChanged,
            Self::RESET_COMPLETED_CODE => TelemetryEventKind::ResetCompleted,
            Self::SHUTDOWN_CODE => TelemetryEventKind::Shutdown,
            Self::MATERIAL_MISSING_CODE => TelemetryEventKind::MaterialMissing,
            Self::RUN_STARTED_CODE => TelemetryEventKind::RunStarted,
            Self::RUN_STOPPED_CODE => TelemetryEventKind::RunStopped,
            Self::MODE_CHANGED_CODE => TelemetryEventKind::ModeChanged,
            Self::FAULT_STORE_ERROR_CODE => TelemetryEventKind::FaultStoreError,
            value if (Self::STEP_SWITCHED_BASE..Self::STEP_TIMEOUT_BASE).contains(&value) => {
                step_from_offset(value - Self::STEP_SWITCHED_BASE)
                    .map_or(TelemetryEventKind::Custom(value), TelemetryEventKind::StepSwitched)
            }
            value if (Self::STEP_TIMEOUT_BASE..Self::COOLDOWN_STARTED_CODE).contains(&value) => {
                step_from_offset(value - Self::STEP_TIMEOUT_BASE)
                    .map_or(TelemetryEventKind::Custom(value), TelemetryEventKind::StepTimeout)
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

fn step_from_offset(offset: u16) -> Option<u8> {
    u8::try_from(offset)
        .ok()
        .filter(|&step| usize::from(step) < MAX_CYCLE_STEPS)
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Step the sequencer switched to.
    Step(StepTelemetry),
    /// Timeout fault attributed to a step.
    Fault(FaultTelemetry),
    /// Reset procedure progress.
    Reset(ResetTelemetry),
    /// Control mode now in effect.
    Mode(ControlMode),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

/// Step switch payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StepTelemetry {
    pub index: u8,
    pub name: &'static str,
    pub elapsed_since_previous: Option<Duration>,
}

impl StepTelemetry {
    #[must_use]
    pub fn new(step: &CycleStep, elapsed_since_previous: Option<Duration>) -> Self {
        Self {
            index: truncate_step(step.index),
            name: step.name,
            elapsed_since_previous,
        }
    }
}

/// Reason codes attached to fault payloads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FaultReason {
    /// No progress signal inside the timeout window.
    Timeout,
    /// Implementation-specific extension.
    Custom(u8),
}

impl FaultReason {
    const TIMEOUT_CODE: u8 = 0x00;

    /// Encodes the reason into a compact numeric discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            FaultReason::Timeout => Self::TIMEOUT_CODE,
            FaultReason::Custom(code) => code,
        }
    }

    /// Decodes a compact numeric discriminant into a fault reason.
    #[must_use]
    pub const fn from_raw(code: u8) -> Self {
        match code {
            Self::TIMEOUT_CODE => FaultReason::Timeout,
            other => FaultReason::Custom(other),
        }
    }

    /// Returns `true` when the reason was decoded from an unknown code.
    #[must_use]
    pub const fn is_custom(self) -> bool {
        matches!(self, FaultReason::Custom(_))
    }

    pub const fn label(self) -> &'static str {
        match self {
            FaultReason::Timeout => "timeout",
            FaultReason::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fault payload: which step, how often it has failed, and why.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FaultTelemetry {
    pub step: u8,
    pub name: &'static str,
    /// Persistent count after this fault; `None` when the store failed.
    pub occurrences: Option<u16>,
    pub reason: FaultReason,
    pub strike: u8,
}

impl FaultTelemetry {
    #[must_use]
    pub fn timeout(step: &CycleStep, occurrences: Option<u16>, strike: u8) -> Self {
        Self {
            step: truncate_step(step.index),
            name: step.name,
            occurrences,
            reason: FaultReason::Timeout,
            strike,
        }
    }
}

/// Reset progress payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResetTelemetry {
    pub stage: ResetStage,
    pub resume: bool,
}

impl ResetTelemetry {
    #[must_use]
    pub const fn new(stage: ResetStage, resume: bool) -> Self {
        Self { stage, resume }
    }
}

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Trait implemented by monotonic instant wrappers used for telemetry tracking.
pub trait TelemetryInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Produced diagnostics interface of the controller.
///
/// Diagnostics are advisory: nothing in the control path depends on them.
pub trait DiagnosticsSink<I> {
    /// Records an arbitrary event with its payload.
    fn emit(&mut self, event: TelemetryEventKind, payload: TelemetryPayload, at: I);

    /// Records a step switch.
    fn step_switched(&mut self, step: &CycleStep, at: I) {
        self.emit(
            TelemetryEventKind::StepSwitched(truncate_step(step.index)),
            TelemetryPayload::Step(StepTelemetry::new(step, None)),
            at,
        );
    }

    /// Records a timeout fault.
    fn fault(&mut self, fault: FaultTelemetry, at: I) {
        self.emit(
            TelemetryEventKind::StepTimeout(fault.step),
            TelemetryPayload::Fault(fault),
            at,
        );
    }
}

/// Sink that drops every diagnostic.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopDiagnostics;

impl<I> DiagnosticsSink<I> for NoopDiagnostics {
    fn emit(&mut self, _: TelemetryEventKind, _: TelemetryPayload, _: I) {}
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    last_step_at: Option<TInstant>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            last_step_at: None,
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord<TInstant>> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }

    /// Records a step switch and captures the time spent in the previous step.
    pub fn record_step_switch(&mut self, step: &CycleStep, timestamp: TInstant) -> EventId {
        let elapsed = self
            .last_step_at
            .map(|previous| timestamp.saturating_duration_since(previous));
        self.last_step_at = Some(timestamp);

        self.record(
            TelemetryEventKind::StepSwitched(truncate_step(step.index)),
            TelemetryPayload::Step(StepTelemetry::new(step, elapsed)),
            timestamp,
        )
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<TInstant, const CAPACITY: usize> DiagnosticsSink<TInstant>
    for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy + TelemetryInstant,
{
    fn emit(&mut self, event: TelemetryEventKind, payload: TelemetryPayload, at: TInstant) {
        self.record(event, payload, at);
    }

    fn step_switched(&mut self, step: &CycleStep, at: TInstant) {
        self.record_step_switch(step, at);
    }
}

fn truncate_step(index: usize) -> u8 {
    match u8::try_from(index) {
        Ok(value) => value,
        Err(_) => u8::MAX,
    }
}
