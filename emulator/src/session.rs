use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::Add;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant as HostInstant};

use controller_core::actuation::{ActuationPort, ActuatorOutputs, TimedActuationPort};
use controller_core::config::{ConfigError, RigConfig};
use controller_core::console::status::{DiagnosticLine, FaultReport, StatusFormatter};
use controller_core::console::{self, COMMANDS, ConsoleCommand, FaultsCommand};
use controller_core::controller::{RigController, TickInputs, TickReport};
use controller_core::cycle::{
    ACTUATOR_COUNT, ActuatorId, ActuatorState, CycleStep, MAX_CYCLE_STEPS, strap_cycle,
};
use controller_core::faults::{FaultCounterStore, FaultCounts, FaultStoreError, RamFaultCounters};
use controller_core::latch::StartStopLatch;
use controller_core::sequencer::ControlMode;
use controller_core::telemetry::{
    DiagnosticsSink, TelemetryEventKind, TelemetryInstant, TelemetryPayload, TelemetryRecorder,
};

/// Step that begins once the sled has reached the right end switch.
const END_SWITCH_STEP: usize = 8;

/// Upper bound for a single `wait`, so a typo cannot spin for hours.
const MAX_WAIT: Duration = Duration::from_secs(3_600);

/// Virtual rig clock; only advanced by console commands.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SimInstant(Duration);

impl SimInstant {
    pub fn elapsed(self) -> Duration {
        self.0
    }

    fn as_millis_u32(self) -> u32 {
        u32::try_from(self.0.as_millis()).unwrap_or(u32::MAX)
    }
}

impl Add<Duration> for SimInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl TelemetryInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

/// Valve bank that only remembers output levels.
#[derive(Debug, Default)]
pub struct SimValves {
    energised: [bool; ACTUATOR_COUNT],
}

impl SimValves {
    fn describe(&self) -> String {
        let mut line = String::from("valves");
        for (index, &level) in self.energised.iter().enumerate() {
            if let Some(actuator) = ActuatorId::from_index(index) {
                line.push_str(&format!(" {actuator}={}", if level { "on" } else { "off" }));
            }
        }
        line
    }
}

impl ActuatorOutputs for SimValves {
    fn apply(&mut self, actuator: ActuatorId, state: ActuatorState) {
        self.energised[actuator.as_index()] = state.is_energised();
    }

    fn release_all(&mut self) {
        self.energised = [false; ACTUATOR_COUNT];
    }
}

/// Timed actuation port with one actuator that can be stalled from the console.
pub struct SimPort {
    inner: TimedActuationPort<SimValves, SimInstant>,
    jammed: Option<ActuatorId>,
}

impl SimPort {
    fn new() -> Self {
        Self {
            inner: TimedActuationPort::new(SimValves::default()),
            jammed: None,
        }
    }
}

impl ActuationPort<SimInstant> for SimPort {
    fn drive(
        &mut self,
        actuator: ActuatorId,
        target: ActuatorState,
        max_duration: Duration,
        hold: Duration,
        now: SimInstant,
    ) -> bool {
        let done = self.inner.drive(actuator, target, max_duration, hold, now);
        done && self.jammed != Some(actuator)
    }

    fn set_immediate(&mut self, actuator: ActuatorId, state: ActuatorState) {
        self.inner.set_immediate(actuator, state);
    }

    fn de_energize_all(&mut self) {
        self.inner.de_energize_all();
    }
}

/// Fault counters persisted to a `step=count` text file.
///
/// Every change is written to a sibling temp file and renamed over the store,
/// and only then applied to the in-memory counters.
pub struct FileFaultStore {
    path: PathBuf,
    counters: RamFaultCounters,
    steps: usize,
}

impl FileFaultStore {
    /// Opens the store at `path`, starting from zero when the file is absent.
    pub fn open(path: impl Into<PathBuf>, steps: usize) -> io::Result<Self> {
        let path = path.into();
        let persisted = match fs::read_to_string(&path) {
            Ok(text) => parse_counts(&text, steps)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err),
        };

        Ok(Self {
            counters: RamFaultCounters::from_counts(steps, &persisted),
            path,
            steps,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }

    fn persist(&self, counters: &RamFaultCounters) -> io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut text = String::from("# strap rig fault counters (step=count)\n");
        for (step, count) in counters.read_all().iter() {
            text.push_str(&format!("{step}={count}\n"));
        }

        let staging = self.staging_path();
        fs::write(&staging, text)?;
        fs::rename(&staging, &self.path).inspect_err(|_| {
            let _ = fs::remove_file(&staging);
        })
    }

    fn commit(&mut self, counters: RamFaultCounters) -> Result<(), FaultStoreError> {
        self.persist(&counters)
            .map_err(|_| FaultStoreError::Storage)?;
        self.counters = counters;
        Ok(())
    }
}

impl FaultCounterStore for FileFaultStore {
    fn increment(&mut self, step: usize) -> Result<u16, FaultStoreError> {
        let mut next = self.counters.clone();
        let count = next.increment(step)?;
        self.commit(next)?;
        Ok(count)
    }

    fn read(&self, step: usize) -> Result<u16, FaultStoreError> {
        self.counters.read(step)
    }

    fn read_all(&self) -> FaultCounts {
        self.counters.read_all()
    }

    fn clear_all(&mut self) -> Result<(), FaultStoreError> {
        self.commit(RamFaultCounters::new(self.steps))
    }
}

fn parse_counts(text: &str, steps: usize) -> io::Result<Vec<u16>> {
    let mut counts = vec![0; steps.min(MAX_CYCLE_STEPS)];
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed = line.split_once('=').and_then(|(key, value)| {
            Some((key.trim().parse::<usize>().ok()?, value.trim().parse::<u16>().ok()?))
        });
        let Some((step, count)) = parsed else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("fault store line {}: expected `step=count`, found `{line}`", number + 1),
            ));
        };
        // Counters for steps the cycle no longer has are dropped.
        if let Some(slot) = counts.get_mut(step) {
            *slot = count;
        }
    }
    Ok(counts)
}

/// Records telemetry and queues a console line for every event.
pub struct ConsoleSink {
    recorder: TelemetryRecorder<SimInstant>,
    pending: Vec<(SimInstant, String)>,
}

impl ConsoleSink {
    fn new() -> Self {
        Self {
            recorder: TelemetryRecorder::new(),
            pending: Vec::new(),
        }
    }

    fn drain(&mut self) -> Vec<String> {
        self.pending
            .drain(..)
            .map(|(at, line)| format!("[{}] {line}", format_clock(at)))
            .collect()
    }
}

impl DiagnosticsSink<SimInstant> for ConsoleSink {
    fn emit(&mut self, event: TelemetryEventKind, payload: TelemetryPayload, at: SimInstant) {
        self.recorder.emit(event, payload, at);
        self.pending
            .push((at, DiagnosticLine::new(event, payload).to_string()));
    }

    fn step_switched(&mut self, step: &CycleStep, at: SimInstant) {
        self.recorder.record_step_switch(step, at);
        if let Some(record) = self.recorder.latest() {
            self.pending
                .push((at, DiagnosticLine::new(record.event, record.details).to_string()));
        }
    }
}

type SimRig = RigController<SimInstant, SimPort, FileFaultStore, ConsoleSink>;

/// Options accepted on the emulator command line.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub fault_store: PathBuf,
    pub transcript: Option<PathBuf>,
    pub config: RigConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            fault_store: PathBuf::from("strap-rig-faults.txt"),
            transcript: None,
            config: RigConfig::standard(),
        }
    }
}

/// Reply to one console line.
#[derive(Debug, Default)]
pub struct Reply {
    pub lines: Vec<String>,
    pub quit: bool,
}

impl Reply {
    fn lines(lines: Vec<String>) -> Self {
        Self { lines, quit: false }
    }
}

/// Console session driving a simulated rig on a virtual clock.
pub struct Session {
    rig: SimRig,
    latch: StartStopLatch,
    now: SimInstant,
    tick_interval: Duration,
    auto_mode: bool,
    material_present: bool,
    progress_pending: bool,
    transcript: Option<TranscriptLogger>,
    started_at: HostInstant,
}

impl Session {
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        let config = options.config;
        let store = FileFaultStore::open(&options.fault_store, strap_cycle().len())?;
        let rig = RigController::new(config, SimPort::new(), store, ConsoleSink::new())
            .map_err(config_error)?;
        let transcript = options
            .transcript
            .as_deref()
            .map(TranscriptLogger::new)
            .transpose()?;

        Ok(Self {
            rig,
            latch: StartStopLatch::new(config.start_stop_debounce),
            now: SimInstant::default(),
            tick_interval: config.tick_interval,
            auto_mode: true,
            material_present: true,
            progress_pending: false,
            transcript,
            started_at: HostInstant::now(),
        })
    }

    pub fn fault_store_path(&self) -> &Path {
        self.rig.store().path()
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Reply> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Reply::default());
        }
        self.log(TranscriptRole::Operator, trimmed)?;

        let reply = match console::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => Reply::lines(vec![format!("ERR {err}")]),
        };

        for response in &reply.lines {
            self.log(TranscriptRole::Rig, response)?;
        }
        Ok(reply)
    }

    fn execute(&mut self, command: ConsoleCommand<'_>) -> Reply {
        let mut lines = Vec::new();
        match command {
            ConsoleCommand::Start if self.rig.sequencer().is_running() => {
                lines.push("already running".to_string());
            }
            ConsoleCommand::Stop if self.is_idle() => {
                lines.push("already stopped".to_string());
            }
            ConsoleCommand::Start | ConsoleCommand::Stop | ConsoleCommand::Toggle => {
                if self.latch.signal(self.now.as_millis_u32()) {
                    self.tick_once(&mut lines);
                } else {
                    lines.push("ignored: start/stop pressed again inside debounce".to_string());
                }
            }
            ConsoleCommand::Mode(mode) => {
                self.auto_mode = mode == ControlMode::Auto;
                self.tick_once(&mut lines);
            }
            ConsoleCommand::Material { present } => {
                self.material_present = present;
                self.tick_once(&mut lines);
            }
            ConsoleCommand::Progress => {
                self.progress_pending = true;
                self.tick_once(&mut lines);
            }
            ConsoleCommand::Wait(duration) => self.wait(duration.min(MAX_WAIT), &mut lines),
            ConsoleCommand::Jam(actuator) => {
                self.rig.port_mut().jammed = actuator;
                lines.push(match actuator {
                    Some(actuator) => format!("jam {actuator}"),
                    None => "jam off".to_string(),
                });
            }
            ConsoleCommand::Faults(FaultsCommand::Show) => {
                let counts = self.rig.fault_counts();
                let report = FaultReport::new(&counts, self.rig.steps()).to_string();
                lines.extend(report.lines().map(str::to_string));
            }
            ConsoleCommand::Faults(FaultsCommand::Clear) => match self.rig.clear_faults() {
                Ok(()) => lines.push("fault counters cleared".to_string()),
                Err(err) => lines.push(format!("ERR {err}")),
            },
            ConsoleCommand::Status => {
                let status = self.rig.status();
                lines.push(format!("clock=+{}", format_clock(self.now)));
                lines.extend(StatusFormatter::new(&status).lines());
                lines.push(self.rig.port().inner.outputs().describe());
            }
            ConsoleCommand::Help { topic } => lines.extend(help_lines(topic)),
            ConsoleCommand::Quit => {
                return Reply {
                    lines: vec!["Session closed.".to_string()],
                    quit: true,
                };
            }
        }
        Reply::lines(lines)
    }

    /// Stopped with nothing in flight that a press could still change.
    fn is_idle(&self) -> bool {
        let sequencer = self.rig.sequencer();
        !sequencer.is_running() && !sequencer.reset_mode()
    }

    fn wait(&mut self, duration: Duration, lines: &mut Vec<String>) {
        let deadline = self.now + duration;
        while self.now < deadline {
            self.tick_once(lines);
        }
        lines.push(format!("clock=+{}", format_clock(self.now)));
    }

    fn tick_once(&mut self, lines: &mut Vec<String>) {
        let inputs = TickInputs {
            start_stop: self.latch.take(),
            auto_mode: self.auto_mode,
            material_present: self.material_present,
            progress: std::mem::take(&mut self.progress_pending),
        };
        let report = self.rig.tick(inputs, self.now);
        self.follow_end_switch(&report);
        lines.extend(self.rig.sink_mut().drain());
        self.now = self.now + self.tick_interval;
    }

    fn follow_end_switch(&mut self, report: &TickReport<SimInstant>) {
        if report.step_switched == Some(END_SWITCH_STEP) {
            self.progress_pending = true;
        }
    }

    fn log(&mut self, role: TranscriptRole, line: &str) -> io::Result<()> {
        let elapsed = self.started_at.elapsed();
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(elapsed, role, line),
            None => Ok(()),
        }
    }
}

fn config_error(err: ConfigError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, err.to_string())
}

fn help_lines(topic: Option<&str>) -> Vec<String> {
    match topic {
        Some(name) => match console::find(name) {
            Some(entry) => vec![format!("{:<26} - {}", entry.usage, entry.summary)],
            None => vec![
                format!("No help available for `{name}`."),
                format!(
                    "Available topics: {}",
                    COMMANDS.iter().map(|entry| entry.name).collect::<Vec<_>>().join(", ")
                ),
            ],
        },
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            lines.extend(
                COMMANDS
                    .iter()
                    .map(|entry| format!("  {:<26} - {}", entry.usage, entry.summary)),
            );
            lines.push("Type `help <command>` for a specific command.".to_string());
            lines
        }
    }
}

fn format_clock(at: SimInstant) -> String {
    let elapsed = at.elapsed();
    format!("{}.{:03}s", elapsed.as_secs(), elapsed.subsec_millis())
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Operator,
    Rig,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Operator => "OP  >",
            TranscriptRole::Rig => "RIG <",
        }
    }
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Strap rig emulator transcript")?;
        writeln!(self.writer, "# Timestamps are host milliseconds since session start")?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}
