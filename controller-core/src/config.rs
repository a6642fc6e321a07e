//! Tunable timing and escalation parameters for the rig controller.
//!
//! Both historically deployed rig configurations share the same control flow
//! and differ only in the values collected here, so the escalation policy,
//! strike limit, and cooldown are plain data rather than separate code paths.

use core::fmt;
use core::time::Duration;

use crate::cycle::ActuatorId;

/// Silence on the progress signal tolerated before a strike is recorded.
pub const DEFAULT_PROGRESS_TIMEOUT: Duration = Duration::from_secs(20);
/// Hold applied before the second strike retries.
pub const DEFAULT_ESCALATION_COOLDOWN: Duration = Duration::from_secs(180);
/// Strike that ends in a full stop.
pub const DEFAULT_STRIKE_LIMIT: u8 = 3;
/// Toggle period of the fault indicator.
pub const DEFAULT_BLINK_INTERVAL: Duration = Duration::from_millis(800);
/// Minimum spacing between accepted start/stop edges.
pub const DEFAULT_START_STOP_DEBOUNCE: Duration = Duration::from_millis(200);
/// Default weld cooling time.
pub const DEFAULT_COOLING_TIME: Duration = Duration::from_millis(1_500);
/// Shortest cooling time the weld head accepts.
pub const COOLING_TIME_MIN: Duration = Duration::from_millis(500);
/// Longest cooling time the weld head accepts.
pub const COOLING_TIME_MAX: Duration = Duration::from_secs(5);
/// Time budget for each half of the recovery stroke.
pub const DEFAULT_RECOVERY_STROKE: Duration = Duration::from_millis(1_200);
/// Control loop cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// How intermediate strikes are answered before the strike limit is reached.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EscalationPolicy {
    /// First strike resets at once; later strikes wait out `cooldown` with the
    /// fault indicator blinking before resetting.
    DelayedRetry { cooldown: Duration },
    /// Every strike below the limit resets at once.
    ImmediateRetry,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        EscalationPolicy::DelayedRetry {
            cooldown: DEFAULT_ESCALATION_COOLDOWN,
        }
    }
}

/// Timeout detection and escalation settings.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EscalationConfig {
    pub progress_timeout: Duration,
    pub strike_limit: u8,
    pub policy: EscalationPolicy,
}

impl EscalationConfig {
    pub const fn new(
        progress_timeout: Duration,
        strike_limit: u8,
        policy: EscalationPolicy,
    ) -> Self {
        Self {
            progress_timeout,
            strike_limit,
            policy,
        }
    }

    /// Returns the cooldown applied by the delayed-retry policy, if any.
    pub const fn cooldown(&self) -> Option<Duration> {
        match self.policy {
            EscalationPolicy::DelayedRetry { cooldown } => Some(cooldown),
            EscalationPolicy::ImmediateRetry => None,
        }
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROGRESS_TIMEOUT,
            DEFAULT_STRIKE_LIMIT,
            EscalationPolicy::default(),
        )
    }
}

/// Inclusive bounds for the weld cooling time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CoolingRange {
    pub min: Duration,
    pub max: Duration,
}

impl CoolingRange {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Validate that a cooling time sits within the configured range.
    pub fn allows(&self, cooling_time: Duration) -> bool {
        cooling_time >= self.min && cooling_time <= self.max
    }
}

impl Default for CoolingRange {
    fn default() -> Self {
        Self::new(COOLING_TIME_MIN, COOLING_TIME_MAX)
    }
}

/// Complete controller configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RigConfig {
    pub escalation: EscalationConfig,
    pub blink_interval: Duration,
    pub start_stop_debounce: Duration,
    pub cooling_time: Duration,
    pub cooling_range: CoolingRange,
    pub recovery_actuator: ActuatorId,
    pub recovery_stroke: Duration,
    pub tick_interval: Duration,
}

impl RigConfig {
    /// Configuration matching the standard rig.
    pub const fn standard() -> Self {
        Self {
            escalation: EscalationConfig::new(
                DEFAULT_PROGRESS_TIMEOUT,
                DEFAULT_STRIKE_LIMIT,
                EscalationPolicy::DelayedRetry {
                    cooldown: DEFAULT_ESCALATION_COOLDOWN,
                },
            ),
            blink_interval: DEFAULT_BLINK_INTERVAL,
            start_stop_debounce: DEFAULT_START_STOP_DEBOUNCE,
            cooling_time: DEFAULT_COOLING_TIME,
            cooling_range: CoolingRange::new(COOLING_TIME_MIN, COOLING_TIME_MAX),
            recovery_actuator: ActuatorId::Sled,
            recovery_stroke: DEFAULT_RECOVERY_STROKE,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }

    #[must_use]
    pub const fn with_escalation(mut self, escalation: EscalationConfig) -> Self {
        self.escalation = escalation;
        self
    }

    #[must_use]
    pub const fn with_progress_timeout(mut self, timeout: Duration) -> Self {
        self.escalation.progress_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: EscalationPolicy) -> Self {
        self.escalation.policy = policy;
        self
    }

    #[must_use]
    pub const fn with_strike_limit(mut self, strike_limit: u8) -> Self {
        self.escalation.strike_limit = strike_limit;
        self
    }

    #[must_use]
    pub const fn with_cooling_time(mut self, cooling_time: Duration) -> Self {
        self.cooling_time = cooling_time;
        self
    }

    #[must_use]
    pub const fn with_recovery_stroke(mut self, actuator: ActuatorId, stroke: Duration) -> Self {
        self.recovery_actuator = actuator;
        self.recovery_stroke = stroke;
        self
    }

    /// Checks the configuration for values the controller cannot honour.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.escalation.progress_timeout.is_zero() {
            return Err(ConfigError::ZeroProgressTimeout);
        }
        if self.escalation.strike_limit == 0 {
            return Err(ConfigError::ZeroStrikeLimit);
        }
        if let Some(cooldown) = self.escalation.cooldown()
            && cooldown.is_zero()
        {
            return Err(ConfigError::ZeroCooldown);
        }
        if self.blink_interval.is_zero() {
            return Err(ConfigError::ZeroBlinkInterval);
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.cooling_range.min > self.cooling_range.max {
            return Err(ConfigError::InvertedCoolingRange);
        }
        if !self.cooling_range.allows(self.cooling_time) {
            return Err(ConfigError::CoolingTimeOutOfRange {
                requested: self.cooling_time,
                range: self.cooling_range,
            });
        }
        Ok(())
    }
}

impl Default for RigConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Reasons a [`RigConfig`] or cycle table is rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    ZeroProgressTimeout,
    ZeroStrikeLimit,
    ZeroCooldown,
    ZeroBlinkInterval,
    ZeroTickInterval,
    InvertedCoolingRange,
    CoolingTimeOutOfRange {
        requested: Duration,
        range: CoolingRange,
    },
    EmptyCycle,
    CycleTooLong { steps: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroProgressTimeout => f.write_str("progress timeout must be non-zero"),
            ConfigError::ZeroStrikeLimit => f.write_str("strike limit must be at least 1"),
            ConfigError::ZeroCooldown => f.write_str("escalation cooldown must be non-zero"),
            ConfigError::ZeroBlinkInterval => f.write_str("blink interval must be non-zero"),
            ConfigError::ZeroTickInterval => f.write_str("tick interval must be non-zero"),
            ConfigError::InvertedCoolingRange => {
                f.write_str("cooling range minimum exceeds its maximum")
            }
            ConfigError::CoolingTimeOutOfRange { requested, range } => write!(
                f,
                "cooling time {}ms outside {}-{}ms",
                requested.as_millis(),
                range.min.as_millis(),
                range.max.as_millis()
            ),
            ConfigError::EmptyCycle => f.write_str("cycle table has no steps"),
            ConfigError::CycleTooLong { steps } => {
                write!(f, "cycle table has {steps} steps, more than supported")
            }
        }
    }
}
