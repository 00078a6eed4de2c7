//! Unified error types for the irrigation controller core.
//!
//! One enum per subsystem, all funnelling into a top-level [`Error`] so the
//! daemon loop's error handling stays uniform. Every fallible operation
//! returns a typed result; nothing here is used as control flow.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration failed to load or validate.
    Config(ConfigError),
    /// The ET duration engine hit an inconsistent mapping table.
    Duration(DurationError),
    /// A scheduler operation was rejected.
    Scheduler(SchedulerError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Duration(e) => write!(f, "duration: {e}"),
            Self::Scheduler(e) => write!(f, "scheduler: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating the configuration document.
///
/// Only *optional* per-zone fields are defaulted at load; a missing required
/// path or a malformed value is always surfaced, never papered over.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required path is absent from the document (e.g. `ZoneConfigs`).
    MissingPath(String),
    /// A run-time-of-day string did not split into hour/minute
    /// (with optional seconds).
    MalformedTimeField { field: String, value: String },
    /// A numeric field is out of its permitted range, or the zone
    /// collection is internally inconsistent.
    InvalidNumericField { field: String, reason: String },
    /// The document is not valid JSON at all.
    Syntax(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPath(path) => write!(f, "could not find path {path}"),
            Self::MalformedTimeField { field, value } => {
                write!(f, "bad time string for {field}: {value:?}")
            }
            Self::InvalidNumericField { field, reason } => {
                write!(f, "{field}: {reason}")
            }
            Self::Syntax(msg) => write!(f, "malformed document: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Duration engine errors
// ---------------------------------------------------------------------------

/// Errors from the ET duration engine.
#[derive(Debug, Clone, PartialEq)]
pub enum DurationError {
    /// The ET mapping table has a hole at the observed temperature.
    ///
    /// A loaded table is total-covering by invariant, so this indicates a
    /// corrupted configuration. It is logged and surfaced rather than
    /// defaulted to zero, so a bad table cannot silently stop watering.
    NoMatchingRange { temp: f64 },
}

impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingRange { temp } => {
                write!(f, "no ET range covers temperature {temp:.1}")
            }
        }
    }
}

impl std::error::Error for DurationError {}

impl From<DurationError> for Error {
    fn from(e: DurationError) -> Self {
        Self::Duration(e)
    }
}

// ---------------------------------------------------------------------------
// Scheduler errors
// ---------------------------------------------------------------------------

/// Errors returned synchronously by the zone run scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// Every wait-queue slot is occupied; the caller decides whether to
    /// retry later. Never retried automatically.
    QueueFull,
    /// A stop/cancel referenced a wait-queue slot beyond the queue depth.
    NoSuchSlot { index: usize },
    /// The requested zone number is not present in the configuration.
    NoSuchZone { zone: usize },
    /// The valve hardware rejected an activate/deactivate command. The
    /// alarm counter is incremented but the scheduler loop keeps going.
    Hardware { zone: usize, detail: String },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "all run slots are used"),
            Self::NoSuchSlot { index } => write!(f, "no queued run at slot {index}"),
            Self::NoSuchZone { zone } => write!(f, "zone {zone} is not configured"),
            Self::Hardware { zone, detail } => {
                write!(f, "valve command for zone {zone} failed: {detail}")
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<SchedulerError> for Error {
    fn from(e: SchedulerError) -> Self {
        Self::Scheduler(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
