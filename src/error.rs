//! Unified error types for the SDL demo firmware.
//!
//! Four failure classes flow through the command pipeline, and each one has
//! a different blast radius:
//!
//! | Class        | Scope                         | Recovery                      |
//! |--------------|-------------------------------|-------------------------------|
//! | Validation   | one command, before hardware  | failure payload, no hardware  |
//! | Hardware     | one command                   | failure payload, light reset  |
//! | Sink         | one sink of one command       | logged, siblings still run    |
//! | Connectivity | broker session                | reconnect-and-resubscribe     |
//!
//! Nothing here is allowed to terminate the control loop.

use core::fmt;

/// Fixed-capacity text used to echo the offending value in a rejection.
pub type ValueText = heapless::String<48>;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An experiment request was rejected before reaching hardware.
    Validation(ValidationError),
    /// The light source or the spectral sensor failed mid-command.
    Hardware(HardwareError),
    /// One telemetry sink could not accept a result.
    Sink(SinkError),
    /// The broker session failed.
    Connectivity(ConnectivityError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "{e}"),
            Self::Hardware(e) => write!(f, "hardware: {e}"),
            Self::Sink(e) => write!(f, "sink: {e}"),
            Self::Connectivity(e) => write!(f, "connectivity: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// Why a command payload was refused.
///
/// Carries the field name, the constraint it broke and the value that was
/// actually received, so the failure payload is self-explanatory to the
/// remote operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Payload is not a JSON object.
    Malformed(ValueText),
    /// A required field is absent.
    Missing { field: &'static str },
    /// Field present but of the wrong JSON kind.
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
        found_kind: &'static str,
        actual: ValueText,
    },
    /// Numeric field outside its hardware-safe range.
    OutOfRange {
        field: &'static str,
        range: &'static str,
        actual: ValueText,
    },
    /// Numeric field inside the range but not one of the permitted steps.
    NotAllowed {
        field: &'static str,
        allowed: &'static str,
        actual: ValueText,
    },
}

impl ValidationError {
    /// Name of the offending field, if the error concerns a single field.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Malformed(_) => None,
            Self::Missing { field }
            | Self::TypeMismatch { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::NotAllowed { field, .. } => Some(field),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(detail) => write!(f, "malformed request: {detail}"),
            Self::Missing { field } => write!(f, "{field} is required but missing"),
            Self::TypeMismatch {
                field,
                expected,
                found_kind,
                actual,
            } => write!(f, "{field} must be {expected}, not {found_kind} ({actual})"),
            Self::OutOfRange {
                field,
                range,
                actual,
            } => write!(f, "{field} value {actual} out of range ({range})"),
            Self::NotAllowed {
                field,
                allowed,
                actual,
            } => write!(f, "{field} value {actual} not one of {allowed}"),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareError {
    /// I2C transaction with the spectral sensor failed.
    SensorBus,
    /// Sensor did not answer with the expected part ID.
    SensorNotDetected,
    /// Sensor did not signal data-ready within the integration window.
    SensorTimeout,
    /// Light source write (RMT/pixel commit) failed.
    LightWriteFailed,
    /// Buzzer PWM write failed.
    BuzzerFailed,
    /// Hardware handles were already claimed.
    AlreadyTaken,
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorBus => write!(f, "spectral sensor bus error"),
            Self::SensorNotDetected => write!(f, "spectral sensor not detected"),
            Self::SensorTimeout => write!(f, "spectral sensor acquisition timed out"),
            Self::LightWriteFailed => write!(f, "light source write failed"),
            Self::BuzzerFailed => write!(f, "buzzer write failed"),
            Self::AlreadyTaken => write!(f, "hardware handles already taken"),
        }
    }
}

impl From<HardwareError> for Error {
    fn from(e: HardwareError) -> Self {
        Self::Hardware(e)
    }
}

// ---------------------------------------------------------------------------
// Sink errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    /// Network publish of the result failed.
    Publish(ConnectivityError),
    /// Local log file could not be opened or written.
    LocalIo,
    /// Payload could not be serialized.
    Encode,
    /// Remote database request could not be sent.
    RemoteTransport,
    /// Remote database answered with a non-success status.
    RemoteStatus(u16),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Publish(e) => write!(f, "publish failed: {e}"),
            Self::LocalIo => write!(f, "local log I/O error"),
            Self::Encode => write!(f, "payload encoding failed"),
            Self::RemoteTransport => write!(f, "remote database unreachable"),
            Self::RemoteStatus(code) => write!(f, "remote database returned HTTP {code}"),
        }
    }
}

impl From<SinkError> for Error {
    fn from(e: SinkError) -> Self {
        Self::Sink(e)
    }
}

// ---------------------------------------------------------------------------
// Connectivity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    /// Broker session could not be established.
    ConnectFailed,
    /// Subscription request was refused or could not be sent.
    SubscribeFailed,
    /// Outbound message could not be handed to the client.
    PublishFailed,
    /// An established session dropped (seen on poll).
    PollFailed,
    /// No live session.
    NotConnected,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "broker connect failed"),
            Self::SubscribeFailed => write!(f, "broker subscribe failed"),
            Self::PublishFailed => write!(f, "broker publish failed"),
            Self::PollFailed => write!(f, "broker poll failed"),
            Self::NotConnected => write!(f, "broker not connected"),
        }
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
