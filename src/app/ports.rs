//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (light, sensor, broker, log sinks, storage) implement
//! these traits.  The [`AppService`](super::service::AppService) and the
//! [`CommandDispatcher`](super::dispatcher::CommandDispatcher) consume them
//! via generics, so the domain core never touches hardware directly.
//!
//! Every port error is typed; callers decide per class whether it aborts a
//! command, a single sink, or the broker session.

use crate::config::{Secrets, SystemConfig};
use crate::error::{ConnectivityError, HardwareError, SinkError};

use super::request::SensorSettings;
use super::result::{CHANNEL_COUNT, RemoteDocument};

/// Colour as (R, G, B) tuple, each 0–255.
pub type Rgb = (u8, u8, u8);

/// The "off" colour, used by reset and emergency shutdown.
pub const RGB_OFF: Rgb = (0, 0, 0);

// ───────────────────────────────────────────────────────────────
// Instrument ports (driven adapters: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// The light source under test.
pub trait ActuatorPort {
    /// Latch `colour` into the pixel buffer and commit it to the LED.
    /// The colour persists until the next write.
    fn write_colour(&mut self, colour: Rgb) -> Result<(), HardwareError>;
}

/// The multi-channel spectral detector.
pub trait SpectralSensorPort {
    /// Reprogram integration time, step count and gain.
    fn configure(&mut self, settings: &SensorSettings) -> Result<(), HardwareError>;

    /// Acquire all spectral channels, lowest wavelength first.
    /// Runs to completion once started.
    fn read_channels(&mut self) -> Result<[u16; CHANNEL_COUNT], HardwareError>;
}

/// Audible confirmation that a command was accepted.
pub trait BuzzerPort {
    fn beep(&mut self) -> Result<(), HardwareError>;
}

/// The onboard "alive" indicator.
pub trait IndicatorPort {
    fn toggle(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Broker port (driven adapter: domain ↔ publish/subscribe client)
// ───────────────────────────────────────────────────────────────

/// Maximum accepted inbound topic length.
pub const MAX_TOPIC_LEN: usize = 128;
/// Maximum accepted inbound payload length.
pub const MAX_PAYLOAD_LEN: usize = 512;

/// One message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: heapless::String<MAX_TOPIC_LEN>,
    pub payload: heapless::Vec<u8, MAX_PAYLOAD_LEN>,
}

impl InboundMessage {
    /// Build a message, or `None` when topic or payload exceed capacity.
    pub fn new(topic: &str, payload: &[u8]) -> Option<Self> {
        let mut t = heapless::String::new();
        t.push_str(topic).ok()?;
        let p = heapless::Vec::from_slice(payload).ok()?;
        Some(Self { topic: t, payload: p })
    }
}

/// Best-effort (QoS 0) publish/subscribe session.
pub trait BrokerPort {
    /// (Re)establish the session.  Any previous session is torn down first.
    fn connect(&mut self) -> Result<(), ConnectivityError>;

    /// Register interest in `filter` (may contain `#`/`+` wildcards).
    fn subscribe(&mut self, filter: &str) -> Result<(), ConnectivityError>;

    /// Hand `payload` to the client for delivery on `topic`.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), ConnectivityError>;

    /// Return at most one pending inbound message.  Never blocks longer
    /// than the adapter's configured poll timeout.
    fn poll(&mut self) -> Result<Option<InboundMessage>, ConnectivityError>;
}

// ───────────────────────────────────────────────────────────────
// Telemetry sink ports
// ───────────────────────────────────────────────────────────────

/// Append-only local experiment log.
pub trait LocalLogPort {
    /// Append one serialized payload as a single line.
    fn append_line(&mut self, line: &str) -> Result<(), SinkError>;
}

/// Remote document database.
pub trait RemoteLogPort {
    /// Insert one document.  Transport and authentication are the adapter's
    /// business.
    fn insert_one(&mut self, document: &RemoteDocument<'_>) -> Result<(), SinkError>;
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Configuration / storage ports
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration and boot secrets.
///
/// Implementations MUST validate config values before persisting.
pub trait ConfigPort {
    /// Load configuration.  Returns [`SystemConfig::default()`] if none stored.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError>;

    /// Load provisioned secrets.  Falls back to build-time values when
    /// nothing is stored.
    fn load_secrets(&self) -> Result<Secrets, ConfigError>;

    /// Persist secrets (bench provisioning).
    fn save_secrets(&mut self, secrets: &Secrets) -> Result<(), ConfigError>;
}

/// Persistent key-value storage (NVS or in-memory).
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored blob failed to deserialize.
    Corrupted,
    /// A field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
