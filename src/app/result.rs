//! Measurement records and the payloads built from them.
//!
//! Every command, accepted or rejected, yields exactly one [`ResultPayload`].
//! It is serialized once and the same bytes go to every sink.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::error::Error;

/// Spectral channel labels, lowest wavelength first.
pub const CHANNEL_NAMES: [&str; CHANNEL_COUNT] = [
    "ch410", "ch440", "ch470", "ch510", "ch550", "ch583", "ch620", "ch670",
];

pub const CHANNEL_COUNT: usize = 8;

/// One acquisition, keyed by [`CHANNEL_NAMES`] in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperimentResult {
    readings: [u16; CHANNEL_COUNT],
}

impl ExperimentResult {
    /// Zip raw sensor readings (sensor order) with the channel labels.
    pub fn from_readings(readings: [u16; CHANNEL_COUNT]) -> Self {
        Self { readings }
    }

    pub fn get(&self, channel: &str) -> Option<u16> {
        CHANNEL_NAMES
            .iter()
            .position(|&name| name == channel)
            .map(|i| self.readings[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u16)> + '_ {
        CHANNEL_NAMES.into_iter().zip(self.readings.iter().copied())
    }
}

/// What happened to one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Measured(ExperimentResult),
    Failed(Error),
}

/// The outbound document for one command.
///
/// Serialized key order: `_input_message`, then either the eight channels
/// or `error`, then `sd_card_ready`.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPayload {
    /// The request as received: parsed JSON, or the raw text if it wasn't.
    pub input: Value,
    pub outcome: Outcome,
    /// Whether the local log was available at boot.
    pub sd_card_ready: bool,
}

impl ResultPayload {
    pub fn is_measurement(&self) -> bool {
        matches!(self.outcome, Outcome::Measured(_))
    }

    pub fn error(&self) -> Option<&Error> {
        match &self.outcome {
            Outcome::Failed(e) => Some(e),
            Outcome::Measured(_) => None,
        }
    }

    fn serialize_fields<M: SerializeMap>(&self, map: &mut M) -> Result<(), M::Error> {
        map.serialize_entry("_input_message", &self.input)?;
        match &self.outcome {
            Outcome::Measured(result) => {
                for (name, reading) in result.iter() {
                    map.serialize_entry(name, &reading)?;
                }
            }
            Outcome::Failed(e) => {
                map.serialize_entry("error", &DisplayStr(e))?;
            }
        }
        map.serialize_entry("sd_card_ready", &self.sd_card_ready)
    }
}

impl Serialize for ResultPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.serialize_fields(&mut map)?;
        map.end()
    }
}

/// A result payload decorated with the public device metadata, as stored
/// in the remote database.
#[derive(Debug, Clone, Copy)]
pub struct RemoteDocument<'a> {
    pub payload: &'a ResultPayload,
    pub device_nickname: &'a str,
    pub encrypted_device_id_truncated: &'a str,
}

impl Serialize for RemoteDocument<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        self.payload.serialize_fields(&mut map)?;
        map.serialize_entry("device_nickname", self.device_nickname)?;
        map.serialize_entry(
            "encrypted_device_id_truncated",
            self.encrypted_device_id_truncated,
        )?;
        map.end()
    }
}

/// Serializes any `Display` value as a JSON string.
struct DisplayStr<'a, T: core::fmt::Display>(&'a T);

impl<T: core::fmt::Display> Serialize for DisplayStr<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self.0)
    }
}
