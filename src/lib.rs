//! SDL demo firmware library.
//!
//! Remote self-driving-lab instrument: experiment commands arrive over MQTT,
//! are validated, drive a NeoPixel and an AS7341 spectral sensor, and the
//! readings fan out to the broker, a local log file and a remote document
//! database.
//!
//! Every module compiles on the host; ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` inside each module, with simulation
//! backends in its place for tests.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod drivers;
pub mod error;
pub mod liveness;
pub mod pins;

pub use error::{Error, Result};
