//! Experiment executor — one validated request in, one measurement out.
//!
//! ```text
//!  raw payload ─▶ validate ─▶ beep ─▶ write colour ─▶ configure ─▶ read
//!                    │                                   │
//!                    └──── Failed(reason) ◀──── Failed(hw) + shutdown
//! ```
//!
//! The light keeps the requested colour after a successful run.  Only
//! [`reset_experiment`] (or [`emergency_shutdown`] after a hardware fault)
//! turns it off.

use log::{debug, info, warn};
use serde_json::Value;

use crate::error::{Error, HardwareError};

use super::ports::{ActuatorPort, BuzzerPort, RGB_OFF, SpectralSensorPort};
use super::request::{self, ExperimentRequest};
use super::result::{ExperimentResult, Outcome, ResultPayload};

/// Drive the light and the sensor for one request.
///
/// The colour is committed strictly before the sensor is touched.  No
/// retries: the first driver error is returned as-is.
pub fn run_experiment(
    req: &ExperimentRequest,
    hw: &mut (impl ActuatorPort + SpectralSensorPort),
) -> Result<ExperimentResult, HardwareError> {
    hw.write_colour(req.colour())?;
    hw.configure(&req.settings())?;
    let readings = hw.read_channels()?;
    Ok(ExperimentResult::from_readings(readings))
}

/// Turn the light off.  Idempotent.
pub fn reset_experiment(hw: &mut impl ActuatorPort) -> Result<(), HardwareError> {
    hw.write_colour(RGB_OFF)
}

/// Best-effort reset used after a fault; never fails the caller.
pub fn emergency_shutdown(hw: &mut impl ActuatorPort) {
    if let Err(e) = reset_experiment(hw) {
        warn!("Emergency shutdown could not reset light: {}", e);
    }
}

// ───────────────────────────────────────────────────────────────
// Per-command context
// ───────────────────────────────────────────────────────────────

/// Execution context for exactly one inbound command.
///
/// Built fresh per message and consumed by [`Experiment::try_experiment`],
/// so no state leaks from one command into the next.
pub struct Experiment<'a, H> {
    hw: &'a mut H,
    sd_card_ready: bool,
}

impl<'a, H> Experiment<'a, H>
where
    H: ActuatorPort + SpectralSensorPort + BuzzerPort,
{
    pub fn new(hw: &'a mut H, sd_card_ready: bool) -> Self {
        Self { hw, sd_card_ready }
    }

    /// Validate `raw`, run it if valid, and describe what happened.
    pub fn try_experiment(mut self, raw: &[u8]) -> ResultPayload {
        let (input, outcome) = match request::parse_payload(raw) {
            Ok(value) => {
                let outcome = self.run_parsed(&value);
                (value, outcome)
            }
            Err(e) => {
                let text = String::from_utf8_lossy(raw).into_owned();
                (Value::String(text), Outcome::Failed(e.into()))
            }
        };
        ResultPayload {
            input,
            outcome,
            sd_card_ready: self.sd_card_ready,
        }
    }

    fn run_parsed(&mut self, value: &Value) -> Outcome {
        let req = match request::validate(value) {
            Ok(req) => req,
            Err(e) => {
                info!("Rejected command: {}", e);
                return Outcome::Failed(e.into());
            }
        };
        debug!("Accepted {:?}", req);

        if let Err(e) = self.hw.beep() {
            warn!("Buzzer: {}", e);
        }

        match run_experiment(&req, &mut *self.hw) {
            Ok(result) => Outcome::Measured(result),
            Err(e) => {
                warn!("Experiment aborted: {}", e);
                emergency_shutdown(&mut *self.hw);
                Outcome::Failed(Error::Hardware(e))
            }
        }
    }
}
