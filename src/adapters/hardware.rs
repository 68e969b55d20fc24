//! Hardware adapter: bridges the peripheral drivers to the domain port traits.
//!
//! Owns the light source, the spectral sensor and the buzzer.  It is
//! constructed exactly once through [`HardwareAdapter::take`] and then lent
//! to the service by `&mut`, so no two commands can drive the instrument at
//! the same time.  On non-espidf targets the NeoPixel is the simulation stub.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::StatefulOutputPin;
use embedded_hal::i2c::I2c;
use embedded_hal::pwm::SetDutyCycle;
use log::info;

use crate::app::ports::{
    ActuatorPort, BuzzerPort, IndicatorPort, Rgb, SpectralSensorPort,
};
use crate::app::request::SensorSettings;
use crate::app::result::CHANNEL_COUNT;
use crate::drivers::as7341::As7341;
use crate::drivers::buzzer::Buzzer;
use crate::drivers::neopixel::NeoPixel;
use crate::drivers::status_led::StatusLed;
use crate::error::HardwareError;

static TAKEN: AtomicBool = AtomicBool::new(false);

/// Concrete adapter that combines the instrument hardware behind port traits.
pub struct HardwareAdapter<S, Z> {
    light: NeoPixel,
    sensor: S,
    buzzer: Z,
}

impl<S: SpectralSensorPort, Z: BuzzerPort> HardwareAdapter<S, Z> {
    /// Claim the instrument.  Fails with [`HardwareError::AlreadyTaken`] on
    /// every call after the first.
    pub fn take(light: NeoPixel, sensor: S, buzzer: Z) -> Result<Self, HardwareError> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            return Err(HardwareError::AlreadyTaken);
        }
        info!("Hardware: instrument claimed");
        Ok(Self {
            light,
            sensor,
            buzzer,
        })
    }

    pub fn light(&self) -> &NeoPixel {
        &self.light
    }
}

// ── Port implementations ──────────────────────────────────────

impl<S, Z> ActuatorPort for HardwareAdapter<S, Z> {
    fn write_colour(&mut self, colour: Rgb) -> Result<(), HardwareError> {
        self.light.write(colour)
    }
}

impl<S: SpectralSensorPort, Z> SpectralSensorPort for HardwareAdapter<S, Z> {
    fn configure(&mut self, settings: &SensorSettings) -> Result<(), HardwareError> {
        self.sensor.configure(settings)
    }

    fn read_channels(&mut self) -> Result<[u16; CHANNEL_COUNT], HardwareError> {
        self.sensor.read_channels()
    }
}

impl<S, Z: BuzzerPort> BuzzerPort for HardwareAdapter<S, Z> {
    fn beep(&mut self) -> Result<(), HardwareError> {
        self.buzzer.beep()
    }
}

// ── Driver → port bridges ─────────────────────────────────────

impl<I2C: I2c, D: DelayNs> SpectralSensorPort for As7341<I2C, D> {
    fn configure(&mut self, settings: &SensorSettings) -> Result<(), HardwareError> {
        As7341::configure(self, settings)
    }

    fn read_channels(&mut self) -> Result<[u16; CHANNEL_COUNT], HardwareError> {
        self.read_all_channels()
    }
}

impl<P: SetDutyCycle, D: DelayNs> BuzzerPort for Buzzer<P, D> {
    fn beep(&mut self) -> Result<(), HardwareError> {
        Buzzer::beep(self)
    }
}

impl<P: StatefulOutputPin> IndicatorPort for StatusLed<P> {
    fn toggle(&mut self) {
        StatusLed::toggle(self)
    }
}
