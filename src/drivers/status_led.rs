//! Onboard status LED.
//!
//! A single GPIO.  On ESP-IDF this is a `PinDriver<Output>`; on the host
//! any [`StatefulOutputPin`] fake works.

use embedded_hal::digital::StatefulOutputPin;
use log::warn;

pub struct StatusLed<P> {
    pin: P,
}

impl<P: StatefulOutputPin> StatusLed<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// Flip the LED.  A failed write is logged and ignored.
    pub fn toggle(&mut self) {
        if self.pin.toggle().is_err() {
            warn!("Status LED: toggle failed");
        }
    }

    pub fn is_on(&mut self) -> bool {
        self.pin.is_set_high().unwrap_or(false)
    }
}
