//! Single WS2812 ("NeoPixel") light source.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: one RMT TX channel bit-bangs the 24-bit GRB frame.
//! On host/test: tracks the committed colour in-memory only.

use crate::app::ports::Rgb;

/// Pack a colour into the WS2812 wire order (G, R, B, MSB first).
pub fn grb_word((r, g, b): Rgb) -> u32 {
    (u32::from(g) << 16) | (u32::from(r) << 8) | u32::from(b)
}

#[cfg(target_os = "espidf")]
pub use esp::NeoPixel;

#[cfg(not(target_os = "espidf"))]
pub use sim::NeoPixel;

#[cfg(target_os = "espidf")]
mod esp {
    use core::time::Duration;

    use esp_idf_hal::rmt::{FixedLengthSignal, PinState, Pulse, TxRmtDriver};
    use log::warn;

    use super::grb_word;
    use crate::app::ports::{RGB_OFF, Rgb};
    use crate::error::HardwareError;

    // WS2812 bit timings.
    const T0H_NS: u64 = 350;
    const T0L_NS: u64 = 800;
    const T1H_NS: u64 = 700;
    const T1L_NS: u64 = 600;

    pub struct NeoPixel {
        tx: TxRmtDriver<'static>,
        current: Rgb,
    }

    impl NeoPixel {
        /// `tx` must be configured with a clock divider of 1.
        pub fn new(tx: TxRmtDriver<'static>) -> Self {
            Self { tx, current: RGB_OFF }
        }

        /// Latch `colour` and transmit it.  Blocks for the ~30 µs frame.
        pub fn write(&mut self, colour: Rgb) -> Result<(), HardwareError> {
            self.transmit(grb_word(colour)).map_err(|e| {
                warn!("NeoPixel: RMT write failed: {:?}", e);
                HardwareError::LightWriteFailed
            })?;
            self.current = colour;
            Ok(())
        }

        pub fn colour(&self) -> Rgb {
            self.current
        }

        fn transmit(&mut self, word: u32) -> Result<(), esp_idf_hal::sys::EspError> {
            let ticks_hz = self.tx.counter_clock()?;
            let pulse = |ns| Duration::from_nanos(ns);
            let t0h = Pulse::new_with_duration(ticks_hz, PinState::High, &pulse(T0H_NS))?;
            let t0l = Pulse::new_with_duration(ticks_hz, PinState::Low, &pulse(T0L_NS))?;
            let t1h = Pulse::new_with_duration(ticks_hz, PinState::High, &pulse(T1H_NS))?;
            let t1l = Pulse::new_with_duration(ticks_hz, PinState::Low, &pulse(T1L_NS))?;

            let mut signal = FixedLengthSignal::<24>::new();
            for i in (0..24).rev() {
                let bit = (word >> i) & 1 != 0;
                let pair = if bit { (t1h, t1l) } else { (t0h, t0l) };
                signal.set(23 - i as usize, &pair)?;
            }
            self.tx.start_blocking(&signal)
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod sim {
    use crate::app::ports::{RGB_OFF, Rgb};
    use crate::error::HardwareError;

    #[derive(Debug, Default)]
    pub struct NeoPixel {
        current: Rgb,
        frames: u32,
    }

    impl NeoPixel {
        pub fn new() -> Self {
            Self {
                current: RGB_OFF,
                frames: 0,
            }
        }

        pub fn write(&mut self, colour: Rgb) -> Result<(), HardwareError> {
            self.current = colour;
            self.frames += 1;
            Ok(())
        }

        pub fn colour(&self) -> Rgb {
            self.current
        }

        /// Number of frames committed so far.
        pub fn frames(&self) -> u32 {
            self.frames
        }
    }
}
