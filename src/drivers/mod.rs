//! Peripheral drivers: light source, spectral sensor, buzzer, status LED
//! and the task watchdog.

pub mod as7341;
pub mod buzzer;
pub mod neopixel;
pub mod status_led;
pub mod watchdog;
