//! GPIO / peripheral pin assignments for the SDL demo board (ESP32-S3).
//!
//! Single source of truth: `main` builds every peripheral from these
//! numbers, nothing else hard-codes a pin.

// ---------------------------------------------------------------------------
// Light source (single WS2812 on an RMT channel)
// ---------------------------------------------------------------------------

pub const NEOPIXEL_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// AS7341 spectral sensor (I²C0)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 8;
pub const I2C_SCL_GPIO: i32 = 9;
/// Fast-mode I²C.  The AS7341 supports up to 400 kHz.
pub const I2C_FREQ_HZ: u32 = 400_000;

// ---------------------------------------------------------------------------
// Piezo buzzer (LEDC PWM)
// ---------------------------------------------------------------------------

pub const BUZZER_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Onboard status LED
// ---------------------------------------------------------------------------

pub const STATUS_LED_GPIO: i32 = 2;
