//! AS7341 11-channel spectral sensor driver.
//!
//! Generic over [`embedded_hal::i2c::I2c`] and [`DelayNs`], so the same
//! driver runs on the ESP-IDF I2C master and on a register-map fake in
//! host tests.
//!
//! The sensor has six ADCs, so the eight visible channels are read in two
//! passes through the SMUX:
//!
//! ```text
//!  pass 1: SMUX ← F1..F4 + Clear + NIR ─▶ read ADC0..5 ─▶ keep F1..F4
//!  pass 2: SMUX ← F5..F8 + Clear + NIR ─▶ read ADC0..5 ─▶ keep F5..F8
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::app::request::SensorSettings;
use crate::app::result::CHANNEL_COUNT;
use crate::error::HardwareError;

pub const I2C_ADDRESS: u8 = 0x39;

// ── Registers ─────────────────────────────────────────────────

const REG_ENABLE: u8 = 0x80;
const REG_ATIME: u8 = 0x81;
const REG_ID: u8 = 0x92;
const REG_CH0_DATA_L: u8 = 0x95;
const REG_STATUS2: u8 = 0xA3;
const REG_CFG1: u8 = 0xAA;
const REG_CFG6: u8 = 0xAF;
const REG_ASTEP_L: u8 = 0xCA;

const ENABLE_PON: u8 = 1 << 0;
const ENABLE_SP_EN: u8 = 1 << 1;
const ENABLE_SMUXEN: u8 = 1 << 4;
const STATUS2_AVALID: u8 = 1 << 6;
const CFG6_SMUX_CMD_WRITE: u8 = 2 << 3;

/// Part ID as it appears in bits 7:2 of the ID register.
const PART_ID: u8 = 0x09 << 2;

/// SMUX RAM image routing F1–F4, Clear and NIR onto ADC0–5.
const SMUX_F1_F4: [u8; 20] = [
    0x30, 0x01, 0x00, 0x00, 0x00, 0x42, 0x00, 0x00, 0x50, 0x00, 0x00, 0x00, 0x20, 0x04, 0x00,
    0x30, 0x01, 0x50, 0x00, 0x06,
];

/// SMUX RAM image routing F5–F8, Clear and NIR onto ADC0–5.
const SMUX_F5_F8: [u8; 20] = [
    0x00, 0x00, 0x00, 0x40, 0x02, 0x00, 0x10, 0x03, 0x50, 0x10, 0x03, 0x00, 0x00, 0x00, 0x24,
    0x00, 0x00, 0x50, 0x00, 0x06,
];

/// Polling step while waiting on SMUX / data-ready.
const POLL_STEP_US: u32 = 1_000;
/// Fixed allowance on top of the integration time.
const TIMEOUT_MARGIN_US: u64 = 50_000;
/// Upper bound on a SMUX load.
const SMUX_TIMEOUT_US: u64 = 20_000;

pub struct As7341<I2C, D> {
    i2c: I2C,
    delay: D,
    settings: SensorSettings,
}

impl<I2C: I2c, D: DelayNs> As7341<I2C, D> {
    /// Check the part ID, power the sensor up and apply default settings.
    pub fn new(i2c: I2C, delay: D) -> Result<Self, HardwareError> {
        let mut dev = Self {
            i2c,
            delay,
            settings: SensorSettings::default(),
        };
        let id = dev.read_reg(REG_ID)?;
        if id & 0xFC != PART_ID {
            return Err(HardwareError::SensorNotDetected);
        }
        dev.write_reg(REG_ENABLE, ENABLE_PON)?;
        dev.configure(&SensorSettings::default())?;
        info!("AS7341: detected (id=0x{:02X}), powered on", id);
        Ok(dev)
    }

    /// Program ATIME, ASTEP and gain.
    pub fn configure(&mut self, settings: &SensorSettings) -> Result<(), HardwareError> {
        self.write_reg(REG_ATIME, settings.atime)?;
        let [lo, hi] = settings.astep.to_le_bytes();
        self.write_regs(REG_ASTEP_L, &[lo, hi])?;
        self.write_reg(REG_CFG1, settings.gain.register_value())?;
        self.settings = *settings;
        debug!("AS7341: configured {:?}", settings);
        Ok(())
    }

    /// Acquire F1..F8, lowest wavelength first.
    pub fn read_all_channels(&mut self) -> Result<[u16; CHANNEL_COUNT], HardwareError> {
        let low = self.measure(&SMUX_F1_F4)?;
        let high = self.measure(&SMUX_F5_F8)?;

        let mut out = [0u16; CHANNEL_COUNT];
        out[..4].copy_from_slice(&low[..4]);
        out[4..].copy_from_slice(&high[..4]);
        Ok(out)
    }

    #[cfg(test)]
    fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    // ── Measurement cycle ─────────────────────────────────────

    /// One SMUX pass: load routing, integrate, read the six ADCs.
    fn measure(&mut self, smux: &[u8; 20]) -> Result<[u16; 6], HardwareError> {
        self.set_spectral_enable(false)?;
        self.load_smux(smux)?;
        self.set_spectral_enable(true)?;
        self.wait_data_ready()?;

        let mut raw = [0u8; 12];
        self.i2c
            .write_read(I2C_ADDRESS, &[REG_CH0_DATA_L], &mut raw)
            .map_err(bus_error)?;

        let mut adc = [0u16; 6];
        for (value, bytes) in adc.iter_mut().zip(raw.chunks_exact(2)) {
            *value = u16::from_le_bytes([bytes[0], bytes[1]]);
        }
        Ok(adc)
    }

    fn load_smux(&mut self, smux: &[u8; 20]) -> Result<(), HardwareError> {
        self.write_reg(REG_CFG6, CFG6_SMUX_CMD_WRITE)?;
        self.write_regs(0x00, smux)?;

        let enable = self.read_reg(REG_ENABLE)?;
        self.write_reg(REG_ENABLE, enable | ENABLE_SMUXEN)?;
        // SMUXEN self-clears once the routing is applied.
        self.poll_until(SMUX_TIMEOUT_US, |dev| {
            Ok(dev.read_reg(REG_ENABLE)? & ENABLE_SMUXEN == 0)
        })
    }

    fn set_spectral_enable(&mut self, on: bool) -> Result<(), HardwareError> {
        let enable = self.read_reg(REG_ENABLE)?;
        let value = if on {
            enable | ENABLE_SP_EN
        } else {
            enable & !ENABLE_SP_EN
        };
        self.write_reg(REG_ENABLE, value)
    }

    fn wait_data_ready(&mut self) -> Result<(), HardwareError> {
        let budget = self
            .settings
            .integration_time_us()
            .saturating_mul(2)
            .saturating_add(TIMEOUT_MARGIN_US);
        self.poll_until(budget, |dev| {
            Ok(dev.read_reg(REG_STATUS2)? & STATUS2_AVALID != 0)
        })
    }

    fn poll_until(
        &mut self,
        budget_us: u64,
        mut done: impl FnMut(&mut Self) -> Result<bool, HardwareError>,
    ) -> Result<(), HardwareError> {
        let mut waited = 0u64;
        loop {
            if done(self)? {
                return Ok(());
            }
            if waited >= budget_us {
                return Err(HardwareError::SensorTimeout);
            }
            self.delay.delay_us(POLL_STEP_US);
            waited = waited.saturating_add(u64::from(POLL_STEP_US));
        }
    }

    // ── Register access ───────────────────────────────────────

    fn read_reg(&mut self, reg: u8) -> Result<u8, HardwareError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(I2C_ADDRESS, &[reg], &mut buf)
            .map_err(bus_error)?;
        Ok(buf[0])
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), HardwareError> {
        self.i2c
            .write(I2C_ADDRESS, &[reg, value])
            .map_err(bus_error)
    }

    /// Burst write starting at `start`; the sensor auto-increments.
    fn write_regs(&mut self, start: u8, values: &[u8]) -> Result<(), HardwareError> {
        let mut buf = [0u8; 21];
        let len = values.len().min(buf.len() - 1);
        buf[0] = start;
        buf[1..=len].copy_from_slice(&values[..len]);
        self.i2c
            .write(I2C_ADDRESS, &buf[..=len])
            .map_err(bus_error)
    }
}

fn bus_error(e: impl embedded_hal::i2c::Error) -> HardwareError {
    debug!("AS7341: I2C error {:?}", e.kind());
    HardwareError::SensorBus
}
