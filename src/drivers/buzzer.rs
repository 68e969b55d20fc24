//! Piezo buzzer on a PWM channel.
//!
//! The tone frequency is fixed by the PWM timer the channel is bound to
//! ([`BEEP_FREQ_HZ`]); this driver only gates the duty cycle.

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::SetDutyCycle;

use crate::error::HardwareError;

/// Tone frequency the PWM timer must be configured with.
pub const BEEP_FREQ_HZ: u32 = 300;
/// Length of the confirmation beep.
pub const BEEP_MS: u32 = 100;

pub struct Buzzer<P, D> {
    pwm: P,
    delay: D,
}

impl<P: SetDutyCycle, D: DelayNs> Buzzer<P, D> {
    pub fn new(mut pwm: P, delay: D) -> Self {
        let _ = pwm.set_duty_cycle_fully_off();
        Self { pwm, delay }
    }

    /// Sound one 50 % duty beep.  Silences the output even if the wait is cut
    /// short by an error.
    pub fn beep(&mut self) -> Result<(), HardwareError> {
        self.pwm
            .set_duty_cycle_percent(50)
            .map_err(|_| HardwareError::BuzzerFailed)?;
        self.delay.delay_ms(BEEP_MS);
        self.pwm
            .set_duty_cycle_fully_off()
            .map_err(|_| HardwareError::BuzzerFailed)
    }
}
