//! Liveness signalling.
//!
//! Two independent periodic actions driven from the main loop:
//!
//! ```text
//!  loop ──▶ Heartbeat::tick()   ──▶ broker  <prefix>heartbeat/   (15 s)
//!       └─▶ SignOfLife::tick()  ──▶ onboard LED toggle            (5 s)
//! ```
//!
//! Each signaler owns its own [`IntervalTimer`]; the loop just calls
//! `tick()` every iteration and never computes schedules itself.  Neither
//! tick blocks, and a failed heartbeat is reported, not fatal.

use log::debug;
use serde::Serialize;

use crate::app::ports::{BrokerPort, Clock, IndicatorPort};
use crate::diagnostics::LoopStats;
use crate::error::ConnectivityError;

// ═══════════════════════════════════════════════════════════════
//  Interval timer
// ═══════════════════════════════════════════════════════════════

/// Fires once per `interval_ms`.  The first check is always due.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval_ms: u64,
    last_fire_ms: Option<u64>,
}

impl IntervalTimer {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms: u64::from(interval_ms),
            last_fire_ms: None,
        }
    }

    /// Returns true (and re-arms) when the interval has elapsed.
    pub fn due(&mut self, now_ms: u64) -> bool {
        let fire = match self.last_fire_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        };
        if fire {
            self.last_fire_ms = Some(now_ms);
        }
        fire
    }
}

// ═══════════════════════════════════════════════════════════════
//  Heartbeat
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
struct HeartbeatPayload<'a> {
    uptime_ms: u64,
    stats: &'a LoopStats,
}

/// Periodic broker heartbeat on the device's heartbeat topic.
pub struct Heartbeat<C> {
    clock: C,
    timer: IntervalTimer,
    topic: heapless::String<64>,
}

impl<C: Clock> Heartbeat<C> {
    pub fn new(clock: C, interval_ms: u32, topic: &str) -> Self {
        let mut t = heapless::String::new();
        let _ = t.push_str(topic);
        Self {
            clock,
            timer: IntervalTimer::new(interval_ms),
            topic: t,
        }
    }

    /// Publish a heartbeat if one is due.  Returns whether one was sent.
    pub fn tick(
        &mut self,
        broker: &mut impl BrokerPort,
        stats: &LoopStats,
    ) -> Result<bool, ConnectivityError> {
        let now = self.clock.now_ms();
        if !self.timer.due(now) {
            return Ok(false);
        }
        let body = serde_json::to_vec(&HeartbeatPayload {
            uptime_ms: now,
            stats,
        })
        .map_err(|_| ConnectivityError::PublishFailed)?;
        broker.publish(&self.topic, &body)?;
        debug!("Heartbeat @ {} ms", now);
        Ok(true)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sign of life
// ═══════════════════════════════════════════════════════════════

/// Toggles the onboard indicator on its own schedule.
pub struct SignOfLife<C, I> {
    clock: C,
    timer: IntervalTimer,
    indicator: I,
}

impl<C: Clock, I: IndicatorPort> SignOfLife<C, I> {
    pub fn new(clock: C, interval_ms: u32, indicator: I) -> Self {
        Self {
            clock,
            timer: IntervalTimer::new(interval_ms),
            indicator,
        }
    }

    /// Toggle the indicator if due.  Returns whether it toggled.
    pub fn tick(&mut self) -> bool {
        if self.timer.due(self.clock.now_ms()) {
            self.indicator.toggle();
            true
        } else {
            false
        }
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }
}
