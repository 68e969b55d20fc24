//! Runtime diagnostics.
//!
//! Loop counters reported in every heartbeat, a free-heap reading for the
//! boot log, and a panic hook that logs the reason before the reset.

use serde::Serialize;

/// Counters maintained by the main loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    /// Commands that produced a measurement.
    pub accepted: u32,
    /// Commands rejected or aborted by a hardware fault.
    pub rejected: u32,
    pub sink_failures: u32,
    /// Successful reconnect-and-resubscribe cycles.
    pub reconnects: u32,
}

impl LoopStats {
    pub fn record_command(&mut self, accepted: bool, sink_failures: u32) {
        if accepted {
            self.accepted = self.accepted.wrapping_add(1);
        } else {
            self.rejected = self.rejected.wrapping_add(1);
        }
        self.sink_failures = self.sink_failures.wrapping_add(sink_failures);
    }

    pub fn record_reconnect(&mut self) {
        self.reconnects = self.reconnects.wrapping_add(1);
    }
}

/// Free heap in bytes.
#[cfg(target_os = "espidf")]
pub fn free_heap() -> u32 {
    unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
}

/// Free heap in bytes.  Synthetic on the host.
#[cfg(not(target_os = "espidf"))]
pub fn free_heap() -> u32 {
    307_200
}

// ───────────────────────────────────────────────────────────────
// Panic handler
// ───────────────────────────────────────────────────────────────

/// Install a panic hook that logs the reason before the default handler
/// resets the chip.  Call once, right after the logger is up.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };

        match info.location() {
            Some(loc) => log::error!("PANIC at {}:{}: {}", loc.file(), loc.line(), reason),
            None => log::error!("PANIC: {}", reason),
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_counters() {
        let mut s = LoopStats::default();
        s.record_command(true, 0);
        s.record_command(false, 2);
        s.record_reconnect();
        assert_eq!(
            s,
            LoopStats {
                accepted: 1,
                rejected: 1,
                sink_failures: 2,
                reconnects: 1,
            }
        );
    }

    #[test]
    fn serializes_for_heartbeat() {
        let json = serde_json::to_string(&LoopStats::default()).unwrap();
        assert_eq!(
            json,
            r#"{"accepted":0,"rejected":0,"sink_failures":0,"reconnects":0}"#
        );
    }
}
