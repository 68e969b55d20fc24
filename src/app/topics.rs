//! Per-device topic namespace.
//!
//! Everything lives under `sdl-demo/esp32/<raw-id-hex>/`.  Commands arrive
//! below `GPIO/` and are subscribed with a `#` wildcard, so new command
//! kinds never need a fresh subscription.

use core::fmt::Write;

use crate::error::Error;

/// Root of every device namespace.
pub const TOPIC_ROOT: &str = "sdl-demo/esp32/";

pub type TopicString = heapless::String<64>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    prefix: TopicString,
    command_filter: TopicString,
    command_prefix: TopicString,
    results: TopicString,
    heartbeat: TopicString,
}

impl Topics {
    pub fn new(raw_id_hex: &str) -> Result<Self, Error> {
        let prefix = join(&[TOPIC_ROOT, raw_id_hex, "/"])?;
        Ok(Self {
            command_filter: join(&[&prefix, "GPIO/#"])?,
            command_prefix: join(&[&prefix, "GPIO/"])?,
            results: join(&[&prefix, "as7341/"])?,
            heartbeat: join(&[&prefix, "heartbeat/"])?,
            prefix,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Subscription filter for all command sub-topics.
    pub fn command_filter(&self) -> &str {
        &self.command_filter
    }

    pub fn results(&self) -> &str {
        &self.results
    }

    pub fn heartbeat(&self) -> &str {
        &self.heartbeat
    }

    /// True when `topic` is one of this device's command sub-topics.
    pub fn is_command(&self, topic: &str) -> bool {
        topic.starts_with(self.command_prefix.as_str())
    }
}

fn join(parts: &[&str]) -> Result<TopicString, Error> {
    let mut out = TopicString::new();
    for p in parts {
        out.write_str(p)
            .map_err(|_| Error::Config("topic prefix too long"))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout() {
        let t = Topics::new("7cdfa1b2c3d4").unwrap();
        assert_eq!(t.prefix(), "sdl-demo/esp32/7cdfa1b2c3d4/");
        assert_eq!(t.command_filter(), "sdl-demo/esp32/7cdfa1b2c3d4/GPIO/#");
        assert_eq!(t.results(), "sdl-demo/esp32/7cdfa1b2c3d4/as7341/");
        assert_eq!(t.heartbeat(), "sdl-demo/esp32/7cdfa1b2c3d4/heartbeat/");
    }

    #[test]
    fn command_routing() {
        let t = Topics::new("abc").unwrap();
        assert!(t.is_command("sdl-demo/esp32/abc/GPIO/28"));
        assert!(t.is_command("sdl-demo/esp32/abc/GPIO/"));
        assert!(!t.is_command("sdl-demo/esp32/abc/as7341/"));
        assert!(!t.is_command("sdl-demo/esp32/other/GPIO/28"));
    }

    #[test]
    fn oversized_id_rejected() {
        assert!(Topics::new(&"f".repeat(80)).is_err());
    }
}
