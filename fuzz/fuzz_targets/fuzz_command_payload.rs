//! Fuzz target: command payload parsing and validation.
//!
//! Drives arbitrary bytes through `parse_payload` + `validate` and asserts
//! that neither panics, that every accepted request is inside the hardware
//! limits, and that every rejection renders a non-empty reason.
//!
//! cargo fuzz run fuzz_command_payload

#![no_main]

use libfuzzer_sys::fuzz_target;
use sdl_demo::app::request::{self, Gain};

fuzz_target!(|data: &[u8]| {
    let value = match request::parse_payload(data) {
        Ok(v) => v,
        Err(e) => {
            assert!(!e.to_string().is_empty());
            return;
        }
    };

    match request::validate(&value) {
        Ok(req) => {
            // Accepted requests always carry an allowed gain step.
            let gain = req.settings().gain;
            assert!(Gain::ALL.contains(&gain));
            assert_eq!(Gain::from_multiplier(gain.multiplier()), Some(gain));
        }
        Err(e) => {
            let reason = e.to_string();
            assert!(!reason.is_empty());
            if let Some(field) = e.field() {
                assert!(reason.starts_with(field), "reason must lead with the field");
            }
        }
    }

    // Echoing the parsed input back must always serialize.
    let _ = serde_json::to_string(&value).unwrap();
});
