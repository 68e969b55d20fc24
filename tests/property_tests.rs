//! Property tests for the command validator and the link/liveness timers.
//!
//! Runs on host (x86_64) only — proptest is not available for ESP32 targets.
//! On ESP32, these tests are compiled out.

#![cfg(not(target_os = "espidf"))]

use proptest::prelude::*;
use sdl_demo::app::request::{self, ExperimentRequest, Gain};
use sdl_demo::error::ValidationError;
use sdl_demo::liveness::IntervalTimer;
use serde_json::json;

const GAINS: [f64; 11] = [
    0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0, 256.0, 512.0,
];

// ── Validator: accepted inputs ────────────────────────────────

proptest! {
    /// Any in-range colour without settings gets the documented defaults.
    #[test]
    fn colour_only_gets_defaults(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255) {
        let req = request::validate(&json!({"R": r, "G": g, "B": b})).unwrap();
        prop_assert_eq!(req.colour(), (r, g, b));
        prop_assert_eq!(req.settings().atime, ExperimentRequest::DEFAULT_ATIME);
        prop_assert_eq!(req.settings().astep, ExperimentRequest::DEFAULT_ASTEP);
        prop_assert_eq!(req.settings().gain, ExperimentRequest::DEFAULT_GAIN);
    }

    /// Every allowed gain multiplier maps back to the same multiplier.
    #[test]
    fn allowed_gains_accepted(idx in 0usize..GAINS.len(), atime in 0u8..=255, astep in 0u16..=65535) {
        let gain = GAINS[idx];
        let req = request::validate(
            &json!({"R": 1, "G": 2, "B": 3, "atime": atime, "astep": astep, "gain": gain}),
        )
        .unwrap();
        prop_assert_eq!(req.settings().gain, Gain::ALL[idx]);
        prop_assert_eq!(req.settings().gain.multiplier(), gain);
        prop_assert_eq!(req.settings().atime, atime);
        prop_assert_eq!(req.settings().astep, astep);
    }
}

// ── Validator: rejected inputs ────────────────────────────────

proptest! {
    /// Colours above 255 are always out of range and name the field.
    #[test]
    fn colour_above_range_rejected(bad in 256i64..100_000, field in 0usize..3) {
        let mut v = json!({"R": 0, "G": 0, "B": 0});
        let name = ["R", "G", "B"][field];
        v[name] = json!(bad);
        let err = request::validate(&v).unwrap_err();
        prop_assert!(
            matches!(err, ValidationError::OutOfRange { field: f, .. } if f == name),
            "unexpected error {:?}", err
        );
        prop_assert!(err.to_string().contains("(0..255)"));
    }

    /// Negative values are range errors, not type errors.
    #[test]
    fn negative_values_rejected(bad in i64::MIN..0) {
        let err = request::validate(&json!({"R": 0, "G": 0, "B": 0, "atime": bad})).unwrap_err();
        prop_assert_eq!(err.field(), Some("atime"));
        let is_out_of_range = matches!(err, ValidationError::OutOfRange { .. });
        prop_assert!(is_out_of_range);
    }

    /// Non-integral colour values are type errors.
    #[test]
    fn fractional_colour_is_type_error(x in 0.01f64..254.99) {
        prop_assume!(x.fract() != 0.0);
        let err = request::validate(&json!({"R": x, "G": 0, "B": 0})).unwrap_err();
        let is_type_error = matches!(err, ValidationError::TypeMismatch { field: "R", .. });
        prop_assert!(is_type_error);
    }

    /// Gains inside the numeric range but off the allowed steps are refused.
    #[test]
    fn off_step_gain_rejected(g in 0.5f64..512.0) {
        prop_assume!(!GAINS.contains(&g));
        let err = request::validate(&json!({"R": 0, "G": 0, "B": 0, "gain": g})).unwrap_err();
        let is_not_allowed = matches!(err, ValidationError::NotAllowed { field: "gain", .. });
        prop_assert!(is_not_allowed);
    }

    /// Arbitrary bytes never panic the parser or the validator.
    #[test]
    fn arbitrary_payloads_never_panic(raw in proptest::collection::vec(any::<u8>(), 0..256)) {
        if let Ok(value) = request::parse_payload(&raw) {
            let _ = request::validate(&value);
        }
    }
}

// ── Interval timer ────────────────────────────────────────────

proptest! {
    /// Over any monotonic tick sequence the timer fires at most once per
    /// interval, and the first check always fires.
    #[test]
    fn timer_fires_at_most_once_per_interval(
        interval in 1u32..100_000,
        steps in proptest::collection::vec(0u64..50_000, 1..64),
    ) {
        let mut timer = IntervalTimer::new(interval);
        let mut now = 0u64;
        let mut last_fire: Option<u64> = None;

        for (i, step) in steps.iter().enumerate() {
            now += step;
            let fired = timer.due(now);
            if i == 0 {
                prop_assert!(fired);
            }
            if fired {
                if let Some(prev) = last_fire {
                    prop_assert!(now - prev >= u64::from(interval));
                }
                last_fire = Some(now);
            } else {
                let prev = last_fire.unwrap();
                prop_assert!(now - prev < u64::from(interval));
            }
        }
    }
}
