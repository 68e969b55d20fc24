//! Experiment requests and the parameter validator.
//!
//! An inbound command payload is a JSON object such as
//! `{"R": 10, "G": 20, "B": 30, "atime": 100, "astep": 999, "gain": 128}`.
//! [`validate`] turns it into an [`ExperimentRequest`] whose field types
//! already encode the hardware-safe ranges, or a [`ValidationError`]
//! naming the field, the broken constraint and the received value.
//!
//! All type checks run before any range check, so a payload with both a
//! wrongly typed and an out-of-range field reports the type problem.
//! Validation is pure: it never touches the instrument.

use core::fmt::Write;

use serde_json::{Map, Value};

use crate::error::{ValidationError, ValueText};

use super::ports::Rgb;

// ───────────────────────────────────────────────────────────────
// Sensor gain
// ───────────────────────────────────────────────────────────────

/// Spectral sensor analog gain.  The discriminant is the AGAIN register code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Gain {
    X0_5 = 0,
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    X16 = 5,
    X32 = 6,
    X64 = 7,
    #[default]
    X128 = 8,
    X256 = 9,
    X512 = 10,
}

impl Gain {
    pub const ALL: [Gain; 11] = [
        Gain::X0_5,
        Gain::X1,
        Gain::X2,
        Gain::X4,
        Gain::X8,
        Gain::X16,
        Gain::X32,
        Gain::X64,
        Gain::X128,
        Gain::X256,
        Gain::X512,
    ];

    /// Multiplier as sent by operators (0.5, 1, 2, … 512).
    pub fn multiplier(self) -> f64 {
        0.5 * f64::from(1u32 << self as u32)
    }

    /// Exact reverse of [`multiplier`](Self::multiplier).
    pub fn from_multiplier(value: f64) -> Option<Self> {
        Self::ALL.into_iter().find(|g| g.multiplier() == value)
    }

    /// Value for the AGAIN field of the CFG1 register.
    pub fn register_value(self) -> u8 {
        self as u8
    }
}

// ───────────────────────────────────────────────────────────────
// Sensor settings / request
// ───────────────────────────────────────────────────────────────

/// Integration parameters programmed into the sensor before a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSettings {
    pub atime: u8,
    pub astep: u16,
    pub gain: Gain,
}

impl SensorSettings {
    /// Integration time in microseconds: (ATIME + 1) × (ASTEP + 1) × 2.78 µs.
    pub fn integration_time_us(&self) -> u64 {
        let steps = (u64::from(self.atime) + 1) * (u64::from(self.astep) + 1);
        steps * 278 / 100
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            atime: ExperimentRequest::DEFAULT_ATIME,
            astep: ExperimentRequest::DEFAULT_ASTEP,
            gain: Gain::default(),
        }
    }
}

/// A validated experiment.  Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperimentRequest {
    colour: Rgb,
    settings: SensorSettings,
}

impl ExperimentRequest {
    pub const DEFAULT_ATIME: u8 = 100;
    pub const DEFAULT_ASTEP: u16 = 999;
    pub const DEFAULT_GAIN: Gain = Gain::X128;

    /// Request with default sensor settings.
    pub fn new(colour: Rgb) -> Self {
        Self {
            colour,
            settings: SensorSettings::default(),
        }
    }

    pub fn with_settings(colour: Rgb, settings: SensorSettings) -> Self {
        Self { colour, settings }
    }

    pub fn colour(&self) -> Rgb {
        self.colour
    }

    pub fn settings(&self) -> SensorSettings {
        self.settings
    }
}

// ───────────────────────────────────────────────────────────────
// Validator
// ───────────────────────────────────────────────────────────────

const RANGE_U8: &str = "0..255";
const RANGE_U16: &str = "0..65535";
const RANGE_GAIN: &str = "0.5..512";
const ALLOWED_GAINS: &str = "{0.5, 1, 2, 4, 8, 16, 32, 64, 128, 256, 512}";
const EXPECT_INTEGER: &str = "an integer";
const EXPECT_NUMBER: &str = "a number";

/// Decode a raw payload as JSON.  Object shape is checked by [`validate`].
pub fn parse_payload(raw: &[u8]) -> Result<Value, ValidationError> {
    serde_json::from_slice(raw).map_err(|e| {
        let mut detail = ValueText::new();
        push_truncated(&mut detail, format_args!("{e}"));
        ValidationError::Malformed(detail)
    })
}

/// Check every field and build the request.  Never touches hardware.
pub fn validate(payload: &Value) -> Result<ExperimentRequest, ValidationError> {
    let Value::Object(params) = payload else {
        let mut detail = ValueText::new();
        push_truncated(
            &mut detail,
            format_args!("expected a JSON object, got {}", kind_of(payload)),
        );
        return Err(ValidationError::Malformed(detail));
    };

    // Pass 1: presence and type.
    let r = required_integer(params, "R")?;
    let g = required_integer(params, "G")?;
    let b = required_integer(params, "B")?;
    let atime = optional_integer(params, "atime")?;
    let astep = optional_integer(params, "astep")?;
    let gain = optional_number(params, "gain")?;

    // Pass 2: ranges.
    let colour = (
        in_range::<u8>(r, "R", RANGE_U8)?,
        in_range::<u8>(g, "G", RANGE_U8)?,
        in_range::<u8>(b, "B", RANGE_U8)?,
    );
    let atime = match atime {
        Some(v) => in_range::<u8>(v, "atime", RANGE_U8)?,
        None => ExperimentRequest::DEFAULT_ATIME,
    };
    let astep = match astep {
        Some(v) => in_range::<u16>(v, "astep", RANGE_U16)?,
        None => ExperimentRequest::DEFAULT_ASTEP,
    };
    let gain = match gain {
        Some((value, raw)) => gain_in_set(value, raw)?,
        None => ExperimentRequest::DEFAULT_GAIN,
    };

    Ok(ExperimentRequest::with_settings(
        colour,
        SensorSettings { atime, astep, gain },
    ))
}

/// A typed integer together with the raw JSON it came from.
type Integer<'a> = (i128, &'a Value);

fn required_integer<'a>(
    params: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Integer<'a>, ValidationError> {
    match params.get(field) {
        Some(v) => integer(v, field),
        None => Err(ValidationError::Missing { field }),
    }
}

fn optional_integer<'a>(
    params: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Option<Integer<'a>>, ValidationError> {
    params.get(field).map(|v| integer(v, field)).transpose()
}

fn optional_number<'a>(
    params: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Option<(f64, &'a Value)>, ValidationError> {
    let Some(v) = params.get(field) else {
        return Ok(None);
    };
    match v.as_f64() {
        Some(n) => Ok(Some((n, v))),
        None => Err(type_mismatch(field, EXPECT_NUMBER, v)),
    }
}

fn integer<'a>(v: &'a Value, field: &'static str) -> Result<Integer<'a>, ValidationError> {
    let n = v
        .as_i64()
        .map(i128::from)
        .or_else(|| v.as_u64().map(i128::from));
    match n {
        Some(n) => Ok((n, v)),
        None => Err(type_mismatch(field, EXPECT_INTEGER, v)),
    }
}

fn in_range<T: TryFrom<i128>>(
    (value, raw): Integer<'_>,
    field: &'static str,
    range: &'static str,
) -> Result<T, ValidationError> {
    T::try_from(value).map_err(|_| ValidationError::OutOfRange {
        field,
        range,
        actual: value_text(raw),
    })
}

fn gain_in_set(value: f64, raw: &Value) -> Result<Gain, ValidationError> {
    if !(0.5..=512.0).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: "gain",
            range: RANGE_GAIN,
            actual: value_text(raw),
        });
    }
    Gain::from_multiplier(value).ok_or_else(|| ValidationError::NotAllowed {
        field: "gain",
        allowed: ALLOWED_GAINS,
        actual: value_text(raw),
    })
}

fn type_mismatch(field: &'static str, expected: &'static str, v: &Value) -> ValidationError {
    ValidationError::TypeMismatch {
        field,
        expected,
        found_kind: kind_of(v),
        actual: value_text(v),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Compact JSON rendering of `v`, cut to the echo capacity.
fn value_text(v: &Value) -> ValueText {
    let mut out = ValueText::new();
    push_truncated(&mut out, format_args!("{v}"));
    out
}

/// Write as much of `args` as fits; stops at the first char that doesn't.
fn push_truncated(out: &mut ValueText, args: core::fmt::Arguments<'_>) {
    struct Truncating<'a>(&'a mut ValueText);

    impl Write for Truncating<'_> {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            for c in s.chars() {
                if self.0.push(c).is_err() {
                    return Err(core::fmt::Error);
                }
            }
            Ok(())
        }
    }

    let _ = Truncating(out).write_fmt(args);
}
