//! Application core: pure domain logic, zero I/O.
//!
//! Parameter validation, experiment execution, result fan-out and the
//! broker link state machine.  All interaction with hardware and the
//! network happens through **port traits** defined in [`ports`], keeping
//! this layer fully testable without real peripherals.

pub mod dispatcher;
pub mod executor;
pub mod ports;
pub mod request;
pub mod result;
pub mod service;
pub mod topics;
