//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules for the HerpTherm controller:
//! channel orchestration, fault handling, PID control, and the runtime
//! configuration surface.  All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
