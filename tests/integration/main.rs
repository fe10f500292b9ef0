//! Host-side integration test harness.
//!
//! These run on x86_64 and drive the full AppService → engine → output
//! chain against mock adapters, with no real hardware.

// Links the std critical-section implementation the embassy-sync command
// queue needs on the host.
use critical_section as _;

mod mock_hw;

mod engine_tests;
mod service_tests;
