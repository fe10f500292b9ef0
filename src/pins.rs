//! GPIO / peripheral pin assignments for the HerpTherm main board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Output channels
// ---------------------------------------------------------------------------

/// Triac gate for the channel-0 phase-angle dimmer (basking light /
/// deep-heat projector). Pulsed after each zero crossing.
pub const DIMMER_GATE_GPIO: i32 = 4;
/// Zero-cross detector output (H11AA1 optocoupler) — rising edge at every
/// mains half-cycle crossing. Interrupt-driven.
pub const ZERO_CROSS_GPIO: i32 = 5;

/// Solid-state relay enable pins for channels 1–3 (heat mat, ceramic
/// heater, heat cable / fogger / mister). Active HIGH.
pub const SSR_GPIOS: [i32; 3] = [6, 7, 8];

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Shared DS18B20 one-wire bus (4.7 kΩ pull-up to 3V3).
pub const ONEWIRE_GPIO: i32 = 9;

// ---------------------------------------------------------------------------
// Display / touch (SPI — driven by the UI collaborator, reserved here)
// ---------------------------------------------------------------------------

pub const DISPLAY_SPI_SCK_GPIO: i32 = 12;
pub const DISPLAY_SPI_MOSI_GPIO: i32 = 11;
pub const DISPLAY_CS_GPIO: i32 = 10;
pub const DISPLAY_DC_GPIO: i32 = 13;
pub const TOUCH_CS_GPIO: i32 = 14;

// ---------------------------------------------------------------------------
// UART debug
// ---------------------------------------------------------------------------

pub const UART_TX_GPIO: i32 = 17;
pub const UART_RX_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Mains timing
// ---------------------------------------------------------------------------

/// Mains frequency the dimmer timing is calibrated for.
pub const MAINS_FREQ_HZ: u32 = 50;
/// Half-cycle period in microseconds (50 Hz → 10 ms).
pub const HALF_CYCLE_US: u32 = 1_000_000 / (2 * MAINS_FREQ_HZ);
