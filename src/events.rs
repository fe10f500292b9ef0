//! Timer-driven event system.
//!
//! Events are produced by:
//! - esp_timer callbacks (control tick, sensor sample tick, telemetry)
//! - Software (explicit saves, shutdown paths)
//!
//! Events are consumed by the main control loop, one at a time, in FIFO
//! order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Timer ISR   │────▶│              │     │              │
//! │ Software    │────▶│  Event Queue │────▶│  Main Loop   │
//! │             │     │  (lock-free) │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use core::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Maximum number of pending events.
/// Power of 2 for efficient ring buffer modulo.
const EVENT_QUEUE_CAP: usize = 32;

/// System event types, ordered by rough priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    // ── Control ───────────────────────────────────────────
    /// Control loop tick (10 Hz).
    ControlTick = 0,
    /// One-wire sampling timer fired (0.5 Hz).
    SensorSampleTick = 1,

    // ── Communication ─────────────────────────────────────
    /// Telemetry report timer fired.
    TelemetryTick = 10,

    // ── Housekeeping ──────────────────────────────────────
    /// Watchdog heartbeat.
    WatchdogTick = 20,
}

// ── Lock-free SPSC ring buffer ────────────────────────────────
//
// Timer callbacks write (produce), main loop reads (consume).
// Atomic head/tail indices; the buffer itself is a static of atomics so
// no `static mut` access is needed from ISR context.

static EVENT_HEAD: AtomicUsize = AtomicUsize::new(0);
static EVENT_TAIL: AtomicUsize = AtomicUsize::new(0);
#[allow(clippy::declare_interior_mutable_const)]
const ZERO: AtomicU8 = AtomicU8::new(0);
static EVENT_BUFFER: [AtomicU8; EVENT_QUEUE_CAP] = [ZERO; EVENT_QUEUE_CAP];

/// Push an event into the queue.
/// Safe to call from timer-callback context (lock-free).
/// Returns `false` if the queue is full (event dropped).
pub fn push_event(event: Event) -> bool {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Acquire);
    let next_head = (head + 1) % EVENT_QUEUE_CAP;

    if next_head == tail {
        return false; // Queue full — drop event.
    }

    EVENT_BUFFER[head].store(event as u8, Ordering::Relaxed);
    EVENT_HEAD.store(next_head, Ordering::Release);
    true
}

/// Pop the next event from the queue.
/// Called from the main loop (single consumer).
/// Returns `None` if the queue is empty.
pub fn pop_event() -> Option<Event> {
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    let head = EVENT_HEAD.load(Ordering::Acquire);

    if tail == head {
        return None; // Empty.
    }

    let raw = EVENT_BUFFER[tail].load(Ordering::Relaxed);
    EVENT_TAIL.store((tail + 1) % EVENT_QUEUE_CAP, Ordering::Release);

    event_from_u8(raw)
}

/// Drain all pending events into a callback, in FIFO order.
pub fn drain_events(mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event() {
        handler(event);
    }
}

/// Number of pending events.
pub fn queue_len() -> usize {
    let head = EVENT_HEAD.load(Ordering::Relaxed);
    let tail = EVENT_TAIL.load(Ordering::Relaxed);
    (head + EVENT_QUEUE_CAP - tail) % EVENT_QUEUE_CAP
}

// ── Internal ──────────────────────────────────────────────────

fn event_from_u8(raw: u8) -> Option<Event> {
    match raw {
        0 => Some(Event::ControlTick),
        1 => Some(Event::SensorSampleTick),
        10 => Some(Event::TelemetryTick),
        20 => Some(Event::WatchdogTick),
        _ => None,
    }
}
