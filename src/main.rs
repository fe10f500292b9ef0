//! HerpTherm Firmware — Main Entry Point
//!
//! Hexagonal architecture with timer-driven execution.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter      LogEventSink     NvsAdapter              │
//! │  (Sensors+Outputs)    (EventSink)      (ConfigStore+Storage)   │
//! │  Esp32TimeAdapter                                              │
//! │  (Clock)                                                       │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Channel Engine · Fault FSM · PID · Schedules          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Command queue (UI / MQTT / HTTP → control loop)               │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Module declarations ───────────────────────────────────────
pub mod config;
pub mod error;
pub mod events;
pub mod pins;

pub mod adapters;
pub mod app;
pub mod channel;
pub mod control;
pub mod drivers;
pub mod engine;
pub mod fault;
pub mod schedule;
pub mod sensors;

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{info, warn};

use adapters::hardware::HardwareAdapter;
use adapters::log_sink::LogEventSink;
use adapters::nvs::NvsAdapter;
use adapters::time::Esp32TimeAdapter;
use app::ports::{Clock, ConfigStore};
use app::service::AppService;
use channel::CHANNEL_COUNT;
use config::{ChannelConfig, SystemConfig};
use engine::ChannelEngine;
use events::Event;
use sensors::ds18b20::Ds18b20Bus;
use sensors::SensorHub;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init()?;
    }

    info!("╔══════════════════════════════════════╗");
    info!("║  HerpTherm v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1b. Initialise hardware peripherals ───────────────────
    // Peripheral init failure is critical: the boot-safety rule is that
    // the control engine does not start against unconfigured outputs.
    // The watchdog reset gives flaky hardware another chance.
    if let Err(e) = drivers::hw_init::init_peripherals() {
        log::error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }
    if let Err(e) = drivers::hw_init::init_isr_service() {
        log::error!("ISR service init failed: {} — dimmer channel will stay dark", e);
    }
    let watchdog = drivers::watchdog::Watchdog::new();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let system = match nvs.load_system() {
        Ok(cfg) => {
            info!("System config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("System config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    let channel_configs: [ChannelConfig; CHANNEL_COUNT] = core::array::from_fn(|i| {
        nvs.load_channel(i).unwrap_or_else(|e| {
            warn!("channel {i} config load failed ({e}), using defaults");
            ChannelConfig::default_for_slot(i)
        })
    });

    // ── 3. Construct adapters ─────────────────────────────────
    let clock = Esp32TimeAdapter::new();

    let bus = match Ds18b20Bus::new() {
        Ok(b) => b,
        Err(e) => {
            log::error!("one-wire init failed: {} — halting", e);
            #[allow(clippy::empty_loop)]
            loop {}
        }
    };
    let mut hw = HardwareAdapter::new(SensorHub::new(bus));
    let mut log_sink = LogEventSink::new();

    // ── 4. Tick timers ────────────────────────────────────────
    drivers::hw_timer::start_timers(&system);

    // ── 5. Construct app service ──────────────────────────────
    let mut app = AppService::new(system.clone(), ChannelEngine::new(channel_configs));
    app.start(&mut log_sink);

    // Prime the sensor cache before the first control tick so channels
    // don't open a spurious invalid-sensor fault at boot.
    hw.sample_sensors(clock.now_us());

    info!("System ready. Entering event loop.");

    // ── 6. Event loop ─────────────────────────────────────────
    #[cfg(not(target_os = "espidf"))]
    let mut sim_tick: u64 = 0;

    loop {
        // Simulate timer interrupts via sleep on non-espidf targets.
        // On real hardware, esp_timer callbacks push the events and the
        // loop yields to FreeRTOS between drains.
        #[cfg(not(target_os = "espidf"))]
        {
            std::thread::sleep(std::time::Duration::from_millis(u64::from(
                system.control_tick_ms,
            )));
            events::push_event(Event::ControlTick);
            sim_tick += 1;
            let ticks_per_sample =
                u64::from((system.sensor_sample_ms / system.control_tick_ms.max(1)).max(1));
            if sim_tick % ticks_per_sample == 0 {
                events::push_event(Event::SensorSampleTick);
            }
        }

        #[cfg(target_os = "espidf")]
        esp_idf_hal::delay::FreeRtos::delay_ms(10);

        // Process all pending events.
        events::drain_events(|event| match event {
            Event::ControlTick => {
                watchdog.feed();
                app.tick(&mut hw, &clock, &mut log_sink);
                let _ = app.auto_save_if_needed(&nvs);
            }

            Event::SensorSampleTick => {
                hw.sample_sensors(clock.now_us());
            }

            Event::TelemetryTick => {
                app.emit_telemetry(&mut log_sink);
            }

            Event::WatchdogTick => {
                watchdog.feed();
            }
        });
    }
}
