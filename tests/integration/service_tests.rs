//! Integration tests for the AppService command path and config
//! persistence lifecycle.

use crate::mock_hw::{MockClock, MockHardware, MockNvs, RecordingSink};

use herptherm::app::commands::{self, ChannelCommand};
use herptherm::app::events::AppEvent;
use herptherm::app::ports::ConfigStore;
use herptherm::channel::{ControlMode, DeviceKind};
use herptherm::config::SystemConfig;
use herptherm::engine::ChannelEngine;
use herptherm::app::service::AppService;
use herptherm::sensors::SensorId;

const SENSOR: SensorId = SensorId(0x28_0011_2233);

/// Tests that call `AppService::tick` drain the process-wide command
/// queue; hold this lock so parallel tests don't steal each other's
/// submissions.
static QUEUE_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

fn lock_queue() -> std::sync::MutexGuard<'static, ()> {
    QUEUE_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn make_app() -> (AppService, MockHardware, MockClock, RecordingSink) {
    let mut app = AppService::new(SystemConfig::default(), ChannelEngine::with_defaults());
    let hw = MockHardware::new();
    let clock = MockClock::new();
    let mut sink = RecordingSink::new();
    app.start(&mut sink);
    (app, hw, clock, sink)
}

// ── Queued commands are applied before the control sequence ───
//
// Single test for everything that touches the process-wide command
// queue: parallel test threads would interleave submissions otherwise.

#[test]
fn queued_commands_drain_in_order_on_the_next_tick() {
    let _guard = lock_queue();
    let (mut app, mut hw, clock, mut sink) = make_app();
    while commands::try_next().is_some() {}

    assert!(commands::submit(ChannelCommand::SetEnabled {
        channel: 1,
        enabled: true
    }));
    assert!(commands::submit(ChannelCommand::SetMode {
        channel: 1,
        mode: ControlMode::Manual
    }));
    assert!(commands::submit(ChannelCommand::SetManualPower {
        channel: 1,
        power: 55
    }));
    // And one invalid mutation: heat mat on the dimmer slot.
    assert!(commands::submit(ChannelCommand::SetDeviceKind {
        channel: 0,
        device: DeviceKind::HeatMat
    }));

    clock.advance_secs(1.0);
    app.tick(&mut hw, &clock, &mut sink);

    // The three valid mutations landed before the engine ran.
    assert_eq!(hw.last_power(1), Some(55));
    assert!(app.is_config_dirty());

    // The invalid one was rejected without mutating channel 0.
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::CommandRejected { channel: 0, .. })));
    assert_eq!(
        app.engine().channel(0).unwrap().config().device,
        DeviceKind::Light
    );
}

#[test]
fn clear_fault_command_is_refused_while_condition_persists() {
    let _guard = lock_queue();
    let (mut app, mut hw, clock, mut sink) = make_app();

    // Enable a PID channel and over-heat it.
    app.handle_command(
        ChannelCommand::SetEnabled {
            channel: 1,
            enabled: true,
        },
        &mut sink,
    );
    app.handle_command(
        ChannelCommand::SetMode {
            channel: 1,
            mode: ControlMode::Pid,
        },
        &mut sink,
    );
    app.handle_command(
        ChannelCommand::AssignSensor {
            channel: 1,
            sensor: Some(SENSOR),
        },
        &mut sink,
    );

    hw.set_reading(SENSOR, 45.0, true, 0);
    clock.advance_secs(1.0);
    app.tick(&mut hw, &clock, &mut sink);
    assert!(sink.fault_raised_on(1));

    sink.events.clear();
    app.handle_command(ChannelCommand::ClearFault { channel: 1 }, &mut sink);
    assert!(
        !sink.fault_cleared_on(1),
        "clear must be refused while still over temperature"
    );
}

// ── Config persistence lifecycle ──────────────────────────────

#[test]
fn auto_save_fires_after_debounce_window() {
    let _guard = lock_queue();
    let (mut app, mut hw, clock, mut sink) = make_app();
    let nvs = MockNvs::new();

    app.handle_command(
        ChannelCommand::SetTargetTemp {
            channel: 2,
            target_c: 31.0,
        },
        &mut sink,
    );
    assert!(app.is_config_dirty());

    // Inside the 5 s debounce window: no save yet.
    for _ in 0..10 {
        clock.advance_secs(0.1);
        app.tick(&mut hw, &clock, &mut sink);
        assert!(!app.auto_save_if_needed(&nvs));
    }

    // Past the window: the save fires and clears the dirty flag.
    for _ in 0..60 {
        clock.advance_secs(0.1);
        app.tick(&mut hw, &clock, &mut sink);
        if app.auto_save_if_needed(&nvs) {
            break;
        }
    }
    assert!(!app.is_config_dirty());
    assert_eq!(nvs.load_channel(2).unwrap().target_c, 31.0);
}

#[test]
fn force_save_flushes_dirty_config() {
    let (mut app, _hw, _clock, mut sink) = make_app();
    let nvs = MockNvs::new();

    app.handle_command(
        ChannelCommand::SetManualPower {
            channel: 3,
            power: 42,
        },
        &mut sink,
    );
    assert!(app.is_config_dirty());

    app.force_save_if_dirty(&nvs);
    assert!(!app.is_config_dirty());
    assert_eq!(nvs.load_channel(3).unwrap().manual_power, 42);
}

#[test]
fn telemetry_covers_every_channel() {
    let (app, _hw, _clock, mut sink) = make_app();
    sink.events.clear();
    app.emit_telemetry(&mut sink);

    let channels: Vec<usize> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::Telemetry(t) => Some(t.channel),
            _ => None,
        })
        .collect();
    assert_eq!(channels, vec![0, 1, 2, 3]);
}
