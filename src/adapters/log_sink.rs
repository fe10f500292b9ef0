//! Serial-log event sink.
//!
//! The default [`EventSink`]: renders every [`AppEvent`] to the `log`
//! facade.  MQTT / display sinks implement the same port on their side of
//! the fence; this one is always wired so the serial console tells the
//! whole story.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started => info!("controller started"),

            AppEvent::Telemetry(t) => {
                let temp = t
                    .current_temp
                    .map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"));
                info!(
                    "ch{} '{}' [{}] temp={} target={:.1} power={}% heating={} fault={} sensor={}",
                    t.channel,
                    t.name,
                    t.mode.label(),
                    temp,
                    t.target_c,
                    t.current_power,
                    t.heating,
                    t.fault.label(),
                    t.health.label(),
                );
            }

            AppEvent::FaultRaised { channel, fault } => {
                warn!("ch{channel}: fault raised — {}", fault.label());
            }

            AppEvent::FaultCleared { channel } => {
                info!("ch{channel}: fault cleared");
            }

            AppEvent::ConfigChanged { channel } => {
                info!("ch{channel}: config changed");
            }

            AppEvent::CommandRejected { channel, reason } => {
                warn!("ch{channel}: command rejected — {reason}");
            }
        }
    }
}
