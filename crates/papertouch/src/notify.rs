//! Control event sink.
//!
//! The pipeline reports control counts and value changes synchronously
//! through [`Notifier`]. Transport (OSC, MIDI, sockets) lives outside this
//! crate; [`EventLog`] and [`TracingNotifier`] cover testing and headless
//! runs.

use serde::{Deserialize, Serialize};

/// Value channel a control type reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlChannel {
    /// Slider position in [0, 1].
    Continuous,
    /// Switch on/off state.
    Toggle,
    /// Button press/release.
    Momentary,
}

impl ControlChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Toggle => "toggle",
            Self::Momentary => "momentary",
        }
    }
}

impl std::fmt::Display for ControlChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of control events.
pub trait Notifier {
    /// Number of controls available on `channel` after a classification pass.
    fn on_control_count(&mut self, channel: ControlChannel, count: usize);
    /// Slider `id` moved to `value` in [0, 1].
    fn on_continuous_value(&mut self, id: usize, value: f64);
    /// Switch `id` flipped.
    fn on_toggle_value(&mut self, id: usize, on: bool);
    /// Button `id` pressed (`true`) or released (`false`).
    fn on_momentary_value(&mut self, id: usize, on: bool);
    /// Playback of all channels should start.
    fn on_start_all(&mut self) {}
    /// Playback of all channels should stop.
    fn on_stop_all(&mut self) {}
}

impl<N: Notifier + ?Sized> Notifier for &mut N {
    fn on_control_count(&mut self, channel: ControlChannel, count: usize) {
        (**self).on_control_count(channel, count)
    }
    fn on_continuous_value(&mut self, id: usize, value: f64) {
        (**self).on_continuous_value(id, value)
    }
    fn on_toggle_value(&mut self, id: usize, on: bool) {
        (**self).on_toggle_value(id, on)
    }
    fn on_momentary_value(&mut self, id: usize, on: bool) {
        (**self).on_momentary_value(id, on)
    }
    fn on_start_all(&mut self) {
        (**self).on_start_all()
    }
    fn on_stop_all(&mut self) {
        (**self).on_stop_all()
    }
}

/// One sink call, in serializable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControlEvent {
    ControlCount { channel: ControlChannel, count: usize },
    Continuous { id: usize, value: f64 },
    Toggle { id: usize, on: bool },
    Momentary { id: usize, on: bool },
    StartAll,
    StopAll,
}

/// Records every event in arrival order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<ControlEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[ControlEvent] {
        &self.events
    }

    /// Take all recorded events, leaving the log empty.
    pub fn drain(&mut self) -> Vec<ControlEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Notifier for EventLog {
    fn on_control_count(&mut self, channel: ControlChannel, count: usize) {
        self.events.push(ControlEvent::ControlCount { channel, count });
    }
    fn on_continuous_value(&mut self, id: usize, value: f64) {
        self.events.push(ControlEvent::Continuous { id, value });
    }
    fn on_toggle_value(&mut self, id: usize, on: bool) {
        self.events.push(ControlEvent::Toggle { id, on });
    }
    fn on_momentary_value(&mut self, id: usize, on: bool) {
        self.events.push(ControlEvent::Momentary { id, on });
    }
    fn on_start_all(&mut self) {
        self.events.push(ControlEvent::StartAll);
    }
    fn on_stop_all(&mut self) {
        self.events.push(ControlEvent::StopAll);
    }
}

/// Logs every event through `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn on_control_count(&mut self, channel: ControlChannel, count: usize) {
        tracing::info!(%channel, count, "control count");
    }
    fn on_continuous_value(&mut self, id: usize, value: f64) {
        tracing::info!(id, value, "continuous");
    }
    fn on_toggle_value(&mut self, id: usize, on: bool) {
        tracing::info!(id, on, "toggle");
    }
    fn on_momentary_value(&mut self, id: usize, on: bool) {
        tracing::info!(id, on, "momentary");
    }
    fn on_start_all(&mut self) {
        tracing::info!("start all");
    }
    fn on_stop_all(&mut self) {
        tracing::info!("stop all");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(n: &mut dyn Notifier) {
        n.on_control_count(ControlChannel::Toggle, 2);
        n.on_toggle_value(1, true);
        n.on_stop_all();
    }

    #[test]
    fn event_log_records_in_order_and_drains() {
        let mut log = EventLog::new();
        emit(&mut log);
        assert_eq!(
            log.events(),
            &[
                ControlEvent::ControlCount {
                    channel: ControlChannel::Toggle,
                    count: 2
                },
                ControlEvent::Toggle { id: 1, on: true },
                ControlEvent::StopAll,
            ]
        );
        assert_eq!(log.drain().len(), 3);
        assert!(log.is_empty());
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_string(&ControlEvent::Momentary { id: 3, on: false })
            .expect("serialize");
        assert_eq!(json, r#"{"event":"momentary","id":3,"on":false}"#);
        let json = serde_json::to_string(&ControlEvent::ControlCount {
            channel: ControlChannel::Continuous,
            count: 4,
        })
        .expect("serialize");
        assert_eq!(json, r#"{"event":"control_count","channel":"continuous","count":4}"#);
    }

    #[test]
    fn mutable_reference_forwards() {
        fn forward<N: Notifier>(mut sink: N) {
            sink.on_continuous_value(0, 0.5);
        }
        let mut log = EventLog::new();
        forward(&mut log);
        assert_eq!(log.events(), &[ControlEvent::Continuous { id: 0, value: 0.5 }]);
    }
}
