// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Status and measurement events delivered to the dispatcher.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::hdp::{DeviceClass, Measurement, MeasurementKind};

/// What a status event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// Sink application registration finished.
    Registered,
    /// Sink application unregistration finished.
    Unregistered,
    /// Channel to an agent came up (or failed to).
    ChannelOpened,
    /// Channel to an agent went away.
    ChannelClosed,
    /// A buffer was read from the channel.
    ReadTick,
    /// The read loop ended.
    ReadDone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusResult {
    Ok,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    pub device_class: DeviceClass,
    pub kind: StatusKind,
    pub result: StatusResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementEvent {
    pub device_class: DeviceClass,
    pub kind: MeasurementKind,
    pub value: i32,
}

impl From<Measurement> for MeasurementEvent {
    fn from(m: Measurement) -> Self {
        Self {
            device_class: m.device_class,
            kind: m.kind,
            value: m.value,
        }
    }
}

/// Events emitted by sessions and the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthEvent {
    Status(StatusEvent),
    Measurement(MeasurementEvent),
}

impl HealthEvent {
    pub fn device_class(&self) -> DeviceClass {
        match self {
            HealthEvent::Status(e) => e.device_class,
            HealthEvent::Measurement(e) => e.device_class,
        }
    }
}

/// Best-effort delivery endpoint for [`HealthEvent`]s.
///
/// Sending never waits on the dispatcher. Events sent while none is
/// attached, while it lags behind a full channel, or after it hung up are
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<HealthEvent>>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<HealthEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink with no dispatcher behind it.
    pub fn detached() -> Self {
        Self { tx: None }
    }

    /// Create a sink and the receiver the dispatcher reads from.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<HealthEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn is_attached(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Emit an event without waiting: a full or closed channel drops it.
    pub fn emit(&self, event: HealthEvent) {
        let Some(tx) = &self.tx else {
            debug!("No dispatcher attached, dropping {:?}", event);
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                debug!("Dispatcher lagging, dropping {:?}", event);
            }
            Err(TrySendError::Closed(event)) => {
                debug!("Dispatcher gone, dropping {:?}", event);
            }
        }
    }

    pub fn status(&self, device_class: DeviceClass, kind: StatusKind, result: StatusResult) {
        self.emit(HealthEvent::Status(StatusEvent {
            device_class,
            kind,
            result,
        }));
    }

    pub fn measurement(&self, measurement: Measurement) {
        self.emit(HealthEvent::Measurement(measurement.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let (sink, mut rx) = EventSink::channel(8);
        sink.status(DeviceClass::Oximeter, StatusKind::ChannelOpened, StatusResult::Ok);
        sink.measurement(Measurement::new(
            DeviceClass::Oximeter,
            MeasurementKind::SpO2,
            97,
        ));

        assert_eq!(
            rx.recv().await,
            Some(HealthEvent::Status(StatusEvent {
                device_class: DeviceClass::Oximeter,
                kind: StatusKind::ChannelOpened,
                result: StatusResult::Ok,
            }))
        );
        assert_eq!(
            rx.recv().await,
            Some(HealthEvent::Measurement(MeasurementEvent {
                device_class: DeviceClass::Oximeter,
                kind: MeasurementKind::SpO2,
                value: 97,
            }))
        );
    }

    #[tokio::test]
    async fn test_detached_sink_drops_events() {
        let sink = EventSink::detached();
        assert!(!sink.is_attached());
        sink.status(DeviceClass::BloodPressure, StatusKind::ReadTick, StatusResult::Ok);
    }

    #[tokio::test]
    async fn test_closed_dispatcher_drops_events() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);
        assert!(!sink.is_attached());
        sink.status(DeviceClass::BloodPressure, StatusKind::ReadDone, StatusResult::Ok);
    }

    #[tokio::test]
    async fn test_full_dispatcher_drops_events() {
        let (sink, mut rx) = EventSink::channel(1);
        sink.status(DeviceClass::Oximeter, StatusKind::ReadTick, StatusResult::Ok);
        for value in 0..10 {
            sink.measurement(Measurement::new(
                DeviceClass::Oximeter,
                MeasurementKind::HeartRate,
                value,
            ));
        }
        assert!(sink.is_attached());

        assert_eq!(
            rx.recv().await,
            Some(HealthEvent::Status(StatusEvent {
                device_class: DeviceClass::Oximeter,
                kind: StatusKind::ReadTick,
                result: StatusResult::Ok,
            }))
        );
        assert!(rx.try_recv().is_err());

        sink.status(DeviceClass::Oximeter, StatusKind::ReadDone, StatusResult::Ok);
        assert_eq!(
            rx.recv().await,
            Some(HealthEvent::Status(StatusEvent {
                device_class: DeviceClass::Oximeter,
                kind: StatusKind::ReadDone,
                result: StatusResult::Ok,
            }))
        );
    }
}
