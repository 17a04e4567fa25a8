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

//! Reading board: latest status and values per device class.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::events::{HealthEvent, StatusKind, StatusResult};
use crate::hdp::{DeviceClass, MeasurementKind, NO_READING};

/// Per-class data indicator level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indicator {
    /// No sink application registered.
    #[default]
    Grey,
    /// Registered, no channel.
    Red,
    /// Channel open, waiting for data.
    Orange,
    /// Data flowing.
    LightGreen,
    /// Read loop finished.
    DarkGreen,
}

impl Indicator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Indicator::Grey => "grey",
            Indicator::Red => "red",
            Indicator::Orange => "orange",
            Indicator::LightGreen => "light-green",
            Indicator::DarkGreen => "dark-green",
        }
    }

    fn after(self, kind: StatusKind, result: StatusResult) -> Self {
        match (kind, result) {
            (StatusKind::Registered, StatusResult::Ok) => Indicator::Red,
            (StatusKind::Registered, StatusResult::Fail) => Indicator::Grey,
            (StatusKind::Unregistered, _) => Indicator::Grey,
            (StatusKind::ChannelOpened, StatusResult::Ok) => Indicator::Orange,
            (StatusKind::ChannelOpened, StatusResult::Fail) => Indicator::Red,
            (StatusKind::ChannelClosed, _) => Indicator::Red,
            (StatusKind::ReadTick, _) => Indicator::LightGreen,
            (StatusKind::ReadDone, StatusResult::Ok) => Indicator::DarkGreen,
            (StatusKind::ReadDone, StatusResult::Fail) => Indicator::Red,
        }
    }
}

/// Shared view of everything the dispatcher has seen.
#[derive(Debug, Default)]
pub struct ReadingBoard {
    indicators: RwLock<HashMap<DeviceClass, Indicator>>,
    values: RwLock<HashMap<MeasurementKind, i32>>,
}

impl ReadingBoard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn apply(&self, event: &HealthEvent) {
        match event {
            HealthEvent::Status(status) => {
                let mut indicators = self.indicators.write();
                let current = indicators.entry(status.device_class).or_default();
                *current = current.after(status.kind, status.result);
            }
            HealthEvent::Measurement(m) => {
                self.values.write().insert(m.kind, m.value);
            }
        }
    }

    pub fn indicator(&self, class: DeviceClass) -> Indicator {
        self.indicators
            .read()
            .get(&class)
            .copied()
            .unwrap_or_default()
    }

    /// Latest value, `None` until something arrives.
    pub fn value(&self, kind: MeasurementKind) -> Option<i32> {
        self.values.read().get(&kind).copied()
    }

    /// Display text: the number, or `--` when there is no reading.
    pub fn display(&self, kind: MeasurementKind) -> String {
        match self.value(kind) {
            Some(value) if value != NO_READING => value.to_string(),
            _ => "--".to_string(),
        }
    }
}
