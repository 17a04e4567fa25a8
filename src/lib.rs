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

//! IEEE 11073 Health Device Profile manager.
//!
//! Speaks the manager side of the association, measurement and release
//! exchange with blood-pressure monitors and pulse oximeters over an
//! already-open byte channel, and forwards what it learns as
//! [`HealthEvent`]s.

pub mod config;
pub mod error;
pub mod events;
pub mod hdp;
pub mod manager;
pub mod state;

pub use config::Config;
pub use error::{HdpError, ParseError, Result};
pub use events::{EventSink, HealthEvent, MeasurementEvent, StatusEvent, StatusKind, StatusResult};
pub use hdp::{DeviceClass, DeviceSession, HardwareAddress, Measurement, MeasurementKind, SessionConfig};
pub use manager::{AppConfigStatus, HealthManager};
pub use state::{Indicator, ReadingBoard};
