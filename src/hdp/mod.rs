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

//! IEEE 11073 Health Device Profile manager core.
//!
//! Classifies agent frames, extracts measurements and answers with the
//! manager side of the association / data-report / release exchange.

mod address;
pub mod encoder;
mod frame;
pub mod measurement;
pub mod profile;
mod session;
mod writer;

pub use address::HardwareAddress;
pub use encoder::{FrameEncoder, Response};
pub use frame::{DataObject, Frame, FrameParser, InvokeId};
pub use measurement::{extract, BloodPressureReading, Measurement, MeasurementKind, NO_READING};
pub use profile::{DeviceClass, ProfileDescriptor};
pub use session::{
    DeviceSession, SessionConfig, SessionState, SessionStateMachine, Transition,
    DEFAULT_ASSOCIATION_PACING,
};
pub use writer::{spawn_writer_task, OutboundFrame, WriterHandle, DEFAULT_QUEUE_DEPTH};
