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

//! Measurement extraction from decoded data reports.

use std::fmt;

use super::frame::{byte_at, DataObject};
use super::profile::DeviceClass;
use crate::error::ParseError;

/// Value forwarded for a kind that has no reading yet.
pub const NO_READING: i32 = -1;

/// Observation handles of the blood-pressure fixed report.
pub mod handles {
    /// Compound systolic / diastolic / mean arterial pressure.
    pub const SYS_DIA_MAP: u16 = 1;
    /// Pulse rate.
    pub const PULSE: u16 = 2;
    /// Device error code, carries no measurement.
    pub const ERROR_CODE: u16 = 3;
    /// Oximeter SpO2 numeric.
    pub const SPO2: u16 = 1;
    /// Oximeter pulse rate numeric.
    pub const HEART_RATE: u16 = 10;
}

// Offsets of the low octet of each value inside an observation payload.
const SYSTOLIC_OFFSET: usize = 5;
const DIASTOLIC_OFFSET: usize = 7;
const MEAN_ARTERIAL_OFFSET: usize = 9;
const PULSE_OFFSET: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    Systolic,
    Diastolic,
    Pulse,
    SpO2,
    HeartRate,
}

impl MeasurementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Systolic => "systolic",
            Self::Diastolic => "diastolic",
            Self::Pulse => "pulse",
            Self::SpO2 => "spo2",
            Self::HeartRate => "heart-rate",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single numeric reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub device_class: DeviceClass,
    pub kind: MeasurementKind,
    pub value: i32,
}

impl Measurement {
    pub fn new(device_class: DeviceClass, kind: MeasurementKind, value: i32) -> Self {
        Self {
            device_class,
            kind,
            value,
        }
    }

    /// Placeholder reading announced before the agent reports anything.
    pub fn no_reading(device_class: DeviceClass, kind: MeasurementKind) -> Self {
        Self::new(device_class, kind, NO_READING)
    }
}

/// Decoded SYS/DIA/MAP compound.
///
/// Mean arterial pressure is decoded but not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloodPressureReading {
    pub systolic: u8,
    pub diastolic: u8,
    pub mean_arterial: u8,
}

impl BloodPressureReading {
    fn decode(object: &DataObject<'_>) -> Result<Self, ParseError> {
        let read = |offset| {
            byte_at(object.payload, offset).map_err(|_| ParseError::ShortObject {
                handle: object.handle,
                len: object.payload.len(),
                needed: MEAN_ARTERIAL_OFFSET + 1,
            })
        };
        Ok(Self {
            systolic: read(SYSTOLIC_OFFSET)?,
            diastolic: read(DIASTOLIC_OFFSET)?,
            mean_arterial: read(MEAN_ARTERIAL_OFFSET)?,
        })
    }
}

/// Read the single low octet at `offset` of an observation payload.
fn scalar(object: &DataObject<'_>, offset: usize) -> Result<i32, ParseError> {
    byte_at(object.payload, offset)
        .map(i32::from)
        .map_err(|_| ParseError::ShortObject {
            handle: object.handle,
            len: object.payload.len(),
            needed: offset + 1,
        })
}

/// Turn the observations of one data report into measurements.
///
/// Either the whole report decodes or nothing is returned.
pub fn extract(
    device_class: DeviceClass,
    objects: &[DataObject<'_>],
) -> Result<Vec<Measurement>, ParseError> {
    let mut measurements = Vec::with_capacity(objects.len() + 1);

    for object in objects {
        match (device_class, object.handle) {
            (DeviceClass::BloodPressure, handles::SYS_DIA_MAP) => {
                let reading = BloodPressureReading::decode(object)?;
                measurements.push(Measurement::new(
                    device_class,
                    MeasurementKind::Systolic,
                    reading.systolic.into(),
                ));
                measurements.push(Measurement::new(
                    device_class,
                    MeasurementKind::Diastolic,
                    reading.diastolic.into(),
                ));
            }
            (DeviceClass::BloodPressure, handles::PULSE) => {
                measurements.push(Measurement::new(
                    device_class,
                    MeasurementKind::Pulse,
                    scalar(object, PULSE_OFFSET)?,
                ));
            }
            (DeviceClass::BloodPressure, handles::ERROR_CODE) => {}
            (DeviceClass::Oximeter, handles::SPO2) => {
                measurements.push(Measurement::new(
                    device_class,
                    MeasurementKind::SpO2,
                    scalar(object, 0)?,
                ));
            }
            (DeviceClass::Oximeter, handles::HEART_RATE) => {
                measurements.push(Measurement::new(
                    device_class,
                    MeasurementKind::HeartRate,
                    scalar(object, 0)?,
                ));
            }
            _ => {}
        }
    }

    Ok(measurements)
}
