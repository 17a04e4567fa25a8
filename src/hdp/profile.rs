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

//! Static per-device-class protocol tables.
//!
//! Every structural offset the parser touches lives here, grouped per
//! [`DeviceClass`] in an immutable [`ProfileDescriptor`].

use std::fmt;

use super::measurement::MeasurementKind;

/// APDU marker bytes (first octet of every frame).
pub mod markers {
    /// Association request (AARQ), agent to manager.
    pub const ASSOCIATION_REQUEST: u8 = 0xE2;
    /// Association response (AARE), manager to agent.
    pub const ASSOCIATION_RESPONSE: u8 = 0xE3;
    /// Association release request (RLRQ), agent to manager.
    pub const RELEASE_REQUEST: u8 = 0xE4;
    /// Association release response (RLRE), manager to agent.
    pub const RELEASE_RESPONSE: u8 = 0xE5;
    /// Presentation APDU carrying data (PRST).
    pub const DATA: u8 = 0xE7;
}

/// Offset of the two invoke-id bytes inside a data APDU.
pub const INVOKE_ID_OFFSET: usize = 6;

/// Event type tag of an IEEE 11073-10407 fixed scan report (MDC_NOTI_SCAN_REPORT_FIXED).
pub const FIXED_REPORT_TAG: [u8; 2] = [0x0D, 0x1D];

/// Bluetooth HDP data type of a blood-pressure monitor.
pub const DATA_TYPE_BLOOD_PRESSURE: u16 = 0x1007;

/// Bluetooth HDP data type of a pulse oximeter.
pub const DATA_TYPE_OXIMETER: u16 = 0x1004;

/// Class of medical sensor agent a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    BloodPressure,
    Oximeter,
}

impl DeviceClass {
    /// Both supported classes.
    pub const ALL: [DeviceClass; 2] = [DeviceClass::BloodPressure, DeviceClass::Oximeter];

    /// Protocol tables for this class.
    pub fn profile(self) -> &'static ProfileDescriptor {
        match self {
            DeviceClass::BloodPressure => &BLOOD_PRESSURE,
            DeviceClass::Oximeter => &OXIMETER,
        }
    }

    /// Bluetooth HDP data type registered for this class.
    pub fn data_type(self) -> u16 {
        self.profile().data_type
    }

    /// Map an HDP data type back to a class.
    pub fn from_data_type(data_type: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.data_type() == data_type)
    }

    /// Measurement kinds an agent of this class reports.
    pub fn measurement_kinds(self) -> &'static [MeasurementKind] {
        self.profile().measurement_kinds
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::BloodPressure => "blood-pressure",
            DeviceClass::Oximeter => "oximeter",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a `0xE7` frame is told apart from an administrative response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportCheck {
    /// The event type at `offset` must equal `tag`.
    FixedReportTag { offset: usize, tag: [u8; 2] },
    /// The length octet at `offset` selects the frame shape: `administrative`
    /// marks a non-measurement response, `observation` a frame carrying
    /// numerics at fixed offsets.
    LengthSubtype {
        offset: usize,
        administrative: u8,
        observation: u8,
    },
}

/// Layout of a scan report carrying a generic observation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectListLayout {
    /// Offset of the u16 event-info length.
    pub report_length_offset: usize,
    /// Offset of the u16 observation count.
    pub object_count_offset: usize,
    /// Offset of the first observation (its u16 handle).
    pub first_object_offset: usize,
    /// Bytes preceding each observation's payload: handle (2) and length (2).
    pub object_header_len: usize,
}

impl ObjectListLayout {
    /// First byte covered by the event-info length.
    pub fn report_body_offset(&self) -> usize {
        self.report_length_offset + 2
    }
}

/// Layout of a frame whose numerics sit at fixed offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedObservationLayout {
    pub spo2_handle: u16,
    pub spo2_offset: usize,
    pub heart_rate_handle: u16,
    pub heart_rate_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLayout {
    ObjectList(ObjectListLayout),
    FixedObservations(FixedObservationLayout),
}

/// Source of the 8-byte system identity in the association response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemIdentity {
    /// Fixed synthetic identity accepted by the agent.
    Placeholder([u8; 8]),
    /// Local adapter address expanded into EUI-64 form.
    LocalAddress,
}

/// Immutable protocol description of one device class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileDescriptor {
    pub class: DeviceClass,
    pub data_type: u16,
    /// Size of the buffer handed to each channel read.
    pub buffer_capacity: usize,
    pub association_request: u8,
    pub data_report: u8,
    pub release_request: u8,
    pub report_check: ReportCheck,
    pub report_layout: ReportLayout,
    pub identity: SystemIdentity,
    /// Filler invoke-id placed in the MDS attribute request.
    pub get_mds_invoke_id: [u8; 2],
    pub measurement_kinds: &'static [MeasurementKind],
}

/// IEEE 11073-10407 blood-pressure monitor.
pub static BLOOD_PRESSURE: ProfileDescriptor = ProfileDescriptor {
    class: DeviceClass::BloodPressure,
    data_type: DATA_TYPE_BLOOD_PRESSURE,
    buffer_capacity: 300,
    association_request: markers::ASSOCIATION_REQUEST,
    data_report: markers::DATA,
    release_request: markers::RELEASE_REQUEST,
    report_check: ReportCheck::FixedReportTag {
        offset: 18,
        tag: FIXED_REPORT_TAG,
    },
    report_layout: ReportLayout::ObjectList(ObjectListLayout {
        report_length_offset: 20,
        object_count_offset: 26,
        first_object_offset: 30,
        object_header_len: 4,
    }),
    identity: SystemIdentity::Placeholder([0x3C, 0x5A, 0x37, 0xFF, 0xFE, 0x95, 0xEE, 0xE3]),
    get_mds_invoke_id: [0x00, 0x24],
    measurement_kinds: &[
        MeasurementKind::Systolic,
        MeasurementKind::Diastolic,
        MeasurementKind::Pulse,
    ],
};

/// IEEE 11073-10404 pulse oximeter.
pub static OXIMETER: ProfileDescriptor = ProfileDescriptor {
    class: DeviceClass::Oximeter,
    data_type: DATA_TYPE_OXIMETER,
    buffer_capacity: 116,
    association_request: markers::ASSOCIATION_REQUEST,
    data_report: markers::DATA,
    release_request: markers::RELEASE_REQUEST,
    report_check: ReportCheck::LengthSubtype {
        offset: 3,
        administrative: 0xDA,
        observation: 0x36,
    },
    report_layout: ReportLayout::FixedObservations(FixedObservationLayout {
        spo2_handle: 1,
        spo2_offset: 35,
        heart_rate_handle: 10,
        heart_rate_offset: 49,
    }),
    identity: SystemIdentity::LocalAddress,
    get_mds_invoke_id: [0x12, 0x34],
    measurement_kinds: &[MeasurementKind::SpO2, MeasurementKind::HeartRate],
};
