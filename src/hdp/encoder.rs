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

//! Outbound response frames.
//!
//! The manager only ever sends four frame shapes. Each is a fixed template
//! with at most one substituted field: the system identity of the
//! association response, the filler invoke-id of the MDS request or the
//! echoed invoke-id of the data-received response.

use super::address::HardwareAddress;
use super::frame::InvokeId;
use super::profile::{ProfileDescriptor, SystemIdentity, FIXED_REPORT_TAG};

/// Offset of the 8-byte system identity in the association response.
pub const SYSTEM_ID_OFFSET: usize = 30;

/// Offset of the invoke-id in the MDS request and data-received response.
pub const RESPONSE_INVOKE_ID_OFFSET: usize = 6;

/// Offset of the fixed-report tag echoed in the data-received response.
pub const RESPONSE_TAG_OFFSET: usize = 18;

/// Association response (AARE): accepted, known extended configuration.
pub const ASSOCIATION_RESPONSE_TEMPLATE: [u8; 48] = [
    0xE3, 0x00, // APDU choice
    0x00, 0x2C, // length
    0x00, 0x00, // accepted
    0x50, 0x79, // data protocol 20601
    0x00, 0x26, // data-proto-info length
    0x80, 0x00, 0x00, 0x00, // protocol version
    0x80, 0x00, // MDER encoding
    0x80, 0x00, 0x00, 0x00, // nomenclature version
    0x00, 0x00, 0x00, 0x00, // functional units
    0x80, 0x00, 0x00, 0x00, // system type: manager
    0x00, 0x08, // system-id length
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // system-id
    0x00, 0x00, // dev-config-id
    0x00, 0x00, 0x00, 0x00, // data-req-mode-capab
    0x00, 0x00, 0x00, 0x00, // option list
];

/// Get all MDS attributes request (roiv-cmip-get on handle 0).
pub const GET_MDS_ATTRIBUTES_TEMPLATE: [u8; 18] = [
    0xE7, 0x00, // APDU choice
    0x00, 0x0E, // length
    0x00, 0x0C, // octet string length
    0x00, 0x00, // invoke-id
    0x01, 0x03, // roiv-cmip-get
    0x00, 0x06, // length
    0x00, 0x00, // MDS handle
    0x00, 0x00, // attribute id list count
    0x00, 0x00, // attribute id list length
];

/// Confirmed event report response (rors-cmip-confirmed-event-report).
pub const DATA_RECEIVED_RESPONSE_TEMPLATE: [u8; 22] = [
    0xE7, 0x00, // APDU choice
    0x00, 0x12, // length
    0x00, 0x10, // octet string length
    0x00, 0x00, // invoke-id
    0x02, 0x01, // rors-cmip-confirmed-event-report
    0x00, 0x0A, // length
    0x00, 0x00, // MDS handle
    0x00, 0x00, 0x00, 0x00, // current time
    0x00, 0x00, // event type
    0x00, 0x00, // reply info length
];

/// Association release response (RLRE), normal.
pub const ASSOCIATION_RELEASE_RESPONSE: [u8; 6] = [0xE5, 0x00, 0x00, 0x02, 0x00, 0x00];

/// A response the state machine asks to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    AssociationResponse,
    GetMdsAttributes,
    DataReceived(InvokeId),
    AssociationReleaseResponse,
}

impl Response {
    pub fn name(&self) -> &'static str {
        match self {
            Response::AssociationResponse => "association response",
            Response::GetMdsAttributes => "get MDS attributes",
            Response::DataReceived(_) => "data received response",
            Response::AssociationReleaseResponse => "association release response",
        }
    }
}

/// Renders responses for one device class.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    profile: &'static ProfileDescriptor,
    local_address: HardwareAddress,
}

impl FrameEncoder {
    pub fn new(profile: &'static ProfileDescriptor, local_address: HardwareAddress) -> Self {
        Self {
            profile,
            local_address,
        }
    }

    /// System identity announced in the association response.
    pub fn system_identity(&self) -> [u8; 8] {
        match self.profile.identity {
            SystemIdentity::Placeholder(id) => id,
            SystemIdentity::LocalAddress => self.local_address.to_eui64(),
        }
    }

    pub fn encode(&self, response: Response) -> Vec<u8> {
        match response {
            Response::AssociationResponse => self.association_response(),
            Response::GetMdsAttributes => self.get_mds_attributes(),
            Response::DataReceived(invoke_id) => self.data_received(invoke_id),
            Response::AssociationReleaseResponse => ASSOCIATION_RELEASE_RESPONSE.to_vec(),
        }
    }

    pub fn association_response(&self) -> Vec<u8> {
        let mut frame = ASSOCIATION_RESPONSE_TEMPLATE;
        frame[SYSTEM_ID_OFFSET..SYSTEM_ID_OFFSET + 8].copy_from_slice(&self.system_identity());
        frame.to_vec()
    }

    pub fn get_mds_attributes(&self) -> Vec<u8> {
        let mut frame = GET_MDS_ATTRIBUTES_TEMPLATE;
        frame[RESPONSE_INVOKE_ID_OFFSET..RESPONSE_INVOKE_ID_OFFSET + 2]
            .copy_from_slice(&self.profile.get_mds_invoke_id);
        frame.to_vec()
    }

    pub fn data_received(&self, invoke_id: InvokeId) -> Vec<u8> {
        let mut frame = DATA_RECEIVED_RESPONSE_TEMPLATE;
        frame[RESPONSE_INVOKE_ID_OFFSET..RESPONSE_INVOKE_ID_OFFSET + 2]
            .copy_from_slice(&invoke_id.bytes());
        frame[RESPONSE_TAG_OFFSET..RESPONSE_TAG_OFFSET + 2].copy_from_slice(&FIXED_REPORT_TAG);
        frame.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdp::profile::{BLOOD_PRESSURE, OXIMETER};

    const ADDRESS: HardwareAddress = HardwareAddress::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

    #[test]
    fn test_template_lengths_match_headers() {
        for frame in [
            &ASSOCIATION_RESPONSE_TEMPLATE[..],
            &GET_MDS_ATTRIBUTES_TEMPLATE[..],
            &DATA_RECEIVED_RESPONSE_TEMPLATE[..],
            &ASSOCIATION_RELEASE_RESPONSE[..],
        ] {
            let declared = u16::from_be_bytes([frame[2], frame[3]]) as usize;
            assert_eq!(declared + 4, frame.len());
        }
    }

    #[test]
    fn test_blood_pressure_association_response() {
        let encoder = FrameEncoder::new(&BLOOD_PRESSURE, ADDRESS);
        let frame = encoder.association_response();

        assert_eq!(frame.len(), 48);
        assert_eq!(&frame[..30], &ASSOCIATION_RESPONSE_TEMPLATE[..30]);
        assert_eq!(
            &frame[30..38],
            &[0x3C, 0x5A, 0x37, 0xFF, 0xFE, 0x95, 0xEE, 0xE3]
        );
        assert_eq!(&frame[38..], &[0u8; 10]);
    }

    #[test]
    fn test_oximeter_association_response_uses_local_address() {
        let encoder = FrameEncoder::new(&OXIMETER, ADDRESS);
        let frame = encoder.encode(Response::AssociationResponse);

        assert_eq!(
            &frame[30..38],
            &[0xAA, 0xBB, 0xCC, 0xFF, 0xFE, 0xDD, 0xEE, 0xFF]
        );
        let mut expected = ASSOCIATION_RESPONSE_TEMPLATE;
        expected[30..38].copy_from_slice(&ADDRESS.to_eui64());
        assert_eq!(frame, expected.to_vec());
    }

    #[test]
    fn test_get_mds_filler_invoke_id() {
        let bp = FrameEncoder::new(&BLOOD_PRESSURE, ADDRESS).get_mds_attributes();
        let ox = FrameEncoder::new(&OXIMETER, ADDRESS).get_mds_attributes();

        assert_eq!(&bp[6..8], &[0x00, 0x24]);
        assert_eq!(&ox[6..8], &[0x12, 0x34]);
        assert_eq!(&bp[8..], &ox[8..]);
        assert_eq!(&bp[..6], &[0xE7, 0x00, 0x00, 0x0E, 0x00, 0x0C]);
    }

    #[test]
    fn test_data_received_echoes_invoke_id() {
        let encoder = FrameEncoder::new(&BLOOD_PRESSURE, ADDRESS);
        let frame = encoder.encode(Response::DataReceived(InvokeId([0x43, 0x21])));

        assert_eq!(
            frame,
            vec![
                0xE7, 0x00, 0x00, 0x12, 0x00, 0x10, 0x43, 0x21, 0x02, 0x01, 0x00, 0x0A, 0x00,
                0x00, 0x00, 0x00, 0x00, 0x00, 0x0D, 0x1D, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn test_release_response() {
        let encoder = FrameEncoder::new(&OXIMETER, ADDRESS);
        assert_eq!(
            encoder.encode(Response::AssociationReleaseResponse),
            vec![0xE5, 0x00, 0x00, 0x02, 0x00, 0x00]
        );
    }
}
