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

//! Inbound frame classification and header decoding.

use std::fmt;

use super::profile::{
    ObjectListLayout, ProfileDescriptor, ReportCheck, ReportLayout, INVOKE_ID_OFFSET,
};
use crate::error::ParseError;

/// Correlation token of a data APDU, echoed in its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InvokeId(pub [u8; 2]);

impl InvokeId {
    pub fn bytes(&self) -> [u8; 2] {
        self.0
    }
}

impl fmt::Display for InvokeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}{:02x}", self.0[0], self.0[1])
    }
}

/// One observation of a data report, borrowing its payload from the read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataObject<'a> {
    pub handle: u16,
    pub payload: &'a [u8],
}

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<'a> {
    AssociationRequest,
    /// Measurement-bearing data report.
    DataEventReport {
        invoke_id: InvokeId,
        objects: Vec<DataObject<'a>>,
    },
    /// Data APDU that failed the class validity check.
    AdministrativeResponse { invoke_id: InvokeId },
    AssociationReleaseRequest,
    Unrecognized,
}

impl Frame<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Frame::AssociationRequest => "association request",
            Frame::DataEventReport { .. } => "data event report",
            Frame::AdministrativeResponse { .. } => "administrative response",
            Frame::AssociationReleaseRequest => "association release request",
            Frame::Unrecognized => "unrecognized",
        }
    }
}

/// Bounds-checked single byte.
pub(crate) fn byte_at(buf: &[u8], offset: usize) -> Result<u8, ParseError> {
    buf.get(offset).copied().ok_or(ParseError::Truncated {
        offset,
        needed: 1,
        len: buf.len(),
    })
}

/// Bounds-checked big-endian u16.
pub(crate) fn u16_at(buf: &[u8], offset: usize) -> Result<u16, ParseError> {
    let bytes = slice_at(buf, offset, 2)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Bounds-checked sub-slice.
pub(crate) fn slice_at(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], ParseError> {
    offset
        .checked_add(len)
        .and_then(|end| buf.get(offset..end))
        .ok_or(ParseError::Truncated {
            offset,
            needed: len,
            len: buf.len(),
        })
}

/// Classifies inbound buffers for one device class.
#[derive(Debug, Clone, Copy)]
pub struct FrameParser {
    profile: &'static ProfileDescriptor,
}

impl FrameParser {
    pub fn new(profile: &'static ProfileDescriptor) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &'static ProfileDescriptor {
        self.profile
    }

    /// Classify `buf`, the bytes delivered by a single channel read.
    pub fn parse<'a>(&self, buf: &'a [u8]) -> Result<Frame<'a>, ParseError> {
        let Some(&marker) = buf.first() else {
            return Ok(Frame::Unrecognized);
        };

        if marker == self.profile.association_request {
            Ok(Frame::AssociationRequest)
        } else if marker == self.profile.release_request {
            Ok(Frame::AssociationReleaseRequest)
        } else if marker == self.profile.data_report {
            self.parse_data_report(buf)
        } else {
            Ok(Frame::Unrecognized)
        }
    }

    fn parse_data_report<'a>(&self, buf: &'a [u8]) -> Result<Frame<'a>, ParseError> {
        let invoke = slice_at(buf, INVOKE_ID_OFFSET, 2)?;
        let invoke_id = InvokeId([invoke[0], invoke[1]]);

        let observation = match self.profile.report_check {
            ReportCheck::FixedReportTag { offset, tag } => {
                // Short administrative frames legitimately end before the tag.
                match slice_at(buf, offset, 2) {
                    Ok(found) if found == tag => true,
                    _ => return Ok(Frame::AdministrativeResponse { invoke_id }),
                }
            }
            ReportCheck::LengthSubtype {
                offset,
                administrative,
                observation,
            } => {
                let subtype = byte_at(buf, offset)?;
                if subtype == administrative {
                    return Ok(Frame::AdministrativeResponse { invoke_id });
                }
                subtype == observation
            }
        };

        let objects = match self.profile.report_layout {
            ReportLayout::ObjectList(layout) => walk_object_list(buf, &layout)?,
            ReportLayout::FixedObservations(layout) if observation => vec![
                DataObject {
                    handle: layout.spo2_handle,
                    payload: slice_at(buf, layout.spo2_offset, 1)?,
                },
                DataObject {
                    handle: layout.heart_rate_handle,
                    payload: slice_at(buf, layout.heart_rate_offset, 1)?,
                },
            ],
            ReportLayout::FixedObservations(_) => Vec::new(),
        };

        Ok(Frame::DataEventReport { invoke_id, objects })
    }
}

/// Walk the observation list of a scan report.
///
/// Every object must end inside both the received bytes and the declared
/// report; the walk aborts with a [`ParseError`] otherwise.
fn walk_object_list<'a>(
    buf: &'a [u8],
    layout: &ObjectListLayout,
) -> Result<Vec<DataObject<'a>>, ParseError> {
    let declared = usize::from(u16_at(buf, layout.report_length_offset)?);
    let report_end = layout.report_body_offset() + declared;
    if report_end > buf.len() {
        return Err(ParseError::ReportOverrun {
            offset: layout.report_length_offset,
            declared,
            available: buf.len(),
        });
    }
    let report = &buf[..report_end];

    let count = u16_at(report, layout.object_count_offset)?;
    let mut objects = Vec::with_capacity(object_capacity(count, report.len(), layout));
    let mut cursor = layout.first_object_offset;

    for _ in 0..count {
        let handle = u16_at(report, cursor)?;
        let len = usize::from(u16_at(report, cursor + 2)?);
        let payload = slice_at(report, cursor + layout.object_header_len, len)?;
        objects.push(DataObject { handle, payload });
        cursor += layout.object_header_len + len;
    }

    Ok(objects)
}

/// Objects the report can hold at most, whatever count it declares.
fn object_capacity(count: u16, report_len: usize, layout: &ObjectListLayout) -> usize {
    let room = report_len.saturating_sub(layout.first_object_offset) / layout.object_header_len;
    usize::from(count).min(room)
}
