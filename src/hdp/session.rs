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

//! Per-device session: association state machine and read loop.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::address::HardwareAddress;
use super::encoder::{FrameEncoder, Response};
use super::frame::{Frame, FrameParser, InvokeId};
use super::measurement;
use super::profile::DeviceClass;
use super::writer::{spawn_writer_task, OutboundFrame, WriterHandle, DEFAULT_QUEUE_DEPTH};
use crate::error::{HdpError, Result};
use crate::events::{EventSink, StatusKind, StatusResult};

/// Pause agents need between the association response and the MDS request.
pub const DEFAULT_ASSOCIATION_PACING: Duration = Duration::from_millis(100);

/// Association state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    AssociationResponseSent,
    MdsRequested,
    DataReceivedResponseSent,
    ReleaseResponseSent,
}

impl SessionState {
    pub fn is_associated(&self) -> bool {
        matches!(
            self,
            SessionState::AssociationResponseSent
                | SessionState::MdsRequested
                | SessionState::DataReceivedResponseSent
        )
    }
}

/// Outcome of feeding one frame to the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transition {
    /// Responses to write, in order.
    pub responses: Vec<Response>,
    /// Whether the frame's measurements go to the dispatcher.
    pub forward_measurements: bool,
}

impl Transition {
    fn none() -> Self {
        Self::default()
    }

    fn respond(response: Response) -> Self {
        Self {
            responses: vec![response],
            forward_measurements: false,
        }
    }
}

/// Association state machine of one session.
///
/// Total over every (state, frame) pair: frames that make no sense in the
/// current state are logged and dropped.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    device_class: DeviceClass,
    state: SessionState,
    last_invoke_id: Option<InvokeId>,
}

impl SessionStateMachine {
    pub fn new(device_class: DeviceClass) -> Self {
        Self {
            device_class,
            state: SessionState::Idle,
            last_invoke_id: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Invoke-id of the most recent data APDU.
    pub fn last_invoke_id(&self) -> Option<InvokeId> {
        self.last_invoke_id
    }

    pub fn on_frame(&mut self, frame: &Frame<'_>) -> Transition {
        match frame {
            Frame::AssociationRequest => match self.state {
                SessionState::Idle | SessionState::ReleaseResponseSent => {
                    self.state = SessionState::AssociationResponseSent;
                    Transition::respond(Response::AssociationResponse)
                }
                state => {
                    warn!(
                        "{}: association request while {:?}, ignoring",
                        self.device_class, state
                    );
                    Transition::none()
                }
            },
            Frame::DataEventReport { invoke_id, .. } => {
                self.last_invoke_id = Some(*invoke_id);
                // Legacy agents report without associating first.
                if self.state == SessionState::ReleaseResponseSent {
                    warn!(
                        "{}: data report {} after release, ignoring",
                        self.device_class, invoke_id
                    );
                    return Transition::none();
                }
                self.state = SessionState::DataReceivedResponseSent;
                Transition {
                    responses: vec![Response::DataReceived(*invoke_id)],
                    forward_measurements: true,
                }
            }
            Frame::AdministrativeResponse { invoke_id } => {
                self.last_invoke_id = Some(*invoke_id);
                if self.state == SessionState::AssociationResponseSent {
                    self.state = SessionState::MdsRequested;
                }
                Transition::none()
            }
            Frame::AssociationReleaseRequest => {
                self.state = SessionState::ReleaseResponseSent;
                Transition::respond(Response::AssociationReleaseResponse)
            }
            Frame::Unrecognized => Transition::none(),
        }
    }

    /// Internal step once the association pacing has elapsed.
    pub fn request_mds_attributes(&mut self) -> Option<Response> {
        if self.state != SessionState::AssociationResponseSent {
            return None;
        }
        self.state = SessionState::MdsRequested;
        Some(Response::GetMdsAttributes)
    }

    /// Back to idle on teardown.
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.last_invoke_id = None;
    }
}

/// Session settings shared by every device class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub association_pacing: Duration,
    pub writer_queue_depth: usize,
    /// Address announced as system identity where the profile asks for it.
    pub local_address: HardwareAddress,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            association_pacing: DEFAULT_ASSOCIATION_PACING,
            writer_queue_depth: DEFAULT_QUEUE_DEPTH,
            local_address: HardwareAddress::default(),
        }
    }
}

/// Everything the read loop needs besides the channel.
struct SessionCore {
    device_class: DeviceClass,
    parser: FrameParser,
    encoder: FrameEncoder,
    machine: SessionStateMachine,
    events: EventSink,
    association_pacing: Duration,
    /// When the MDS attributes request is due; set while an association
    /// response is waiting out the pacing delay.
    mds_due: Option<Instant>,
    state_tx: watch::Sender<SessionState>,
}

impl SessionCore {
    async fn handle_buffer(&mut self, buf: &[u8], writer: &WriterHandle) -> Result<()> {
        let class = self.device_class;
        debug!("{}: read {} byte(s): {}", class, buf.len(), hex::encode(buf));

        let frame = match self.parser.parse(buf) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("{}: skipping malformed frame: {}", class, e);
                return Ok(());
            }
        };
        let measurements = match &frame {
            Frame::DataEventReport { objects, .. } => match measurement::extract(class, objects) {
                Ok(measurements) => measurements,
                Err(e) => {
                    warn!("{}: skipping malformed report: {}", class, e);
                    return Ok(());
                }
            },
            _ => Vec::new(),
        };
        if frame != Frame::Unrecognized {
            info!("{}: {} received", class, frame.name());
        }

        let transition = self.machine.on_frame(&frame);
        self.publish_state();
        self.mds_due = match (self.machine.state(), self.mds_due) {
            (SessionState::AssociationResponseSent, None) => {
                Some(Instant::now() + self.association_pacing)
            }
            (SessionState::AssociationResponseSent, due) => due,
            _ => None,
        };

        let result = self.dispatch(transition.responses, writer).await;

        if transition.forward_measurements {
            for m in measurements {
                info!("{}: {} = {}", class, m.kind, m.value);
                self.events.measurement(m);
            }
        }

        result
    }

    async fn dispatch(&mut self, responses: Vec<Response>, writer: &WriterHandle) -> Result<()> {
        for response in responses {
            let frame = OutboundFrame::new(response, self.encoder.encode(response));
            writer.send(frame).await?;
        }
        Ok(())
    }

    /// Pacing elapsed: ask for the MDS attributes unless a frame moved the
    /// session on in the meantime.
    async fn request_mds_attributes(&mut self, writer: &WriterHandle) -> Result<()> {
        self.mds_due = None;
        if self.machine.state() != SessionState::AssociationResponseSent {
            return Ok(());
        }
        let response = Response::GetMdsAttributes;
        writer
            .send(OutboundFrame::new(response, self.encoder.encode(response)))
            .await?;
        self.machine.request_mds_attributes();
        self.publish_state();
        Ok(())
    }

    fn publish_state(&self) {
        self.state_tx.send_replace(self.machine.state());
    }
}

/// One agent connected over an open duplex channel.
pub struct DeviceSession<C> {
    channel: C,
    core: SessionCore,
    writer_queue_depth: usize,
}

impl<C> DeviceSession<C>
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        device_class: DeviceClass,
        channel: C,
        config: &SessionConfig,
        events: EventSink,
    ) -> Self {
        let profile = device_class.profile();
        let (state_tx, _) = watch::channel(SessionState::Idle);
        Self {
            channel,
            core: SessionCore {
                device_class,
                parser: FrameParser::new(profile),
                encoder: FrameEncoder::new(profile, config.local_address),
                machine: SessionStateMachine::new(device_class),
                events,
                association_pacing: config.association_pacing,
                mds_due: None,
                state_tx,
            },
            writer_queue_depth: config.writer_queue_depth,
        }
    }

    pub fn device_class(&self) -> DeviceClass {
        self.core.device_class
    }

    /// Observe state changes of this session.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.core.state_tx.subscribe()
    }

    /// Run the read loop until the stream ends or the channel fails.
    ///
    /// There is no read timeout: an agent that stops talking keeps this
    /// future pending until the platform closes the channel.
    pub async fn run(self) -> Result<()> {
        let DeviceSession {
            channel,
            mut core,
            writer_queue_depth,
        } = self;
        let class = core.device_class;
        info!("{}: session started", class);

        let (mut reader, write_half) = tokio::io::split(channel);
        let (writer, writer_task) = spawn_writer_task(write_half, class, writer_queue_depth);
        let mut buf = vec![0u8; core.parser.profile().buffer_capacity];

        let read_outcome = loop {
            let mds_due = core.mds_due;
            tokio::select! {
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        info!("{}: stream ended", class);
                        break Ok(());
                    }
                    Ok(n) => {
                        let handled = core.handle_buffer(&buf[..n], &writer).await;
                        core.events.status(class, StatusKind::ReadTick, StatusResult::Ok);
                        if let Err(e) = handled {
                            break Err(e);
                        }
                    }
                    Err(e) => {
                        warn!("{}: read failed: {}", class, e);
                        break Err(HdpError::from(e));
                    }
                },
                _ = sleep_until(mds_due.unwrap_or_else(Instant::now)), if mds_due.is_some() => {
                    if let Err(e) = core.request_mds_attributes(&writer).await {
                        break Err(e);
                    }
                }
            }
        };

        drop(writer);
        let write_outcome = match writer_task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("{}: writer task did not finish: {}", class, e);
                Ok(())
            }
        };

        let outcome = match (read_outcome, write_outcome) {
            (Err(HdpError::SessionClosed), Err(e)) | (Ok(()), Err(e)) => Err(e),
            (outcome, _) => outcome,
        };

        core.machine.reset();
        core.publish_state();

        let result = if outcome.is_ok() {
            StatusResult::Ok
        } else {
            StatusResult::Fail
        };
        core.events.status(class, StatusKind::ReadDone, result);
        info!("{}: session finished", class);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(invoke: [u8; 2]) -> Frame<'static> {
        Frame::DataEventReport {
            invoke_id: InvokeId(invoke),
            objects: Vec::new(),
        }
    }

    fn associated(class: DeviceClass) -> SessionStateMachine {
        let mut machine = SessionStateMachine::new(class);
        machine.on_frame(&Frame::AssociationRequest);
        machine.request_mds_attributes();
        machine
    }

    #[test]
    fn test_association_sequence() {
        let mut machine = SessionStateMachine::new(DeviceClass::BloodPressure);
        assert_eq!(machine.request_mds_attributes(), None);

        let t = machine.on_frame(&Frame::AssociationRequest);
        assert_eq!(t.responses, vec![Response::AssociationResponse]);
        assert_eq!(machine.state(), SessionState::AssociationResponseSent);

        assert_eq!(
            machine.request_mds_attributes(),
            Some(Response::GetMdsAttributes)
        );
        assert_eq!(machine.state(), SessionState::MdsRequested);
        assert!(machine.state().is_associated());
        assert_eq!(machine.request_mds_attributes(), None);
    }

    #[test]
    fn test_data_report_echoes_invoke_id() {
        let mut machine = associated(DeviceClass::BloodPressure);

        let t = machine.on_frame(&report([0x12, 0x34]));
        assert_eq!(t.responses, vec![Response::DataReceived(InvokeId([0x12, 0x34]))]);
        assert!(t.forward_measurements);
        assert_eq!(machine.state(), SessionState::DataReceivedResponseSent);

        let t = machine.on_frame(&report([0x12, 0x35]));
        assert_eq!(t.responses, vec![Response::DataReceived(InvokeId([0x12, 0x35]))]);
        assert_eq!(machine.last_invoke_id(), Some(InvokeId([0x12, 0x35])));
    }

    #[test]
    fn test_no_second_association_response() {
        let mut machine = associated(DeviceClass::Oximeter);
        let t = machine.on_frame(&Frame::AssociationRequest);
        assert!(t.responses.is_empty());
        assert_eq!(machine.state(), SessionState::MdsRequested);

        machine.on_frame(&Frame::AssociationReleaseRequest);
        let t = machine.on_frame(&Frame::AssociationRequest);
        assert_eq!(t.responses, vec![Response::AssociationResponse]);
    }

    #[test]
    fn test_release_from_any_state() {
        for class in DeviceClass::ALL {
            let mut idle = SessionStateMachine::new(class);
            let t = idle.on_frame(&Frame::AssociationReleaseRequest);
            assert_eq!(t.responses, vec![Response::AssociationReleaseResponse]);
            assert_eq!(idle.state(), SessionState::ReleaseResponseSent);

            let mut busy = associated(class);
            busy.on_frame(&report([0, 1]));
            busy.on_frame(&Frame::AssociationReleaseRequest);
            assert_eq!(busy.state(), SessionState::ReleaseResponseSent);
        }
    }

    #[test]
    fn test_report_without_association_accepted() {
        let mut machine = SessionStateMachine::new(DeviceClass::Oximeter);
        let t = machine.on_frame(&report([0, 9]));
        assert_eq!(t.responses, vec![Response::DataReceived(InvokeId([0, 9]))]);
        assert!(t.forward_measurements);
        assert_eq!(machine.state(), SessionState::DataReceivedResponseSent);
    }

    #[test]
    fn test_report_after_release_ignored() {
        let mut machine = associated(DeviceClass::BloodPressure);
        machine.on_frame(&Frame::AssociationReleaseRequest);
        let t = machine.on_frame(&report([0, 9]));
        assert_eq!(t, Transition::default());
        assert_eq!(machine.state(), SessionState::ReleaseResponseSent);
        assert_eq!(machine.last_invoke_id(), Some(InvokeId([0, 9])));
    }

    #[test]
    fn test_unrecognized_changes_nothing() {
        let mut machine = associated(DeviceClass::Oximeter);
        let t = machine.on_frame(&Frame::Unrecognized);
        assert_eq!(t, Transition::default());
        assert_eq!(machine.state(), SessionState::MdsRequested);
    }

    #[test]
    fn test_administrative_response_never_regresses() {
        let mut machine = SessionStateMachine::new(DeviceClass::BloodPressure);
        machine.on_frame(&Frame::AssociationRequest);
        let admin = Frame::AdministrativeResponse {
            invoke_id: InvokeId([0x00, 0x24]),
        };

        let t = machine.on_frame(&admin);
        assert!(t.responses.is_empty());
        assert_eq!(machine.state(), SessionState::MdsRequested);

        machine.on_frame(&report([0, 2]));
        machine.on_frame(&admin);
        assert_eq!(machine.state(), SessionState::DataReceivedResponseSent);
    }

    #[test]
    fn test_reset() {
        let mut machine = associated(DeviceClass::BloodPressure);
        machine.on_frame(&report([0, 3]));
        machine.reset();
        assert_eq!(machine.state(), SessionState::Idle);
        assert_eq!(machine.last_invoke_id(), None);
    }

    #[test]
    fn test_default_pacing() {
        assert_eq!(
            SessionConfig::default().association_pacing,
            Duration::from_millis(100)
        );
    }
}
