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

//! Per-session writer task.
//!
//! All responses of a session go through one mpsc queue drained by a single
//! task, so frames reach the channel whole and in the order the state
//! machine produced them.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::encoder::Response;
use super::profile::DeviceClass;
use crate::error::{HdpError, Result};

/// Default depth of the per-session response queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// An encoded response waiting to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub response: Response,
    pub bytes: Vec<u8>,
}

impl OutboundFrame {
    pub fn new(response: Response, bytes: Vec<u8>) -> Self {
        Self { response, bytes }
    }
}

/// Sending side of a session's writer queue.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Queue a frame. Fails once the writer task has stopped.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| HdpError::SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Spawn the writer task for one session.
///
/// The task ends when every [`WriterHandle`] is dropped, after draining the
/// queue and shutting the channel down, or at the first failed write.
pub fn spawn_writer_task<W>(
    writer: W,
    device_class: DeviceClass,
    queue_depth: usize,
) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(queue_depth.max(1));
    let task = tokio::spawn(writer_loop(rx, writer, device_class));
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(
    mut rx: mpsc::Receiver<OutboundFrame>,
    mut writer: W,
    device_class: DeviceClass,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame.bytes).await {
            warn!(
                "{}: failed to write {}: {}",
                device_class,
                frame.response.name(),
                e
            );
            close(&mut writer, device_class).await;
            return Err(e.into());
        }
        info!("{}: sent {}", device_class, frame.response.name());
        debug!("{}: wrote {}", device_class, hex::encode(&frame.bytes));
    }

    close(&mut writer, device_class).await;
    Ok(())
}

async fn write_frame<W>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(bytes).await?;
    writer.flush().await
}

/// Best-effort channel close; failures are swallowed.
async fn close<W>(writer: &mut W, device_class: DeviceClass)
where
    W: AsyncWrite + Unpin,
{
    if let Err(e) = writer.shutdown().await {
        debug!("{}: ignoring close failure: {}", device_class, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, AsyncReadExt};

    struct FailingWriter;

    impl AsyncWrite for FailingWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "channel gone",
            )))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "already closed",
            )))
        }
    }

    #[tokio::test]
    async fn test_frames_written_in_order() {
        let (client, mut server) = duplex(1024);
        let (handle, task) = spawn_writer_task(client, DeviceClass::BloodPressure, 4);

        handle
            .send(OutboundFrame::new(Response::AssociationResponse, vec![1, 2, 3]))
            .await
            .unwrap();
        handle
            .send(OutboundFrame::new(Response::GetMdsAttributes, vec![4, 5]))
            .await
            .unwrap();
        drop(handle);

        task.await.unwrap().unwrap();

        let mut written = Vec::new();
        server.read_to_end(&mut written).await.unwrap();
        assert_eq!(written, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_write_failure_stops_writer() {
        let (handle, task) = spawn_writer_task(FailingWriter, DeviceClass::Oximeter, 4);

        handle
            .send(OutboundFrame::new(Response::AssociationReleaseResponse, vec![0xE5]))
            .await
            .unwrap();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(HdpError::Io(_))));
        assert!(handle.is_closed());
        assert!(matches!(
            handle
                .send(OutboundFrame::new(Response::GetMdsAttributes, vec![0xE7]))
                .await,
            Err(HdpError::SessionClosed)
        ));
    }
}
