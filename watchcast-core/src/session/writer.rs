use bytes::Bytes;
use futures_util::{Sink, SinkExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;
use watchcast_sdk::objects::ws::HEARTBEAT_REPLY;

use super::{CloseReason, Control, Frame, Session, TransportError};
use crate::config::SessionConfig;

/// Drive the write half of a session until it fails or the session closes.
///
/// This is the only code that writes to the connection.
pub(super) async fn write_loop<W>(
    session: Arc<Session>,
    mut sink: W,
    mut mailbox: mpsc::Receiver<String>,
    mut control: mpsc::Receiver<Control>,
    config: SessionConfig,
) where
    W: Sink<Frame> + Unpin,
    W::Error: Display,
{
    let result = write_frames(&session, &mut sink, &mut mailbox, &mut control, &config).await;

    match result {
        Ok(()) => {
            let goodbye = Frame::Close(session.close_reason().and_then(|r| r.close_frame()));
            if let Err(e) = write_frame(&mut sink, goodbye, config.write_timeout).await {
                debug!(session_id = %session.id(), error = %e, "Failed to send close frame");
            }
        }
        Err(e) => {
            debug!(session_id = %session.id(), error = %e, "Session write loop failed");
            session.close_with(CloseReason::Transport(e));
        }
    }
}

/// Returns `Ok(())` only when the session was closed from elsewhere.
async fn write_frames<W>(
    session: &Session,
    sink: &mut W,
    mailbox: &mut mpsc::Receiver<String>,
    control: &mut mpsc::Receiver<Control>,
    config: &SessionConfig,
) -> Result<(), TransportError>
where
    W: Sink<Frame> + Unpin,
    W::Error: Display,
{
    let period = config.ping_period();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);

    loop {
        // Pings go before data so a busy mailbox cannot starve them.
        let frame = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => return Ok(()),
            _ = ping.tick() => Frame::Ping(Bytes::new()),
            Some(Control::HeartbeatReply { binary }) = control.recv() => heartbeat_reply(binary),
            payload = mailbox.recv() => match payload {
                Some(payload) => Frame::Text(payload),
                None => return Ok(()),
            },
        };
        write_frame(sink, frame, config.write_timeout).await?;
    }
}

fn heartbeat_reply(binary: bool) -> Frame {
    if binary {
        Frame::Binary(Bytes::from_static(&[HEARTBEAT_REPLY]))
    } else {
        Frame::Text(char::from(HEARTBEAT_REPLY).to_string())
    }
}

async fn write_frame<W>(sink: &mut W, frame: Frame, timeout: Duration) -> Result<(), TransportError>
where
    W: Sink<Frame> + Unpin,
    W::Error: Display,
{
    match tokio::time::timeout(timeout, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::Write(e.to_string())),
        Err(_) => Err(TransportError::WriteTimeout(timeout)),
    }
}
