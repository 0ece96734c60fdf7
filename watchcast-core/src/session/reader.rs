use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;
use watchcast_sdk::objects::ws::is_heartbeat_request;

use super::{CloseReason, Control, Frame, Session, TransportError};
use crate::config::SessionConfig;

/// Drive the read half of a session until it fails or the session closes.
pub(super) async fn read_loop<R, E>(
    session: Arc<Session>,
    mut stream: R,
    control: mpsc::Sender<Control>,
    config: SessionConfig,
) where
    R: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    if let Err(e) = read_frames(&session, &mut stream, &control, &config).await {
        debug!(session_id = %session.id(), error = %e, "Session read loop failed");
        session.close_with(CloseReason::Transport(e));
    }
}

/// Returns `Ok(())` only when the session was closed from elsewhere.
async fn read_frames<R, E>(
    session: &Session,
    stream: &mut R,
    control: &mpsc::Sender<Control>,
    config: &SessionConfig,
) -> Result<(), TransportError>
where
    R: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    let mut deadline = Instant::now() + config.idle_timeout;

    loop {
        let next = tokio::select! {
            biased;
            _ = session.cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep_until(deadline) => {
                return Err(TransportError::IdleTimeout(config.idle_timeout));
            }
            next = stream.next() => next,
        };

        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(TransportError::Read(e.to_string())),
            None => return Err(TransportError::PeerClosed),
        };

        let size = frame.payload_len();
        if size > config.max_message_size {
            return Err(TransportError::MessageTooBig {
                size,
                limit: config.max_message_size,
            });
        }

        let binary = match frame {
            Frame::Pong(_) => {
                deadline = Instant::now() + config.idle_timeout;
                continue;
            }
            Frame::Text(text) if is_heartbeat_request(text.as_bytes()) => false,
            Frame::Binary(data) if is_heartbeat_request(&data) => true,
            Frame::Close(_) => return Err(TransportError::PeerClosed),
            _ => continue,
        };

        // Blocks reading until the writer takes the reply. The writer's
        // deadline bounds the wait.
        tokio::select! {
            biased;
            _ = session.cancel.cancelled() => return Ok(()),
            sent = control.send(Control::HeartbeatReply { binary }) => {
                if sent.is_err() {
                    debug!(session_id = %session.id(), "Writer gone, dropping heartbeat reply");
                    return Ok(());
                }
            }
        }
    }
}
