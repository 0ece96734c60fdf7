use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use url::Url;

use super::ClientError;
use crate::objects::Event;
use crate::objects::ws::{
    HEARTBEAT_REPLY, HEARTBEAT_REQUEST, IDENTITY_HEADER, NAMESPACE_QUERY_PARAM,
};

/// Tunables for [`WatchClient`].
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// How often the application heartbeat byte is sent.
    pub heartbeat_interval: Duration,
    /// Buffer between the socket task and [`WatchClient::next_event`].
    pub buffer: usize,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            buffer: 256,
        }
    }
}

/// A live subscription to one namespace.
///
/// Events are decoded on a background task and handed out through
/// [`next_event`](WatchClient::next_event). Dropping the client aborts the
/// background task and with it the connection.
pub struct WatchClient {
    events: mpsc::Receiver<Result<Event, ClientError>>,
    task: JoinHandle<()>,
}

impl WatchClient {
    /// Connect to `{base_url}/ws?namespace={namespace}`.
    ///
    /// `base_url` must use the `ws` or `wss` scheme.
    pub async fn connect(
        base_url: &Url,
        namespace: &str,
        identity: &str,
    ) -> Result<Self, ClientError> {
        Self::connect_with(base_url, namespace, identity, WatchOptions::default()).await
    }

    /// Same as [`connect`](WatchClient::connect) with explicit options.
    pub async fn connect_with(
        base_url: &Url,
        namespace: &str,
        identity: &str,
        options: WatchOptions,
    ) -> Result<Self, ClientError> {
        let mut endpoint = base_url.join("/ws")?;
        endpoint
            .query_pairs_mut()
            .append_pair(NAMESPACE_QUERY_PARAM, namespace);

        let mut request = endpoint.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert(IDENTITY_HEADER, HeaderValue::from_str(identity)?);

        let (socket, _) = tokio_tungstenite::connect_async(request).await?;
        tracing::debug!(%endpoint, "watch stream connected");

        let (events_tx, events) = mpsc::channel(options.buffer.max(1));
        let task = tokio::spawn(drive(socket, events_tx, options.heartbeat_interval));

        Ok(Self { events, task })
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the connection is closed.
    pub async fn next_event(&mut self) -> Option<Result<Event, ClientError>> {
        self.events.recv().await
    }
}

impl Drop for WatchClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn drive<S>(
    socket: tokio_tungstenite::WebSocketStream<S>,
    events_tx: mpsc::Sender<Result<Event, ClientError>>,
    heartbeat_interval: Duration,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = socket.split();
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    // The first tick completes immediately.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let beat = Message::Binary(vec![HEARTBEAT_REQUEST]);
                if let Err(e) = sink.send(beat).await {
                    let _ = events_tx.send(Err(e.into())).await;
                    break;
                }
            }
            msg = stream.next() => {
                let event = match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.as_bytes() == [HEARTBEAT_REPLY] {
                            continue;
                        }
                        serde_json::from_str::<Event>(&text).map_err(ClientError::from)
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(?frame, "watch stream closed by server");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => Err(e.into()),
                    None => break,
                };
                let fatal = matches!(event, Err(ClientError::WebSocket(_)));
                if events_tx.send(event).await.is_err() || fatal {
                    break;
                }
            }
        }
    }
}
