use axum::{
    extract::{
        Query, State,
        ws::{self, Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, future};
use serde::Deserialize;
use watchcast_core::config::SessionConfig;
use watchcast_core::session::{CloseFrame, Frame};

use super::extractors::RemoteUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(super) struct WatchQuery {
    /// Empty means cluster-scoped objects only.
    #[serde(default)]
    namespace: String,
}

/// `GET /ws?namespace=<ns>`: WebSocket change stream.
///
/// Upgrades the HTTP connection and registers a session that receives every
/// event in `namespace` as a JSON text frame. The session's tunables are
/// fixed at handshake time.
pub(super) async fn watch_ws(
    State(state): State<AppState>,
    RemoteUser(identity): RemoteUser,
    Query(query): Query<WatchQuery>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    let config = state.session_config().await;
    upgrade
        .max_message_size(config.max_message_size)
        .on_upgrade(move |socket| async move {
            open_session(socket, state, identity, query.namespace, config);
        })
}

/// Hand the socket to a new session. The session owns both halves from here.
fn open_session(
    socket: WebSocket,
    state: AppState,
    identity: String,
    namespace: String,
    config: SessionConfig,
) {
    let (sink, stream) = socket.split();
    let sink = sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(to_message(frame))));
    let stream = stream.map(|message| message.map(from_message));

    state
        .registry
        .subscribe(identity, namespace, &config, stream, sink);
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data),
        Frame::Ping(data) => Message::Ping(data),
        Frame::Pong(data) => Message::Pong(data),
        Frame::Close(close) => Message::Close(close.map(|c| ws::CloseFrame {
            code: c.code,
            reason: c.reason.into(),
        })),
    }
}

fn from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(data) => Frame::Binary(data),
        Message::Ping(data) => Frame::Ping(data),
        Message::Pong(data) => Frame::Pong(data),
        Message::Close(close) => Frame::Close(close.map(|c| CloseFrame {
            code: c.code,
            reason: c.reason.as_str().to_owned(),
        })),
    }
}

