//! Websocket bridge from the progress broadcast to one client.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use lunapatch_core::ProgressEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Forwards every event to the client until either side goes away.
pub(super) async fn forward_events(
    socket: WebSocket,
    mut events: broadcast::Receiver<ProgressEvent>,
) {
    let (mut sender, mut receiver) = socket.split();
    debug!("websocket client connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match event.to_json() {
                        Ok(text) => text,
                        Err(err) => {
                            warn!(?err, "failed to encode progress event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "websocket client fell behind; events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("websocket client disconnected");
}
