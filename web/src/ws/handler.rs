use axum::body::Bytes;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use hub::connection::{Connection, ConnectionId, Outbound};
use hub::Hub;
use log::*;
use service::AppState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// How long the writer may take to flush the close frame after the reader ended.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upgrades the request to a WebSocket registered with the hub.
pub(crate) async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    let hub = app_state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Runs one connection until the client leaves, the hub closes it, or the
/// transport fails. Every exit path ends in `Hub::disconnect`.
async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let (sink, mut stream) = socket.split();
    let (sender, outbound) = mpsc::unbounded_channel();

    let connection = hub.connect(sender);
    let connection_id = connection.id().clone();

    let mut writer = tokio::spawn(forward_outbound(sink, outbound, connection_id.clone()));

    let writer_finished = tokio::select! {
        _ = read_inbound(&hub, &connection, &mut stream) => false,
        _ = &mut writer => true,
    };

    hub.disconnect(&connection_id);
    drop(connection);

    if !writer_finished && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer).await.is_err() {
        warn!("Writer for connection {connection_id} did not finish, aborting");
        writer.abort();
    }
}

async fn read_inbound(hub: &Hub, connection: &Connection, stream: &mut SplitStream<WebSocket>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                hub.handle_text(connection, text.as_str());
                if !connection.is_open() {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(
                    "Connection {} sent an unsupported binary frame",
                    connection.id()
                );
            }
            Ok(Message::Pong(_)) => trace!("Connection {} answered keepalive", connection.id()),
            // Protocol pings are answered by the transport.
            Ok(Message::Ping(_)) => {}
            Ok(Message::Close(_)) => {
                debug!("Connection {} sent close frame", connection.id());
                break;
            }
            Err(e) => {
                debug!("Receive error on connection {}: {e}", connection.id());
                break;
            }
        }
    }
}

async fn forward_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: UnboundedReceiver<Outbound>,
    connection_id: ConnectionId,
) {
    while let Some(frame) = outbound.recv().await {
        let closing = frame == Outbound::Close;
        let message = match into_message(frame) {
            Some(message) => message,
            None => continue,
        };

        if let Err(e) = sink.send(message).await {
            debug!("Send error on connection {connection_id}, stopping writer: {e}");
            break;
        }
        if closing {
            break;
        }
    }
}

fn into_message(frame: Outbound) -> Option<Message> {
    match frame {
        Outbound::Message(message) => match message.to_json() {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                error!("Failed to encode {} frame: {e}", message.event_type());
                None
            }
        },
        Outbound::Ping => Some(Message::Ping(Bytes::new())),
        Outbound::Close => Some(Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        }))),
    }
}
