//! `WebSocket` connection management for the control channel.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::error::ControlError;
use crate::protocol::ControlMessage;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Read half of a connected control channel.
pub(crate) type ControlReader = SplitStream<WsStream>;
/// Write half of a connected control channel.
pub(crate) type ControlWriter = SplitSink<WsStream, Message>;

/// A live `WebSocket` connection to the coordinator's control endpoint.
pub(crate) struct ControlConnection {
    writer: ControlWriter,
    reader: ControlReader,
}

impl ControlConnection {
    /// Connect to the coordinator's control endpoint.
    pub(crate) async fn connect(url: &str) -> Result<Self, ControlError> {
        let (ws, _response) = connect_async(url).await?;
        let (writer, reader) = ws.split();
        Ok(Self { writer, reader })
    }

    /// Split into independently owned halves for use with `tokio::select!`.
    pub(crate) fn into_parts(self) -> (ControlWriter, ControlReader) {
        (self.writer, self.reader)
    }
}

/// Send one control message as a JSON text frame.
pub(crate) async fn send(writer: &mut ControlWriter, message: &ControlMessage) -> Result<(), ControlError> {
    let json = serde_json::to_string(message)?;
    writer.send(Message::Text(json.into())).await?;
    Ok(())
}

/// Receive the next control message.
///
/// Returns `Ok(None)` when the stream ends cleanly; a close frame surfaces
/// as `Err(ControlError::Closed(code))`.
pub(crate) async fn recv(reader: &mut ControlReader) -> Result<Option<ControlMessage>, ControlError> {
    loop {
        match reader.next().await {
            Some(Ok(Message::Text(text))) => {
                let message: ControlMessage = serde_json::from_str(&text)?;
                return Ok(Some(message));
            }
            Some(Ok(Message::Close(frame))) => {
                let code = frame.as_ref().map_or(1000, |f| f.code.into());
                return Err(ControlError::Closed(code));
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
            Some(Err(source)) => return Err(source.into()),
            None => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::FrameKind;

    #[test]
    fn control_message_roundtrips_through_json() {
        let message = ControlMessage { kind: FrameKind::Request, type_id: 41_001, correlation_id: 7, payload: serde_json::json!({"a": 1}) };
        let json = serde_json::to_string(&message).unwrap();
        let restored: ControlMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.type_id, 41_001);
        assert_eq!(restored.correlation_id, 7);
        assert_eq!(restored.payload["a"], 1);
    }
}
