//! Sub-stream multiplexing over one tunnel `WebSocket` connection.
//!
//! Each multiplexed message is `stream_id (u32 BE) | flags (u8, bit0 = FIN) |
//! payload`, carried as one `WebSocket` binary message (`WebSocket` already
//! provides message framing, so there is no length prefix beyond the
//! 5-byte header). A `stream_id`'s first frame is its hello: a UTF-8 string
//! naming the sub-stream kind (`rpc` or `fs/read_file`); any other kind
//! closes the stream immediately without ever handing it to a handler.

use tokio::sync::mpsc;

use crate::error::{SessionError, SessionResult};

const FLAG_FIN: u8 = 0b0000_0001;
const HEADER_LEN: usize = 5;

/// One frame of the multiplex wire format.
#[derive(Debug, Clone)]
pub struct MultiplexFrame {
    /// Which sub-stream this frame belongs to.
    pub stream_id: u32,
    /// True if the sender has no more data for this `stream_id`.
    pub fin: bool,
    /// The frame's payload; empty is valid (a bare FIN, or a keepalive).
    pub payload: Vec<u8>,
}

impl MultiplexFrame {
    /// Encode into one `WebSocket` binary message body.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN.saturating_add(self.payload.len()));
        out.extend_from_slice(&self.stream_id.to_be_bytes());
        out.push(if self.fin { FLAG_FIN } else { 0 });
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decode one `WebSocket` binary message body.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Protocol`] if `bytes` is shorter than the
    /// 5-byte header.
    pub fn decode(bytes: &[u8]) -> SessionResult<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(SessionError::Protocol(format!("multiplex frame too short: {} bytes", bytes.len())));
        }
        let stream_id = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let fin = bytes[4] & FLAG_FIN != 0;
        Ok(Self { stream_id, fin, payload: bytes[HEADER_LEN..].to_vec() })
    }
}

/// The recognized sub-stream hello kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// A framed RPC request/reply/notify stream.
    Rpc,
    /// A single `fs/read_file` binary transfer.
    FsReadFile,
}

impl StreamKind {
    /// Parse a hello frame's payload. `None` means "close the stream"; the
    /// caller never hands an unrecognized kind to a handler.
    #[must_use]
    pub fn from_hello(payload: &[u8]) -> Option<Self> {
        match std::str::from_utf8(payload).ok()? {
            "rpc" => Some(Self::Rpc),
            "fs/read_file" => Some(Self::FsReadFile),
            _ => None,
        }
    }
}

/// A newly accepted sub-stream, handed to its handler.
pub struct AcceptedStream {
    /// The sub-stream's id, for logging.
    pub stream_id: u32,
    /// Which kind this stream's hello frame named.
    pub kind: StreamKind,
    /// The handler's end of the duplex pipe; writes here are framed back
    /// onto the tunnel, reads here receive demultiplexed tunnel data.
    pub io: tokio::io::DuplexStream,
}

/// Per-stream plumbing registered in the session server's stream table: the
/// inbound half (tunnel -> handler) is driven by feeding frames here, the
/// outbound half (handler -> tunnel) runs as its own pump task.
pub(crate) struct StreamRoute {
    pub(crate) inbound_tx: mpsc::Sender<(Vec<u8>, bool)>,
}

/// Shared bound for the duplex pipe backing one sub-stream.
pub(crate) const STREAM_BUFFER_BYTES: usize = 64 * 1024;

/// Build a fresh sub-stream: the handler's end of the duplex pipe, the
/// inbound route to register in the multiplexer's stream table, the
/// inbound route's receiver (driven by a pump task that copies demuxed
/// tunnel bytes into the tunnel's end of the pipe), and the tunnel's end of
/// the pipe itself (read by a second pump task and framed back out).
pub(crate) fn new_stream(
    stream_id: u32,
    kind: StreamKind,
) -> (AcceptedStream, StreamRoute, mpsc::Receiver<(Vec<u8>, bool)>, tokio::io::DuplexStream) {
    let (agent_side, tunnel_side) = tokio::io::duplex(STREAM_BUFFER_BYTES);
    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    (AcceptedStream { stream_id, kind, io: agent_side }, StreamRoute { inbound_tx }, inbound_rx, tunnel_side)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrips_through_encode_decode() {
        let frame = MultiplexFrame { stream_id: 7, fin: false, payload: b"hello".to_vec() };
        let decoded = MultiplexFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded.stream_id, 7);
        assert!(!decoded.fin);
        assert_eq!(decoded.payload, b"hello");
    }

    #[test]
    fn fin_flag_roundtrips() {
        let frame = MultiplexFrame { stream_id: 3, fin: true, payload: vec![] };
        let decoded = MultiplexFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded.stream_id, 3);
        assert!(decoded.fin);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn short_frame_is_rejected() {
        assert!(MultiplexFrame::decode(&[0, 0, 0]).is_err());
    }

    #[test]
    fn hello_recognizes_rpc_and_fs_read_file() {
        assert_eq!(StreamKind::from_hello(b"rpc"), Some(StreamKind::Rpc));
        assert_eq!(StreamKind::from_hello(b"fs/read_file"), Some(StreamKind::FsReadFile));
        assert_eq!(StreamKind::from_hello(b"exec"), None);
    }
}
