use crate::error::RpcError;

/// The three frame shapes the RPC wire protocol carries: `kind (1 byte) |
/// type_id (u32) | correlation_id (u32, 0 for notify) | payload_json`, all
/// wrapped in the shared length-prefixed frame from [`redeven_core::frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A request expecting exactly one reply.
    Request,
    /// A reply to a previously received request, echoing its correlation id.
    Reply,
    /// A one-way notification; no reply is expected.
    Notify,
}

impl FrameKind {
    const fn as_byte(self) -> u8 {
        match self {
            Self::Request => 1,
            Self::Reply => 2,
            Self::Notify => 3,
        }
    }

    const fn try_from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Request),
            2 => Some(Self::Reply),
            3 => Some(Self::Notify),
            _ => None,
        }
    }
}

const ENVELOPE_HEADER_LEN: usize = 1 + 4 + 4;

/// One decoded RPC frame: kind, type id, correlation id, and the raw JSON
/// payload bytes (left undeserialized until a handler is matched).
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Which of the three frame shapes this is.
    pub kind: FrameKind,
    /// Routes `Request`/`Notify` frames to a registered handler.
    pub type_id: u32,
    /// Caller-chosen correlation id; `0` for `Notify`.
    pub correlation_id: u32,
    /// The JSON payload, not yet parsed.
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Build a new envelope.
    #[must_use]
    pub const fn new(kind: FrameKind, type_id: u32, correlation_id: u32, payload: Vec<u8>) -> Self {
        Self { kind, type_id, correlation_id, payload }
    }

    /// Encode this envelope's header and payload into one frame body
    /// (excluding the outer length prefix, which [`redeven_core::write_raw_frame`] adds).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENVELOPE_HEADER_LEN.saturating_add(self.payload.len()));
        bytes.push(self.kind.as_byte());
        bytes.extend_from_slice(&self.type_id.to_be_bytes());
        bytes.extend_from_slice(&self.correlation_id.to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Decode one frame body (the bytes already stripped of the outer
    /// length prefix by [`redeven_core::read_raw_frame`]).
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::MalformedEnvelope`] if the frame is shorter
    /// than the fixed header or names an unknown kind byte.
    pub fn decode(bytes: &[u8]) -> Result<Self, RpcError> {
        if bytes.len() < ENVELOPE_HEADER_LEN {
            return Err(RpcError::MalformedEnvelope(format!("frame of {} bytes shorter than the {ENVELOPE_HEADER_LEN} byte header", bytes.len())));
        }
        let kind = FrameKind::try_from_byte(bytes[0]).ok_or_else(|| RpcError::MalformedEnvelope(format!("unknown frame kind byte {}", bytes[0])))?;
        let type_id = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        let correlation_id = u32::from_be_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
        let payload = bytes[ENVELOPE_HEADER_LEN..].to_vec();
        Ok(Self { kind, type_id, correlation_id, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_encode_decode() {
        let envelope = Envelope::new(FrameKind::Request, 1001, 42, br#"{"path":"/"}"#.to_vec());
        let decoded = Envelope::decode(&envelope.encode()).unwrap();
        assert_eq!(decoded.kind, FrameKind::Request);
        assert_eq!(decoded.type_id, 1001);
        assert_eq!(decoded.correlation_id, 42);
        assert_eq!(decoded.payload, br#"{"path":"/"}"#);
    }

    #[test]
    fn notify_carries_correlation_id_zero() {
        let envelope = Envelope::new(FrameKind::Notify, 5001, 0, b"{}".to_vec());
        let decoded = Envelope::decode(&envelope.encode()).unwrap();
        assert_eq!(decoded.kind, FrameKind::Notify);
        assert_eq!(decoded.correlation_id, 0);
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let err = Envelope::decode(&[1, 0, 0]).unwrap_err();
        assert!(matches!(err, RpcError::MalformedEnvelope(_)));
    }

    #[test]
    fn unknown_kind_byte_is_malformed() {
        let bytes = Envelope::new(FrameKind::Request, 1, 1, Vec::new()).encode();
        let mut bad = bytes;
        bad[0] = 9;
        let err = Envelope::decode(&bad).unwrap_err();
        assert!(matches!(err, RpcError::MalformedEnvelope(_)));
    }
}
