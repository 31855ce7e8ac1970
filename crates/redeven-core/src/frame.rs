//! Length-prefixed JSON framing shared by every tunnel stream protocol
//! (the RPC stream, the `fs/read_file` binary stream, and the `redeven
//! run`-internal control socket).
//!
//! Wire shape: a `u32` big-endian byte length, then that many bytes of
//! JSON. Binary bodies (the `fs/read_file` payload) are written raw after
//! their own header frame and are not covered by this module.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Errors raised while reading or writing a length-prefixed JSON frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The underlying transport failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The declared frame length exceeds the caller's cap.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    TooLarge {
        /// The declared length.
        len: u32,
        /// The caller-supplied cap.
        max: u32,
    },

    /// The frame body was not valid JSON for the expected type.
    #[error("malformed frame payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read one length-prefixed JSON frame, rejecting anything declaring more
/// than `max_len` bytes before allocating a buffer for it.
///
/// # Errors
///
/// Returns [`FrameError::Io`] on a closed or failing stream,
/// [`FrameError::TooLarge`] if the declared length exceeds `max_len`, or
/// [`FrameError::Json`] if the payload does not deserialize as `T`.
pub async fn read_json_frame<R, T>(reader: &mut R, max_len: u32) -> Result<T, FrameError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0_u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }

    let mut payload = vec![0_u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Write one length-prefixed JSON frame.
///
/// # Errors
///
/// Returns [`FrameError::Json`] if `value` fails to serialize, or
/// [`FrameError::Io`] if the write fails.
pub async fn write_json_frame<W, T>(writer: &mut W, value: &T) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = serde_json::to_vec(value)?;
    write_raw_frame(writer, &payload).await
}

/// Read one length-prefixed frame of raw bytes, for protocols (like the
/// RPC dispatcher's req/reply/notify envelope) that frame their own binary
/// header ahead of a JSON body rather than framing pure JSON.
///
/// # Errors
///
/// Returns [`FrameError::Io`] on a closed or failing stream, or
/// [`FrameError::TooLarge`] if the declared length exceeds `max_len`.
pub async fn read_raw_frame<R>(reader: &mut R, max_len: u32) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0_u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > max_len {
        return Err(FrameError::TooLarge { len, max: max_len });
    }

    let mut payload = vec![0_u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Write one length-prefixed frame of raw bytes.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] if `payload` exceeds `u32::MAX` bytes,
/// or [`FrameError::Io`] if the write fails.
pub async fn write_raw_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge { len: u32::MAX, max: u32::MAX })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Ping {
        n: u32,
    }

    #[tokio::test]
    async fn round_trips_a_frame() {
        let mut buf = Vec::new();
        write_json_frame(&mut buf, &Ping { n: 7 }).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let decoded: Ping = read_json_frame(&mut cursor, 1024).await.unwrap();
        assert_eq!(decoded, Ping { n: 7 });
    }

    #[tokio::test]
    async fn rejects_frames_over_the_cap() {
        let mut buf = Vec::new();
        write_json_frame(&mut buf, &Ping { n: 7 }).await.unwrap();

        let mut cursor = std::io::Cursor::new(buf);
        let err = read_json_frame::<_, Ping>(&mut cursor, 2).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { .. }));
    }
}
