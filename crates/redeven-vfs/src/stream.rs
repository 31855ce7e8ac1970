//! The `fs/read_file` binary tunnel stream.
//!
//! 1. Client writes a length-prefixed JSON header: `{path, offset?, max_bytes?}`.
//! 2. Server writes a length-prefixed JSON reply header: either
//!    `{ok:true, file_size, content_len, truncated}` or
//!    `{ok:false, error:{code, message}}`.
//! 3. On success, the server writes exactly `content_len` raw bytes, then
//!    the stream is done.
//!
//! Framing is shared with the RPC stream via [`redeven_core::frame`].

use std::io::SeekFrom;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use redeven_core::{ErrorCode, WireError, read_json_frame, write_json_frame};
use redeven_permissions::PermissionSet;

use crate::error::VfsResult;
use crate::service::FsService;

/// Maximum size of the request header frame. The binary body that follows
/// a success reply has no such cap.
const MAX_HEADER_LEN: u32 = 64 * 1024;
const COPY_CHUNK_BYTES: usize = 64 * 1024;

/// The `fs/read_file` request header.
#[derive(Debug, Deserialize)]
pub struct ReadFileRequest {
    /// The virtual path to read.
    pub path: String,
    /// Byte offset to start reading from. Defaults to `0`.
    #[serde(default)]
    pub offset: Option<u64>,
    /// Maximum number of bytes to return. Defaults to "rest of file".
    #[serde(default)]
    pub max_bytes: Option<u64>,
}

/// The `fs/read_file` reply header: success or failure.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ReadFileReply {
    /// `{ok:true, file_size, content_len, truncated}`.
    Ok {
        /// Always `true`.
        ok: bool,
        /// The full size of the file on disk.
        file_size: u64,
        /// The number of bytes that follow this header.
        content_len: u64,
        /// True if `content_len` is less than the file's remaining bytes
        /// from `offset`.
        truncated: bool,
    },
    /// `{ok:false, error:{code, message}}`.
    Err {
        /// Always `false`.
        ok: bool,
        /// The error detail.
        error: WireError,
    },
}

/// Serve one `fs/read_file` request over `stream`. Never returns an
/// `Err` for a well-formed protocol failure — those are written to the
/// wire as `{ok:false, ...}`; `Err` is reserved for transport-level
/// failures (the header itself could not be written or read).
///
/// The copy loop is cancellation-aware: if `cancellation` fires mid-copy,
/// the function returns immediately without writing a completion signal
/// beyond the (already-sent) reply header — there is no partial-success
/// signalling beyond the socket closing.
///
/// # Errors
///
/// Returns an error only if the transport itself fails while writing a
/// reply header or frame.
pub async fn serve_read_file_stream<S>(
    mut stream: S,
    fs: &FsService,
    permissions: &PermissionSet,
    cancellation: &CancellationToken,
) -> VfsResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = match read_json_frame::<_, ReadFileRequest>(&mut stream, MAX_HEADER_LEN).await {
        Ok(request) => request,
        Err(_) => {
            write_error(&mut stream, ErrorCode::InvalidRequest, "malformed fs/read_file header").await?;
            return Ok(());
        }
    };

    if !permissions.read {
        write_error(&mut stream, ErrorCode::PermissionDenied, "read permission denied").await?;
        return Ok(());
    }

    let (virtual_path, real_path) = fs.resolve(&request.path);

    let metadata = match tokio::fs::metadata(&real_path).await {
        Ok(metadata) => metadata,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            write_error(&mut stream, ErrorCode::NotFound, format!("{virtual_path} not found")).await?;
            return Ok(());
        }
        Err(source) => {
            write_error(&mut stream, ErrorCode::Internal, source.to_string()).await?;
            return Ok(());
        }
    };

    let file_size = metadata.len();
    let offset = request.offset.unwrap_or(0);
    if offset > file_size {
        write_error(&mut stream, ErrorCode::OutOfRange, format!("offset {offset} beyond file size {file_size}"))
            .await?;
        return Ok(());
    }

    let mut file = match tokio::fs::File::open(&real_path).await {
        Ok(file) => file,
        Err(source) => {
            write_error(&mut stream, ErrorCode::Internal, source.to_string()).await?;
            return Ok(());
        }
    };
    if let Err(source) = file.seek(SeekFrom::Start(offset)).await {
        write_error(&mut stream, ErrorCode::Internal, source.to_string()).await?;
        return Ok(());
    }

    let remaining = file_size.saturating_sub(offset);
    let content_len = request.max_bytes.map_or(remaining, |max_bytes| remaining.min(max_bytes));
    let truncated = content_len < remaining;

    write_json_frame(&mut stream, &ReadFileReply::Ok { ok: true, file_size, content_len, truncated })
        .await
        .map_err(std::io::Error::other)?;

    let mut remaining_to_copy = content_len;
    let mut buf = [0_u8; COPY_CHUNK_BYTES];
    while remaining_to_copy > 0 {
        let chunk_len = usize::try_from(remaining_to_copy.min(buf.len() as u64)).unwrap_or(buf.len());
        tokio::select! {
            () = cancellation.cancelled() => return Ok(()),
            read_result = file.read(&mut buf[..chunk_len]) => {
                let bytes_read = read_result?;
                if bytes_read == 0 {
                    break;
                }
                stream.write_all(&buf[..bytes_read]).await?;
                remaining_to_copy = remaining_to_copy.saturating_sub(bytes_read as u64);
            }
        }
    }

    Ok(())
}

async fn write_error<S>(stream: &mut S, code: ErrorCode, message: impl Into<String>) -> VfsResult<()>
where
    S: AsyncWrite + Unpin,
{
    let reply = ReadFileReply::Err { ok: false, error: WireError { code: code.as_u16(), message: message.into() } };
    write_json_frame(stream, &reply).await.map_err(std::io::Error::other)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;

    async fn run_request(
        fs: &FsService,
        permissions: &PermissionSet,
        request: &ReadFileRequest,
    ) -> (ReadFileReplyKind, Vec<u8>) {
        let (mut client, server) = duplex(1024 * 1024);
        write_json_frame(&mut client, request).await.unwrap();

        let cancellation = CancellationToken::new();
        let server_task = tokio::spawn({
            let fs = fs.clone();
            let permissions = *permissions;
            let cancellation = cancellation.clone();
            async move {
                serve_read_file_stream(server, &fs, &permissions, &cancellation).await.unwrap();
            }
        });

        let header: serde_json::Value = read_json_frame(&mut client, MAX_HEADER_LEN).await.unwrap();
        let body = if header["ok"].as_bool() == Some(true) {
            let content_len = header["content_len"].as_u64().unwrap() as usize;
            let mut body = vec![0_u8; content_len];
            if content_len > 0 {
                client.read_exact(&mut body).await.unwrap();
            }
            body
        } else {
            Vec::new()
        };
        server_task.await.unwrap();

        let kind = if header["ok"].as_bool() == Some(true) {
            ReadFileReplyKind::Ok {
                file_size: header["file_size"].as_u64().unwrap(),
                content_len: header["content_len"].as_u64().unwrap(),
                truncated: header["truncated"].as_bool().unwrap(),
            }
        } else {
            ReadFileReplyKind::Err(header["error"]["code"].as_u64().unwrap())
        };
        (kind, body)
    }

    #[derive(Debug, PartialEq, Eq)]
    enum ReadFileReplyKind {
        Ok { file_size: u64, content_len: u64, truncated: bool },
        Err(u64),
    }

    #[tokio::test]
    async fn full_read_returns_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("f.txt"), b"hello world").await.unwrap();
        let fs = FsService::new(dir.path().to_path_buf());

        let (kind, body) =
            run_request(&fs, &PermissionSet::all(), &ReadFileRequest { path: "/f.txt".into(), offset: None, max_bytes: None })
                .await;

        assert_eq!(kind, ReadFileReplyKind::Ok { file_size: 11, content_len: 11, truncated: false });
        assert_eq!(body, b"hello world");
    }

    #[tokio::test]
    async fn offset_and_max_bytes_truncate() {
        let dir = tempfile::tempdir().unwrap();
        let content = vec![b'x'; 10_000];
        tokio::fs::write(dir.path().join("big.bin"), &content).await.unwrap();
        let fs = FsService::new(dir.path().to_path_buf());

        let (kind, body) = run_request(
            &fs,
            &PermissionSet::all(),
            &ReadFileRequest { path: "/big.bin".into(), offset: Some(1000), max_bytes: Some(500) },
        )
        .await;

        assert_eq!(kind, ReadFileReplyKind::Ok { file_size: 10_000, content_len: 500, truncated: true });
        assert_eq!(body.len(), 500);
    }

    #[tokio::test]
    async fn offset_beyond_size_is_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("f.txt"), b"short").await.unwrap();
        let fs = FsService::new(dir.path().to_path_buf());

        let (kind, _) =
            run_request(&fs, &PermissionSet::all(), &ReadFileRequest { path: "/f.txt".into(), offset: Some(1000), max_bytes: None })
                .await;

        assert_eq!(kind, ReadFileReplyKind::Err(416));
    }

    #[tokio::test]
    async fn missing_read_permission_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("f.txt"), b"hello").await.unwrap();
        let fs = FsService::new(dir.path().to_path_buf());

        let (kind, _) =
            run_request(&fs, &PermissionSet::none(), &ReadFileRequest { path: "/f.txt".into(), offset: None, max_bytes: None })
                .await;

        assert_eq!(kind, ReadFileReplyKind::Err(403));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FsService::new(dir.path().to_path_buf());

        let (kind, _) =
            run_request(&fs, &PermissionSet::all(), &ReadFileRequest { path: "/missing.txt".into(), offset: None, max_bytes: None })
                .await;

        assert_eq!(kind, ReadFileReplyKind::Err(404));
    }
}
