//! Virtual filesystem for the redeven agent: a rooted path model, the FS
//! service RPCs (`list`/`read`/`write`/`delete`/`get_home`), and the
//! `fs/read_file` binary stream protocol.
//!
//! Every entry point in this crate takes the caller's resolved
//! [`redeven_permissions::PermissionSet`] and enforces it locally — the
//! session's declared permissions are never re-read from the network once
//! a session starts.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod path;
mod service;
mod stream;

pub use error::{VfsError, VfsResult};
pub use path::resolve_path;
pub use service::{FileEntry, FsService, ReadEncoding};
pub use stream::{ReadFileReply, ReadFileRequest, serve_read_file_stream};
