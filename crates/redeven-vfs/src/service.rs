use std::path::PathBuf;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use redeven_permissions::PermissionSet;

use crate::error::{VfsError, VfsResult};
use crate::path::resolve_path;

/// Encoding for small-file `read`/`write` content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadEncoding {
    /// Content is valid UTF-8 text.
    Utf8,
    /// Content is base64-encoded arbitrary bytes.
    Base64,
}

/// A directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// The entry's base name.
    pub name: String,
    /// The entry's full virtual path.
    pub virtual_path: String,
    /// True if the entry is a directory.
    pub is_dir: bool,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Creation time, if the platform reports one.
    pub created: Option<DateTime<Utc>>,
    /// Last-modified time.
    pub modified: Option<DateTime<Utc>>,
    /// A Unix-style permission string (e.g. `"rwxr-xr-x"`), if available.
    pub permissions: Option<String>,
}

/// The filesystem service: list/read/write/delete/get_home, each gated by
/// the caller's resolved [`PermissionSet`].
#[derive(Debug, Clone)]
pub struct FsService {
    root: PathBuf,
}

impl FsService {
    /// Create a service rooted at `root`. `root` must be absolute.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The absolute root this service is bound to.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// `list(path, show_hidden?)`. Requires `read`.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::PermissionDenied`] if `read` is not granted,
    /// [`VfsError::NotFound`] if the path is not a directory, or
    /// [`VfsError::Io`] on a read failure.
    pub async fn list(
        &self,
        permissions: &PermissionSet,
        path: &str,
        show_hidden: bool,
    ) -> VfsResult<Vec<FileEntry>> {
        require_read(permissions)?;
        let (virtual_path, real_path) = resolve_path(&self.root, path);

        let mut read_dir = tokio::fs::read_dir(&real_path)
            .await
            .map_err(|source| not_found_or_io(&virtual_path, source))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !show_hidden && name.starts_with('.') {
                continue;
            }
            let metadata = entry.metadata().await?;
            let entry_virtual_path = if virtual_path == "/" {
                format!("/{name}")
            } else {
                format!("{virtual_path}/{name}")
            };
            entries.push(FileEntry {
                name,
                virtual_path: entry_virtual_path,
                is_dir: metadata.is_dir(),
                size: if metadata.is_dir() { 0 } else { metadata.len() },
                created: metadata.created().ok().map(DateTime::<Utc>::from),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                permissions: unix_permission_string(&metadata),
            });
        }

        Ok(entries)
    }

    /// `read(path, encoding)`. Requires `read`.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::PermissionDenied`] if `read` is not granted,
    /// [`VfsError::NotFound`] if the path does not exist, or
    /// [`VfsError::InvalidPath`] if `encoding` is `utf8` and the content
    /// is not valid UTF-8.
    pub async fn read(
        &self,
        permissions: &PermissionSet,
        path: &str,
        encoding: ReadEncoding,
    ) -> VfsResult<String> {
        require_read(permissions)?;
        let (virtual_path, real_path) = resolve_path(&self.root, path);

        let bytes = tokio::fs::read(&real_path)
            .await
            .map_err(|source| not_found_or_io(&virtual_path, source))?;

        match encoding {
            ReadEncoding::Utf8 => String::from_utf8(bytes)
                .map_err(|_| VfsError::InvalidPath(format!("{virtual_path} is not valid UTF-8"))),
            ReadEncoding::Base64 => Ok(BASE64.encode(bytes)),
        }
    }

    /// `write(path, content, encoding, create_dirs?)`. Requires `write`.
    /// Parent directories are created only when `create_dirs` is set.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::PermissionDenied`] if `write` is not granted,
    /// [`VfsError::InvalidPath`] if `content` fails to decode, or
    /// [`VfsError::Io`] on a write failure.
    pub async fn write(
        &self,
        permissions: &PermissionSet,
        path: &str,
        content: &str,
        encoding: ReadEncoding,
        create_dirs: bool,
    ) -> VfsResult<()> {
        require_write(permissions)?;
        let (_, real_path) = resolve_path(&self.root, path);

        let bytes = match encoding {
            ReadEncoding::Utf8 => content.as_bytes().to_vec(),
            ReadEncoding::Base64 => BASE64
                .decode(content)
                .map_err(|source| VfsError::InvalidPath(format!("invalid base64 content: {source}")))?,
        };

        if create_dirs {
            if let Some(parent) = real_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(&real_path, bytes).await?;
        Ok(())
    }

    /// `delete(path, recursive?)`. Requires `write`. Non-empty directories
    /// fail unless `recursive`.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::PermissionDenied`] if `write` is not granted,
    /// [`VfsError::Conflict`] for a non-empty directory without
    /// `recursive`, or [`VfsError::Io`]/[`VfsError::NotFound`] otherwise.
    pub async fn delete(&self, permissions: &PermissionSet, path: &str, recursive: bool) -> VfsResult<()> {
        require_write(permissions)?;
        let (virtual_path, real_path) = resolve_path(&self.root, path);

        let metadata = tokio::fs::metadata(&real_path)
            .await
            .map_err(|source| not_found_or_io(&virtual_path, source))?;

        if metadata.is_dir() {
            if recursive {
                tokio::fs::remove_dir_all(&real_path).await?;
            } else {
                match tokio::fs::remove_dir(&real_path).await {
                    Ok(()) => {}
                    Err(source) if source.kind() == std::io::ErrorKind::DirectoryNotEmpty => {
                        return Err(VfsError::Conflict(format!("{virtual_path} is not empty")));
                    }
                    Err(source) => return Err(source.into()),
                }
            }
        } else {
            tokio::fs::remove_file(&real_path).await?;
        }

        Ok(())
    }

    /// `get_home()` — the virtual root. Requires `read`.
    ///
    /// # Errors
    ///
    /// Returns [`VfsError::PermissionDenied`] if `read` is not granted.
    pub fn get_home(&self, permissions: &PermissionSet) -> VfsResult<String> {
        require_read(permissions)?;
        Ok("/".to_string())
    }

    /// Resolve `path` onto this service's root without permission checks
    /// or filesystem access. Used by the `fs/read_file` stream, which
    /// performs its own permission check up front.
    #[must_use]
    pub fn resolve(&self, path: &str) -> (String, PathBuf) {
        resolve_path(&self.root, path)
    }
}

fn require_read(permissions: &PermissionSet) -> VfsResult<()> {
    if permissions.read {
        Ok(())
    } else {
        Err(VfsError::PermissionDenied("read permission denied".to_string()))
    }
}

fn require_write(permissions: &PermissionSet) -> VfsResult<()> {
    if permissions.write {
        Ok(())
    } else {
        Err(VfsError::PermissionDenied("write permission denied".to_string()))
    }
}

fn not_found_or_io(virtual_path: &str, source: std::io::Error) -> VfsError {
    if source.kind() == std::io::ErrorKind::NotFound {
        VfsError::NotFound(virtual_path.to_string())
    } else {
        VfsError::Io(source)
    }
}

#[cfg(unix)]
fn unix_permission_string(metadata: &std::fs::Metadata) -> Option<String> {
    use std::os::unix::fs::PermissionsExt as _;
    let mode = metadata.permissions().mode();
    let bit = |shift: u32, ch: char| if mode & (1 << shift) != 0 { ch } else { '-' };
    Some(
        [
            bit(8, 'r'),
            bit(7, 'w'),
            bit(6, 'x'),
            bit(5, 'r'),
            bit(4, 'w'),
            bit(3, 'x'),
            bit(2, 'r'),
            bit(1, 'w'),
            bit(0, 'x'),
        ]
        .iter()
        .collect(),
    )
}

#[cfg(not(unix))]
fn unix_permission_string(_metadata: &std::fs::Metadata) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all() -> PermissionSet {
        PermissionSet::all()
    }

    fn none() -> PermissionSet {
        PermissionSet::none()
    }

    #[tokio::test]
    async fn write_then_read_round_trips_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let service = FsService::new(dir.path().to_path_buf());
        service.write(&all(), "/greeting.txt", "hello", ReadEncoding::Utf8, false).await.unwrap();
        let content = service.read(&all(), "/greeting.txt", ReadEncoding::Utf8).await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn write_then_read_round_trips_base64() {
        let dir = tempfile::tempdir().unwrap();
        let service = FsService::new(dir.path().to_path_buf());
        let encoded = BASE64.encode([0xDE, 0xAD, 0xBE, 0xEF]);
        service.write(&all(), "/bin.dat", &encoded, ReadEncoding::Base64, false).await.unwrap();
        let content = service.read(&all(), "/bin.dat", ReadEncoding::Base64).await.unwrap();
        assert_eq!(content, encoded);
    }

    #[tokio::test]
    async fn write_without_permission_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let service = FsService::new(dir.path().to_path_buf());
        let err = service.write(&none(), "/x", "y", ReadEncoding::Utf8, false).await.unwrap_err();
        assert!(matches!(err, VfsError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn delete_then_list_parent_excludes_it() {
        let dir = tempfile::tempdir().unwrap();
        let service = FsService::new(dir.path().to_path_buf());
        service.write(&all(), "/a.txt", "x", ReadEncoding::Utf8, false).await.unwrap();
        service.delete(&all(), "/a.txt", false).await.unwrap();
        let entries = service.list(&all(), "/", false).await.unwrap();
        assert!(!entries.iter().any(|e| e.name == "a.txt"));
    }

    #[tokio::test]
    async fn delete_nonempty_dir_without_recursive_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let service = FsService::new(dir.path().to_path_buf());
        service.write(&all(), "/sub/a.txt", "x", ReadEncoding::Utf8, true).await.unwrap();
        let err = service.delete(&all(), "/sub", false).await.unwrap_err();
        assert!(matches!(err, VfsError::Conflict(_)));
    }

    #[tokio::test]
    async fn list_hides_dotfiles_unless_requested() {
        let dir = tempfile::tempdir().unwrap();
        let service = FsService::new(dir.path().to_path_buf());
        service.write(&all(), "/.hidden", "x", ReadEncoding::Utf8, false).await.unwrap();
        let hidden_excluded = service.list(&all(), "/", false).await.unwrap();
        assert!(!hidden_excluded.iter().any(|e| e.name == ".hidden"));
        let hidden_included = service.list(&all(), "/", true).await.unwrap();
        assert!(hidden_included.iter().any(|e| e.name == ".hidden"));
    }

    #[test]
    fn get_home_is_always_root() {
        let service = FsService::new(PathBuf::from("/srv/data"));
        assert_eq!(service.get_home(&all()).unwrap(), "/");
    }
}
