use std::path::{Component, Path, PathBuf};

/// Resolve a caller-supplied virtual path against `root`.
///
/// Returns `(virtual_path, real_path)`: `virtual_path` is the normalized
/// form, always starting with `/`; `real_path` is `virtual_path` joined
/// onto `root` and is always lexically inside it. Unlike a sandbox that
/// rejects `..` escapes outright, net-upward traversal is clamped back to
/// `/` rather than erroring — `list("/../../etc")` resolves to `root`
/// itself, not an error.
///
/// Does not touch the filesystem. Empty input resolves to the root.
#[must_use]
pub fn resolve_path(root: &Path, request_path: &str) -> (String, PathBuf) {
    let mut segments: Vec<&str> = Vec::new();

    for component in Path::new(request_path).components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {
                segments.pop();
            }
            Component::Normal(part) => {
                if let Some(part) = part.to_str() {
                    segments.push(part);
                }
            }
        }
    }

    let virtual_path = if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    };

    let mut real_path = root.to_path_buf();
    for segment in &segments {
        real_path.push(segment);
    }

    (virtual_path, real_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_resolves_to_root() {
        let (virtual_path, real_path) = resolve_path(Path::new("/srv/data"), "");
        assert_eq!(virtual_path, "/");
        assert_eq!(real_path, Path::new("/srv/data"));
    }

    #[test]
    fn ordinary_path_joins_onto_root() {
        let (virtual_path, real_path) = resolve_path(Path::new("/srv/data"), "src/main.rs");
        assert_eq!(virtual_path, "/src/main.rs");
        assert_eq!(real_path, Path::new("/srv/data/src/main.rs"));
    }

    #[test]
    fn net_upward_traversal_clamps_to_root() {
        let (virtual_path, real_path) = resolve_path(Path::new("/srv/data"), "/../../etc");
        assert_eq!(virtual_path, "/etc");
        assert_eq!(real_path, Path::new("/srv/data/etc"));
    }

    #[test]
    fn pure_parent_dir_traversal_clamps_to_root() {
        let (virtual_path, real_path) = resolve_path(Path::new("/srv/data"), "../../../..");
        assert_eq!(virtual_path, "/");
        assert_eq!(real_path, Path::new("/srv/data"));
    }

    #[test]
    fn dot_segments_are_dropped() {
        let (virtual_path, _) = resolve_path(Path::new("/srv/data"), "./a/./b/../c");
        assert_eq!(virtual_path, "/a/c");
    }

    #[test]
    fn resolved_real_path_is_always_inside_root() {
        for input in ["/../../etc/passwd", "a/../../b", "../../../../../x", ""] {
            let (_, real_path) = resolve_path(Path::new("/srv/data"), input);
            assert!(real_path.starts_with("/srv/data"));
        }
    }
}
