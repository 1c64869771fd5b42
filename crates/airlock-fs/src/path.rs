use std::io;
use std::path::{Component, Path, PathBuf};

/// Resolve `path` to an absolute form without requiring it to exist.
///
/// `.` and `..` are folded lexically first, then the longest existing
/// ancestor is canonicalized (so symlinks in it are followed) and the missing
/// tail is appended unchanged.
pub fn resolve_lenient(path: impl AsRef<Path>) -> io::Result<PathBuf> {
    let absolute = fold_components(&std::path::absolute(path.as_ref())?);

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    let mut resolved = loop {
        if let Ok(canonical) = existing.canonicalize() {
            break canonical;
        }
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break existing.to_path_buf(),
        }
    };

    for part in missing.iter().rev() {
        resolved.push(part);
    }
    Ok(resolved)
}

fn fold_components(path: &Path) -> PathBuf {
    let mut folded = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                folded.pop();
            }
            Component::CurDir => {}
            other => folded.push(other.as_os_str()),
        }
    }
    folded
}

/// Whether `child` resolves to `parent` itself or a location beneath it.
pub fn is_within(child: impl AsRef<Path>, parent: impl AsRef<Path>) -> io::Result<bool> {
    let child = resolve_lenient(child)?;
    let parent = resolve_lenient(parent)?;
    Ok(child.starts_with(&parent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolves_missing_tail_against_existing_base() {
        let dir = tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();

        let resolved = resolve_lenient(dir.path().join("a/b/../c")).unwrap();
        assert_eq!(resolved, base.join("a/c"));
    }

    #[test]
    fn nested_and_sibling_detection() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("extensions");
        std::fs::create_dir_all(&target).unwrap();

        assert!(is_within(target.join("backups"), &target).unwrap());
        assert!(is_within(&target, &target).unwrap());
        assert!(!is_within(dir.path().join("backups"), &target).unwrap());
        assert!(!is_within(dir.path().join("extensions-old"), &target).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_backup_root_is_seen_through() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("extensions");
        std::fs::create_dir_all(target.join("inner")).unwrap();
        std::os::unix::fs::symlink(target.join("inner"), dir.path().join("alias")).unwrap();

        assert!(is_within(dir.path().join("alias/backups"), &target).unwrap());
    }
}
