use crate::{Error, Result};
use std::path::Path;

const PROBE_NAME: &str = ".airlock-write-probe";

/// Create `dir` (and parents) and prove it is writable with a probe file.
pub fn ensure_writable_dir(dir: impl AsRef<Path>) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| Error::Write {
        path: dir.to_path_buf(),
        source: e,
    })?;
    if !dir.is_dir() {
        return Err(Error::NotWritable {
            path: dir.to_path_buf(),
            source: std::io::Error::other("not a directory"),
        });
    }

    let probe = dir.join(PROBE_NAME);
    std::fs::write(&probe, b"ok").map_err(|e| Error::NotWritable {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let _ = std::fs::remove_file(&probe);
    Ok(())
}

/// Guard a mixed list of file and directory paths.
///
/// An existing file, or anything with an extension, is treated as a file and
/// its parent is guarded; everything else is guarded as a directory.
pub fn ensure_paths<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Result<()> {
    for path in paths {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            continue;
        }
        if looks_like_file(path) {
            let parent = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            ensure_writable_dir(parent)?;
        } else {
            ensure_writable_dir(path)?;
        }
    }
    Ok(())
}

fn looks_like_file(path: &Path) -> bool {
    path.is_file() || (!path.is_dir() && path.extension().is_some())
}
