use crate::{Error, Result};
use std::fs::{self, File, FileTimes};
use std::path::Path;

/// Copy a single file, keeping its permission bits and timestamps.
pub fn copy_file_with_metadata(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    let metadata = fs::metadata(src).map_err(|e| Error::Read {
        path: src.to_path_buf(),
        source: e,
    })?;

    // fs::copy carries the permission bits across
    fs::copy(src, dest).map_err(|e| Error::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let mut times = FileTimes::new();
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    open_for_times(dest)
        .and_then(|file| file.set_times(times))
        .map_err(|e| Error::Write {
            path: dest.to_path_buf(),
            source: e,
        })
}

#[cfg(unix)]
fn open_for_times(path: &Path) -> std::io::Result<File> {
    File::open(path)
}

#[cfg(windows)]
fn open_for_times(path: &Path) -> std::io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    fs::OpenOptions::new()
        .access_mode(FILE_WRITE_ATTRIBUTES)
        .open(path)
}

/// Recursively copy a directory tree. Symlinks are recreated, not followed.
pub fn copy_dir_all(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if !dest.exists() {
        fs::create_dir_all(dest).map_err(|e| Error::Write {
            path: dest.to_path_buf(),
            source: e,
        })?;
    }

    for entry in fs::read_dir(src).map_err(|e| Error::Read {
        path: src.to_path_buf(),
        source: e,
    })? {
        let entry = entry.map_err(|e| Error::Read {
            path: src.to_path_buf(),
            source: e,
        })?;
        let file_type = entry.file_type().map_err(|e| Error::Read {
            path: entry.path(),
            source: e,
        })?;

        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir_all(&src_path, &dest_path)?;
        } else if file_type.is_symlink() {
            copy_symlink(&src_path, &dest_path)?;
        } else {
            copy_file_with_metadata(&src_path, &dest_path)?;
        }
    }

    if let Ok(permissions) = fs::metadata(src).map(|m| m.permissions()) {
        let _ = fs::set_permissions(dest, permissions);
    }
    Ok(())
}

/// Recreate the symlink at `src` as `dest`, pointing at the same target.
pub fn copy_symlink(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();
    let target = fs::read_link(src).map_err(|e| Error::Read {
        path: src.to_path_buf(),
        source: e,
    })?;

    #[cfg(unix)]
    let created = std::os::unix::fs::symlink(&target, dest);

    #[cfg(windows)]
    let created = if src.is_dir() {
        std::os::windows::fs::symlink_dir(&target, dest)
    } else {
        std::os::windows::fs::symlink_file(&target, dest)
    };

    created.map_err(|e| Error::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}

/// Copy whatever lives at `src` (file, directory or symlink) to `dest`.
///
/// `dest` must not exist. If the copy fails part way, whatever was written
/// to `dest` is removed again; `src` is never touched.
pub fn copy_path(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if fs::symlink_metadata(dest).is_ok() {
        return Err(Error::AlreadyExists(dest.to_path_buf()));
    }
    let file_type = fs::symlink_metadata(src)
        .map_err(|e| Error::Read {
            path: src.to_path_buf(),
            source: e,
        })?
        .file_type();

    let copied = if file_type.is_symlink() {
        copy_symlink(src, dest)
    } else if file_type.is_dir() {
        copy_dir_all(src, dest)
    } else {
        copy_file_with_metadata(src, dest)
    };

    if copied.is_err() {
        let _ = remove_path(dest);
    }
    copied
}

/// Remove a file, symlink or directory tree.
pub fn remove_path(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file_type = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata.file_type(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(Error::Remove {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let removed = if file_type.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| Error::Remove {
        path: path.to_path_buf(),
        source: e,
    })
}
