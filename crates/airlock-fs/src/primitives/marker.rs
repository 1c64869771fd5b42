use crate::{Error, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Replace `path` with `content` through a synced sibling file and a rename,
/// so readers see either the old file or the complete new one.
pub fn replace_file(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let path = path.as_ref();
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| Error::Write { path, source }
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    let staged = parent.join(format!(".{name}.{}.new", std::process::id()));

    let written = File::create(&staged).and_then(|mut file| {
        file.write_all(content)?;
        file.sync_all()
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&staged);
        return Err(write_err(&staged)(e));
    }

    fs::rename(&staged, path).map_err(|e| {
        let _ = fs::remove_file(&staged);
        write_err(path)(e)
    })
}

/// Create a zero-byte marker file and stamp it.
///
/// The modification time is the current time, pushed forward to at least one
/// second past `not_before` so pollers comparing timestamps see the marker as
/// strictly newer. Returns the timestamp that was written.
pub fn write_marker(path: impl AsRef<Path>, not_before: Option<SystemTime>) -> Result<SystemTime> {
    let path = path.as_ref();
    replace_file(path, &[])?;

    let mut stamp = SystemTime::now();
    if let Some(floor) = not_before.map(|t| t + Duration::from_secs(1)) {
        if stamp < floor {
            stamp = floor;
        }
    }

    File::options()
        .write(true)
        .open(path)
        .and_then(|file| file.set_modified(stamp))
        .map_err(|e| Error::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(stamp)
}

/// Latest modification time among `paths`, ignoring any that cannot be read.
pub fn latest_mtime<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> Option<SystemTime> {
    paths
        .into_iter()
        .filter_map(|p| fs::metadata(p.as_ref()).and_then(|m| m.modified()).ok())
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn replace_file_overwrites_without_leftovers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state");
        fs::write(&path, b"old").unwrap();

        replace_file(&path, b"new").unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn marker_is_empty_and_newer_than_floor() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("0");
        let future = SystemTime::now() + Duration::from_secs(3600);

        let stamp = write_marker(&marker, Some(future)).unwrap();

        let metadata = fs::metadata(&marker).unwrap();
        assert_eq!(metadata.len(), 0);
        assert!(stamp > future);
        assert_eq!(metadata.modified().unwrap(), stamp);
    }

    #[test]
    fn latest_mtime_skips_missing() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("present");
        fs::write(&present, "").unwrap();

        let latest = latest_mtime([present.clone(), dir.path().join("absent")]);
        assert_eq!(latest, fs::metadata(&present).unwrap().modified().ok());
        assert_eq!(latest_mtime(Vec::<&Path>::new()), None);
    }
}
