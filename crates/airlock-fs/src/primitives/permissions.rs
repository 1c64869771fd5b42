use crate::{Error, Result};
use std::path::Path;

/// Add execute permission for user, group and other, keeping the rest of the mode.
///
/// On non-Unix platforms this only checks that the path exists.
pub fn make_executable(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path).map_err(|e| Error::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = metadata.permissions().mode();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode | 0o111)).map_err(
            |e| Error::Permissions {
                path: path.to_path_buf(),
                source: e,
            },
        )?;
    }
    #[cfg(not(unix))]
    let _ = metadata;

    Ok(())
}

/// Whether `path` exists and carries an execute bit.
pub fn is_executable(path: impl AsRef<Path>) -> bool {
    let Ok(metadata) = std::fs::metadata(path.as_ref()) else {
        return false;
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.is_file() && metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        metadata.is_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn make_executable_sets_bits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("node");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();

        make_executable(&path).unwrap();
        assert!(is_executable(&path));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn make_executable_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            make_executable(dir.path().join("missing")),
            Err(Error::Read { .. })
        ));
        assert!(!is_executable(dir.path().join("missing")));
    }
}
