use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Why a member name was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Violation {
    Empty,
    Absolute,
    DriveSeparator,
    ParentTraversal,
    NulByte,
    EscapesBase,
    ThroughSymlink,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Empty => "path is empty",
            Self::Absolute => "path is absolute",
            Self::DriveSeparator => "path contains a drive separator",
            Self::ParentTraversal => "path contains a '..' segment",
            Self::NulByte => "path contains a NUL byte",
            Self::EscapesBase => "path resolves outside the destination",
            Self::ThroughSymlink => "path passes through a symbolic link",
        };
        f.write_str(reason)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unsafe member path '{path}': {reason}")]
pub struct PathViolation {
    pub path: String,
    pub reason: Violation,
}

impl PathViolation {
    fn new(path: &str, reason: Violation) -> Self {
        Self {
            path: path.to_string(),
            reason,
        }
    }
}

/// Normalize a raw member name into a forward-slash, archive-relative path.
///
/// Backslashes become slashes, empty and `.` segments are dropped. Rejects
/// empty names, absolute names, anything with a `:` and any `..` segment.
/// Pure: never touches the filesystem.
pub fn sanitize_member(raw: &str) -> Result<String, PathViolation> {
    if raw.trim().is_empty() {
        return Err(PathViolation::new(raw, Violation::Empty));
    }
    if raw.contains('\0') {
        return Err(PathViolation::new(raw, Violation::NulByte));
    }
    if raw.starts_with('/') || raw.starts_with('\\') {
        return Err(PathViolation::new(raw, Violation::Absolute));
    }
    if raw.contains(':') {
        return Err(PathViolation::new(raw, Violation::DriveSeparator));
    }

    let mut segments = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => return Err(PathViolation::new(raw, Violation::ParentTraversal)),
            part => segments.push(part),
        }
    }

    if segments.is_empty() {
        return Err(PathViolation::new(raw, Violation::Empty));
    }
    Ok(segments.join("/"))
}

/// Result of placing a sanitized member under a destination directory.
#[derive(Clone, Debug)]
pub struct SanitizedPath {
    pub member: String,
    pub resolved: PathBuf,
}

/// Sanitize `member` and join it onto `base`, confirming the result stays
/// beneath `base`.
pub fn sanitize_path(member: &str, base: &Path) -> Result<SanitizedPath, PathViolation> {
    let normalized = sanitize_member(member)?;
    let resolved = base.join(&normalized);
    if !resolved.starts_with(base) {
        return Err(PathViolation::new(member, Violation::EscapesBase));
    }
    Ok(SanitizedPath {
        member: normalized,
        resolved,
    })
}

/// Resolve a symlink target relative to the link's location and confirm it
/// stays beneath `base`. Absolute targets are refused outright.
pub fn sanitize_symlink_target(
    target: &Path,
    link: &Path,
    base: &Path,
) -> Result<PathBuf, PathViolation> {
    let shown = target.to_string_lossy();
    if target.has_root() || shown.starts_with('\\') {
        return Err(PathViolation::new(&shown, Violation::Absolute));
    }

    let mut resolved = link.parent().unwrap_or(base).to_path_buf();
    for component in target.components() {
        match component {
            Component::ParentDir => {
                if !resolved.pop() || !resolved.starts_with(base) {
                    return Err(PathViolation::new(&shown, Violation::EscapesBase));
                }
            }
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathViolation::new(&shown, Violation::Absolute));
            }
        }
    }

    if !resolved.starts_with(base) {
        return Err(PathViolation::new(&shown, Violation::EscapesBase));
    }
    Ok(resolved)
}
