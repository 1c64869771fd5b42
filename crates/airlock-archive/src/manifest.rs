//! JSON manifest describing which archive members should exist.
//!
//! ```json
//! {"files": [{"path": "ms-python.python-2024.10.1.vsix", "size": 1024, "sha256": "…"}]}
//! ```
//!
//! `name` is accepted in place of `path`; the two are folded into
//! [`ManifestEntry::member`] here so nothing downstream has to care.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::sanitize::sanitize_member;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Normalized, archive-relative, traversal-free member path.
    pub member: String,
    pub size: Option<u64>,
    /// Lowercase hex SHA-256.
    pub sha256: Option<String>,
}

impl ManifestEntry {
    /// Last path segment of the member.
    pub fn file_name(&self) -> &str {
        self.member.rsplit('/').next().unwrap_or(&self.member)
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    present: Option<bool>,
    path: Option<String>,
    name: Option<String>,
    size: Option<u64>,
    sha256: Option<String>,
}

/// Read and parse the manifest at `path`.
pub fn load_manifest(path: impl AsRef<Path>) -> Result<Vec<ManifestEntry>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::manifest(path, format!("cannot read file: {e}")))?;
    parse_manifest(&text, path)
}

/// Parse manifest text; `origin` is only used in error messages.
///
/// Entries with `"present": false` are dropped. An empty result is valid and
/// means there is nothing to do.
pub fn parse_manifest(text: &str, origin: &Path) -> Result<Vec<ManifestEntry>> {
    let document: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| Error::manifest(origin, format!("not valid JSON: {e}")))?;

    let files = match document.get("files") {
        Some(serde_json::Value::Array(files)) => files,
        Some(_) => return Err(Error::manifest(origin, "'files' is not an array")),
        None => return Err(Error::manifest(origin, "missing 'files' array")),
    };

    let mut entries = Vec::with_capacity(files.len());
    for (i, value) in files.iter().enumerate() {
        let raw: RawEntry = serde_json::from_value(value.clone())
            .map_err(|e| Error::manifest(origin, format!("files[{i}]: {e}")))?;

        if raw.present == Some(false) {
            continue;
        }

        let Some(member) = raw.path.or(raw.name) else {
            return Err(Error::manifest(origin, format!("files[{i}]: missing 'path' or 'name'")));
        };
        let member = sanitize_member(&member)
            .map_err(|violation| Error::manifest(origin, format!("files[{i}]: {violation}")))?;

        let sha256 = raw
            .sha256
            .map(|h| h.trim().to_ascii_lowercase())
            .filter(|h| !h.is_empty());

        entries.push(ManifestEntry {
            member,
            size: raw.size,
            sha256,
        });
    }

    Ok(entries)
}
