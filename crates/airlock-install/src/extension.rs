//! Extension identities as they appear on disk and in manifests.
//!
//! Names follow `<identity>-<version>` (directories) or
//! `<identity>-<version>.vsix` (packages). The version is the last
//! hyphen-delimited token, and only when it looks like one: `latest`, or an
//! optional `v` followed by a digit. Identities that legitimately end in such
//! a token are misread; that ambiguity is inherent to the naming scheme.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Result;

static VERSION_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:latest|v?\d[\w.-]*)$").unwrap());

const PACKAGE_EXTENSION: &str = "vsix";

/// Split a base name into identity and optional version.
///
/// ```
/// use airlock_install::split_name;
///
/// assert_eq!(split_name("foo.bar-1.0.0"), ("foo.bar".into(), Some("1.0.0".into())));
/// assert_eq!(split_name("foo.bar"), ("foo.bar".into(), None));
/// ```
pub fn split_name(name: &str) -> (String, Option<String>) {
    if let Some((id, token)) = name.rsplit_once('-') {
        if !id.is_empty() && VERSION_TOKEN.is_match(token) {
            return (id.to_string(), Some(token.to_string()));
        }
    }
    (name.to_string(), None)
}

/// Drop a trailing `.vsix`, case-insensitively.
pub fn strip_package_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if ext.eq_ignore_ascii_case(PACKAGE_EXTENSION) && !stem.is_empty() => stem,
        _ => name,
    }
}

pub(crate) fn versions_equal(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstalledExtension {
    pub id: String,
    pub version: Option<String>,
    pub path: PathBuf,
}

impl InstalledExtension {
    fn from_path(path: PathBuf, name: &str) -> Self {
        let (id, version) = split_name(strip_package_extension(name));
        Self { id, version, path }
    }
}

impl fmt::Display for InstalledExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.id, version),
            None => f.write_str(&self.id),
        }
    }
}

/// List directories and `.vsix` files directly under `target`.
///
/// Dotfiles are ignored. A missing `target` yields an empty list. Symlinks
/// are classified by what they point at. Results are sorted by path.
pub fn scan_installed(target: &Path) -> Result<Vec<InstalledExtension>> {
    let read_dir = match fs::read_dir(target) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut installed = Vec::new();
    for entry in read_dir {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        let Ok(metadata) = fs::metadata(&path) else {
            continue;
        };
        let is_package = metadata.is_file()
            && Path::new(&name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(PACKAGE_EXTENSION));

        if metadata.is_dir() || is_package {
            installed.push(InstalledExtension::from_path(path, &name));
        }
    }

    installed.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(installed)
}

/// Include/exclude selector: an identity, optionally pinned to a version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "String")]
pub struct ExtensionRule {
    pub id: String,
    pub version: Option<String>,
}

impl ExtensionRule {
    pub fn new(id: impl Into<String>, version: Option<String>) -> Self {
        Self {
            id: id.into(),
            version,
        }
    }

    /// Identity compares case-insensitively; a pinned version must also match.
    pub fn matches(&self, id: &str, version: Option<&str>) -> bool {
        if !self.id.eq_ignore_ascii_case(id.trim()) {
            return false;
        }
        match (&self.version, version) {
            (None, _) => true,
            (Some(pinned), Some(version)) => versions_equal(pinned, version),
            (Some(_), None) => false,
        }
    }
}

impl FromStr for ExtensionRule {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (id, version) = match s.split_once('@') {
            Some((id, version)) => (id.trim(), Some(version.trim())),
            None => (s, None),
        };
        if id.is_empty() {
            return Err(format!("invalid extension rule '{s}': missing identifier"));
        }
        if version == Some("") {
            return Err(format!("invalid extension rule '{s}': empty version"));
        }
        Ok(Self::new(id, version.map(str::to_string)))
    }
}

impl fmt::Display for ExtensionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.id, version),
            None => f.write_str(&self.id),
        }
    }
}

impl From<ExtensionRule> for String {
    fn from(rule: ExtensionRule) -> Self {
        rule.to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRule {
    Text(String),
    Table { name: String, version: Option<String> },
}

impl TryFrom<RawRule> for ExtensionRule {
    type Error = String;

    fn try_from(raw: RawRule) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawRule::Text(text) => text.parse(),
            RawRule::Table { name, version } => {
                let rule: ExtensionRule = name.parse()?;
                Ok(match version.filter(|v| !v.trim().is_empty()) {
                    Some(version) => ExtensionRule::new(rule.id, Some(version.trim().to_string())),
                    None => rule,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn splits_trailing_version_tokens() {
        assert_eq!(
            split_name("ms-python.python-2024.10.1"),
            ("ms-python.python".into(), Some("2024.10.1".into()))
        );
        assert_eq!(split_name("foo.bar-v2"), ("foo.bar".into(), Some("v2".into())));
        assert_eq!(split_name("foo.bar-latest"), ("foo.bar".into(), Some("latest".into())));
        assert_eq!(split_name("foo.bar-beta"), ("foo.bar".into(), None));
        assert_eq!(split_name("-1.0.0"), ("-1.0.0".into(), None));
    }

    #[test]
    fn platform_suffixes_stay_in_the_identity() {
        let (id, version) = split_name("rust-lang.rust-analyzer-0.3.1-linux-x64");
        assert_eq!(id, "rust-lang.rust-analyzer-0.3.1-linux-x64");
        assert_eq!(version, None);
    }

    #[test]
    fn strips_vsix_case_insensitively() {
        assert_eq!(strip_package_extension("a.b-1.0.VSIX"), "a.b-1.0");
        assert_eq!(strip_package_extension("a.b-1.0"), "a.b-1.0");
        assert_eq!(strip_package_extension(".vsix"), ".vsix");
    }

    #[test]
    fn scan_keeps_dirs_and_packages_only() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("foo.bar-1.0.0")).unwrap();
        fs::create_dir(dir.path().join(".obsolete")).unwrap();
        fs::write(dir.path().join("baz.qux-2.0.0.vsix"), b"pkg").unwrap();
        fs::write(dir.path().join("extensions.json"), b"[]").unwrap();
        fs::write(dir.path().join(".hidden.vsix"), b"pkg").unwrap();

        let installed = scan_installed(dir.path()).unwrap();

        assert_eq!(installed.len(), 2);
        assert_eq!(installed[0].id, "baz.qux");
        assert_eq!(installed[0].version.as_deref(), Some("2.0.0"));
        assert_eq!(installed[1].id, "foo.bar");
        assert_eq!(installed[1].to_string(), "foo.bar@1.0.0");
    }

    #[test]
    fn scan_of_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        assert!(scan_installed(&dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn rules_parse_and_match() {
        let rule: ExtensionRule = "Foo.Bar@1.0.0".parse().unwrap();
        assert!(rule.matches("foo.bar", Some(" 1.0.0 ")));
        assert!(!rule.matches("foo.bar", Some("1.1.0")));
        assert!(!rule.matches("foo.bar", None));

        let any: ExtensionRule = "foo.bar".parse().unwrap();
        assert!(any.matches("FOO.BAR", None));

        assert!("@1.0".parse::<ExtensionRule>().is_err());
        assert!("foo@".parse::<ExtensionRule>().is_err());
    }

    #[test]
    fn rules_deserialize_from_text_or_table() {
        let rules: Vec<ExtensionRule> =
            serde_json::from_str(r#"["a.b@1", {"name": "c.d"}, {"name": "e.f", "version": "2"}]"#)
                .unwrap();
        assert_eq!(
            rules,
            vec![
                ExtensionRule::new("a.b", Some("1".into())),
                ExtensionRule::new("c.d", None),
                ExtensionRule::new("e.f", Some("2".into())),
            ]
        );
    }
}
