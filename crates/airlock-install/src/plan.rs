use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use airlock_archive::{ManifestEntry, load_manifest};
use airlock_log::Logger;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::extension::{
    ExtensionRule, InstalledExtension, scan_installed, split_name, strip_package_extension,
    versions_equal,
};

/// Policy for previously installed extensions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ReplaceMode {
    /// Leave everything installed alone.
    #[default]
    None,
    /// Displace installed extensions whose version differs from the manifest.
    Replace,
    /// Displace every installed extension.
    Clean,
}

impl FromStr for ReplaceMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "replace" | "prune" => Ok(Self::Replace),
            "clean" | "nuke" => Ok(Self::Clean),
            other => Err(format!("unknown replace mode '{other}' (expected none, replace or clean)")),
        }
    }
}

impl TryFrom<String> for ReplaceMode {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, String> {
        value.parse()
    }
}

impl From<ReplaceMode> for String {
    fn from(mode: ReplaceMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for ReplaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Replace => "replace",
            Self::Clean => "clean",
        })
    }
}

/// Desired `identity -> version` pairs after include/exclude selection.
///
/// Keys are lowercased identities; a later manifest entry for the same
/// identity wins.
pub fn desired_versions(
    entries: &[ManifestEntry],
    include: &[ExtensionRule],
    exclude: &[ExtensionRule],
) -> BTreeMap<String, Option<String>> {
    let mut desired = BTreeMap::new();
    for entry in entries {
        let (id, version) = split_name(strip_package_extension(entry.file_name()));
        let version_ref = version.as_deref();

        if exclude.iter().any(|rule| rule.matches(&id, version_ref)) {
            continue;
        }
        if !include.is_empty() && !include.iter().any(|rule| rule.matches(&id, version_ref)) {
            continue;
        }
        desired.insert(id.to_ascii_lowercase(), version);
    }
    desired
}

/// Compute which installed extensions under `target` must be displaced.
pub fn plan_replacements(
    mode: ReplaceMode,
    target: &Path,
    entries: &[ManifestEntry],
    include: &[ExtensionRule],
    exclude: &[ExtensionRule],
    log: &dyn Logger,
) -> Result<Vec<InstalledExtension>> {
    if mode == ReplaceMode::None {
        log.debug("replace mode is none; installed extensions are left untouched");
        return Ok(Vec::new());
    }

    let installed = scan_installed(target)?;
    if installed.is_empty() {
        log.info(&format!("no installed extensions found in {}", target.display()));
        return Ok(Vec::new());
    }

    let victims: Vec<_> = match mode {
        ReplaceMode::Clean => installed,
        ReplaceMode::Replace => {
            let desired = desired_versions(entries, include, exclude);
            installed
                .into_iter()
                .filter(|item| {
                    let Some(Some(wanted)) = desired.get(&item.id.to_ascii_lowercase()) else {
                        return false;
                    };
                    match &item.version {
                        Some(have) => !versions_equal(have, wanted),
                        None => true,
                    }
                })
                .collect()
        }
        ReplaceMode::None => Vec::new(),
    };

    for victim in &victims {
        log.debug(&format!("{mode}: selected {} ({})", victim, victim.path.display()));
    }
    log.info(&format!("{mode}: {} installed extension(s) to displace", victims.len()));
    Ok(victims)
}

/// [`plan_replacements`] with the manifest loaded from disk.
pub fn plan_from_manifest(
    mode: ReplaceMode,
    target: &Path,
    manifest: &Path,
    include: &[ExtensionRule],
    exclude: &[ExtensionRule],
    log: &dyn Logger,
) -> Result<Vec<InstalledExtension>> {
    if mode == ReplaceMode::None {
        return plan_replacements(mode, target, &[], include, exclude, log);
    }
    let entries = load_manifest(manifest)?;
    plan_replacements(mode, target, &entries, include, exclude, log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlock_log::NoopLogger;
    use std::fs;
    use tempfile::tempdir;

    fn entry(member: &str) -> ManifestEntry {
        ManifestEntry {
            member: member.to_string(),
            size: None,
            sha256: None,
        }
    }

    fn rule(text: &str) -> ExtensionRule {
        text.parse().unwrap()
    }

    fn installed_ids(victims: &[InstalledExtension]) -> Vec<String> {
        victims.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn mode_parsing_accepts_aliases() {
        assert_eq!("PRUNE".parse::<ReplaceMode>().unwrap(), ReplaceMode::Replace);
        assert_eq!("nuke".parse::<ReplaceMode>().unwrap(), ReplaceMode::Clean);
        assert_eq!("None".parse::<ReplaceMode>().unwrap(), ReplaceMode::None);
        assert!("wipe".parse::<ReplaceMode>().is_err());
    }

    #[test]
    fn replace_selects_only_differing_versions() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("foo.bar-1.0.0")).unwrap();
        fs::create_dir(dir.path().join("same.one-2.0.0")).unwrap();
        fs::create_dir(dir.path().join("not.listed-1.0.0")).unwrap();

        let entries = [
            entry("foo.bar-1.1.0.vsix"),
            entry("sub/same.one-2.0.0.vsix"),
        ];
        let victims =
            plan_replacements(ReplaceMode::Replace, dir.path(), &entries, &[], &[], &NoopLogger)
                .unwrap();

        assert_eq!(installed_ids(&victims), vec!["foo.bar@1.0.0"]);
        assert_eq!(victims[0].path, dir.path().join("foo.bar-1.0.0"));
    }

    #[test]
    fn clean_selects_everything() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("foo.bar-1.0.0")).unwrap();
        fs::write(dir.path().join("baz.qux-3.vsix"), b"pkg").unwrap();

        let victims =
            plan_replacements(ReplaceMode::Clean, dir.path(), &[], &[], &[], &NoopLogger).unwrap();
        assert_eq!(victims.len(), 2);
    }

    #[test]
    fn none_never_scans() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("foo.bar-1.0.0")).unwrap();
        let victims = plan_from_manifest(
            ReplaceMode::None,
            dir.path(),
            &dir.path().join("no-such-manifest.json"),
            &[],
            &[],
            &NoopLogger,
        )
        .unwrap();
        assert!(victims.is_empty());
    }

    #[test]
    fn empty_target_needs_no_manifest_match() {
        let dir = tempdir().unwrap();
        let victims = plan_replacements(
            ReplaceMode::Replace,
            &dir.path().join("absent"),
            &[entry("foo.bar-1.1.0.vsix")],
            &[],
            &[],
            &NoopLogger,
        )
        .unwrap();
        assert!(victims.is_empty());
    }

    #[test]
    fn exclude_removes_and_include_restricts() {
        let entries = [
            entry("a.one-1.0.0.vsix"),
            entry("b.two-2.0.0.vsix"),
            entry("c.three-3.0.0.vsix"),
        ];

        let desired = desired_versions(&entries, &[], &[rule("b.two")]);
        assert_eq!(desired.keys().collect::<Vec<_>>(), vec!["a.one", "c.three"]);

        let desired = desired_versions(&entries, &[rule("a.one@1.0.0"), rule("c.three@9")], &[]);
        assert_eq!(desired.keys().collect::<Vec<_>>(), vec!["a.one"]);

        let desired = desired_versions(&entries, &[rule("zzz.none")], &[]);
        assert!(desired.is_empty());
    }

    #[test]
    fn unversioned_install_is_replaced_when_a_version_is_desired() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("foo.bar")).unwrap();

        let victims = plan_replacements(
            ReplaceMode::Replace,
            dir.path(),
            &[entry("foo.bar-1.0.0.vsix")],
            &[],
            &[],
            &NoopLogger,
        )
        .unwrap();
        assert_eq!(installed_ids(&victims), vec!["foo.bar"]);
    }

    #[test]
    fn version_comparison_is_case_insensitive() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("foo.bar-LATEST")).unwrap();

        let victims = plan_replacements(
            ReplaceMode::Replace,
            dir.path(),
            &[entry("Foo.Bar-latest.vsix")],
            &[],
            &[],
            &NoopLogger,
        )
        .unwrap();
        assert!(victims.is_empty());
    }
}
