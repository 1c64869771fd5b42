use std::fmt;
use std::io::{Read, Seek};
use std::str::FromStr;

use airlock_log::Logger;
use airlock_verify::{Sha256Hasher, hash_reader};
use serde::{Deserialize, Serialize};

use crate::bundle::Bundle;
use crate::error::{Error, Result, render_findings};
use crate::manifest::ManifestEntry;

/// How verification findings are surfaced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VerificationMode {
    /// Sizes and hashes are not computed at all.
    None,
    /// Findings are logged as one aggregated warning; the caller proceeds.
    Warn,
    /// Any finding fails the operation before anything is written.
    #[default]
    Error,
}

impl FromStr for VerificationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown verification mode '{other}' (expected none, warn or error)")),
        }
    }
}

impl TryFrom<String> for VerificationMode {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, String> {
        value.parse()
    }
}

impl From<VerificationMode> for String {
    fn from(mode: VerificationMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// A single discrepancy between the manifest and the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Finding {
    SizeMismatch {
        member: String,
        expected: u64,
        actual: u64,
    },
    MissingHash {
        member: String,
    },
    HashMismatch {
        member: String,
        expected: String,
        actual: String,
    },
}

impl Finding {
    pub fn member(&self) -> &str {
        match self {
            Self::SizeMismatch { member, .. }
            | Self::MissingHash { member }
            | Self::HashMismatch { member, .. } => member,
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch {
                member,
                expected,
                actual,
            } => write!(f, "{member}: size mismatch (expected {expected}, got {actual})"),
            Self::MissingHash { member } => write!(f, "{member}: missing sha256 hash in manifest"),
            Self::HashMismatch {
                member,
                expected,
                actual,
            } => write!(f, "{member}: sha256 mismatch (expected {expected}, got {actual})"),
        }
    }
}

/// Fail with `ArchiveIncomplete` unless every manifest member is in the archive.
///
/// Runs before any hashing; the missing list is sorted and de-duplicated.
pub fn ensure_members_present<R: Read + Seek>(
    bundle: &Bundle<R>,
    entries: &[ManifestEntry],
) -> Result<()> {
    let mut missing: Vec<String> = entries
        .iter()
        .filter(|e| !bundle.contains(&e.member))
        .map(|e| e.member.clone())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    missing.sort();
    missing.dedup();
    Err(Error::ArchiveIncomplete { missing })
}

/// Compare every entry against the archive and collect findings.
///
/// Only the member's own bytes are streamed through the hasher. Lookup
/// failures abort; discrepancies are returned, not raised.
pub fn verify_entries<R: Read + Seek>(
    bundle: &mut Bundle<R>,
    entries: &[ManifestEntry],
) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();

    for entry in entries {
        let actual_size = bundle.member_size(&entry.member)?;
        if let Some(expected) = entry.size {
            if expected != actual_size {
                findings.push(Finding::SizeMismatch {
                    member: entry.member.clone(),
                    expected,
                    actual: actual_size,
                });
            }
        }

        let Some(expected) = entry.sha256.as_deref() else {
            findings.push(Finding::MissingHash {
                member: entry.member.clone(),
            });
            continue;
        };

        let reader = bundle.member_reader(&entry.member)?;
        let (actual, _) = hash_reader(reader, Sha256Hasher::new()).map_err(|e| {
            Error::corrupt(format!("member '{}'", entry.member), e)
        })?;
        if actual != expected {
            findings.push(Finding::HashMismatch {
                member: entry.member.clone(),
                expected: expected.to_string(),
                actual,
            });
        }
    }

    Ok(findings)
}

/// Existence check followed by verification under `mode`.
///
/// The existence check is never waived. Returns the findings that were
/// tolerated (always empty under `None` and `Error`).
pub fn check_integrity<R: Read + Seek>(
    bundle: &mut Bundle<R>,
    entries: &[ManifestEntry],
    mode: VerificationMode,
    log: &dyn Logger,
) -> Result<Vec<Finding>> {
    ensure_members_present(bundle, entries)?;
    log.debug(&format!(
        "all {} manifest members present in {}",
        entries.len(),
        bundle.label()
    ));

    if mode == VerificationMode::None {
        log.info("integrity verification disabled");
        return Ok(Vec::new());
    }

    let findings = verify_entries(bundle, entries)?;
    if findings.is_empty() {
        log.info(&format!("verified {} archive members", entries.len()));
        return Ok(findings);
    }

    match mode {
        VerificationMode::Warn => {
            log.warning(&format!(
                "integrity verification reported {} finding(s):\n{}",
                findings.len(),
                render_findings(&findings)
            ));
            Ok(findings)
        }
        _ => Err(Error::IntegrityFailure { findings }),
    }
}
