use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use crate::error::{Error, Result};
use crate::sanitize::sanitize_member;

/// A ZIP container indexed by normalized member name.
///
/// Member names that fail path sanitization are left out of the index, so
/// they can never be looked up, verified or extracted.
pub struct Bundle<R: Read + Seek> {
    archive: zip::ZipArchive<R>,
    label: String,
    index: BTreeMap<String, String>,
    rejected: Vec<String>,
}

impl Bundle<BufReader<File>> {
    /// Open a ZIP file from disk. Anything that is not a readable ZIP
    /// container fails with `CorruptArchive`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let file = File::open(path).map_err(|e| Error::corrupt(label.clone(), e))?;
        Self::from_reader(BufReader::new(file), label)
    }
}

impl<R: Read + Seek> Bundle<R> {
    pub fn from_reader(reader: R, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let archive = zip::ZipArchive::new(reader).map_err(|e| Error::corrupt(label.clone(), e))?;

        let mut index = BTreeMap::new();
        let mut rejected = Vec::new();
        for raw in archive.file_names() {
            match sanitize_member(raw) {
                Ok(normalized) => {
                    index.entry(normalized).or_insert_with(|| raw.to_string());
                }
                Err(_) => rejected.push(raw.to_string()),
            }
        }
        rejected.sort();

        Ok(Self {
            archive,
            label,
            index,
            rejected,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of indexed (safe) members.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Normalized member names, sorted.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.index.keys().map(String::as_str)
    }

    /// Raw names that were refused by path sanitization.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn contains(&self, member: &str) -> bool {
        self.index.contains_key(member)
    }

    fn raw_name(&self, member: &str) -> Result<&str> {
        self.index
            .get(member)
            .map(String::as_str)
            .ok_or_else(|| Error::Archive {
                member: member.to_string(),
                source: zip::result::ZipError::FileNotFound,
            })
    }

    /// Uncompressed size of `member`.
    pub fn member_size(&mut self, member: &str) -> Result<u64> {
        let raw = self.raw_name(member)?.to_string();
        let file = self.archive.by_name(&raw).map_err(|e| Error::Archive {
            member: member.to_string(),
            source: e,
        })?;
        Ok(file.size())
    }

    pub fn is_dir(&mut self, member: &str) -> Result<bool> {
        let raw = self.raw_name(member)?.to_string();
        let file = self.archive.by_name(&raw).map_err(|e| Error::Archive {
            member: member.to_string(),
            source: e,
        })?;
        Ok(file.is_dir())
    }

    /// Decompressing reader over `member`'s bytes only.
    pub fn member_reader(&mut self, member: &str) -> Result<impl Read + '_> {
        let raw = self.raw_name(member)?.to_string();
        self.archive.by_name(&raw).map_err(|e| Error::Archive {
            member: member.to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn zip_of(entries: &[(&str, &[u8])]) -> Cursor<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        let mut cursor = writer.finish().unwrap();
        cursor.set_position(0);
        cursor
    }

    #[test]
    fn indexes_normalized_names() {
        let bundle = Bundle::from_reader(
            zip_of(&[("./a/b.vsix", b"x"), ("c.vsix", b"y")]),
            "mem",
        )
        .unwrap();
        assert_eq!(bundle.members().collect::<Vec<_>>(), vec!["a/b.vsix", "c.vsix"]);
        assert!(bundle.contains("a/b.vsix"));
        assert!(!bundle.contains("./a/b.vsix"));
    }

    #[test]
    fn unsafe_names_are_not_reachable() {
        let mut bundle = Bundle::from_reader(
            zip_of(&[("../evil.sh", b"rm -rf"), ("ok.vsix", b"ok")]),
            "mem",
        )
        .unwrap();
        assert_eq!(bundle.rejected(), ["../evil.sh".to_string()]);
        assert_eq!(bundle.len(), 1);
        assert!(matches!(bundle.member_size("evil.sh"), Err(Error::Archive { .. })));
    }

    #[test]
    fn reads_member_size_and_bytes() {
        let mut bundle = Bundle::from_reader(zip_of(&[("data.bin", b"0123456789")]), "mem").unwrap();
        assert_eq!(bundle.member_size("data.bin").unwrap(), 10);

        let mut content = String::new();
        bundle.member_reader("data.bin").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "0123456789");
    }

    #[test]
    fn garbage_is_corrupt() {
        let result = Bundle::from_reader(Cursor::new(vec![0xDE, 0xAD, 0xBE, 0xEF]), "garbage");
        assert!(matches!(result, Err(Error::CorruptArchive { .. })));
    }
}
