//! Companion archives of project exports.

use std::fs::File;
use std::io::Read;

use camino::Utf8Path;
use dz_core::FxHashSet;
use zip::ZipArchive;
use zip::result::ZipResult;

/// One file extracted from a project archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Base name of the entry; directories inside the archive are dropped.
    pub name: String,
    /// Uncompressed content.
    pub bytes: Vec<u8>,
}

/// The flattened content of a project archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectArchive {
    entries: Vec<ArchiveEntry>,
}

impl ProjectArchive {
    /// Reads every file entry of the zip at `path`.
    ///
    /// Entries are flattened to their base name in archive order. Directory
    /// entries are skipped and when two entries share a base name the first
    /// one wins.
    ///
    /// # Errors
    ///
    /// Returns the zip error if the archive cannot be opened or an entry
    /// cannot be decompressed.
    pub fn read(path: &Utf8Path) -> ZipResult<Self> {
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut seen = FxHashSet::default();
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }

            let Some(name) = Utf8Path::new(file.name().trim_end_matches(['/', '\\']))
                .file_name()
                .map(|name| name.rsplit('\\').next().unwrap_or(name).to_owned())
            else {
                continue;
            };
            if !seen.insert(name.clone()) {
                tracing::debug!(archive = %path, entry = file.name(), "Dropping duplicate archive entry");
                continue;
            }

            let mut bytes = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
            file.read_to_end(&mut bytes)?;
            entries.push(ArchiveEntry { name, bytes });
        }

        Ok(Self { entries })
    }

    /// Returns the entries in archive order.
    #[must_use]
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Looks up an entry by base name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the archive held no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
