//! Archive container: an ordered set of uniquely named entries, shipped as a
//! gzip-compressed tar stream.
//!
//! Encoding is deterministic for a given entry order (fixed mode and mtime),
//! so the same export produces the same bytes. Decoding enforces
//! [`ArchiveLimits`] and rejects duplicate entry names; directory entries are
//! skipped and other non-file entries are ignored with a warning.

use std::collections::HashSet;
use std::io::Read;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::config::ArchiveLimits;
use crate::error::{ArchiveError, ArchiveResult};

/// Content type of an encoded archive.
pub const CONTENT_TYPE: &str = "application/octet-stream";
/// File extension of an encoded archive.
pub const EXTENSION: &str = "tar.gz";

/// One named entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
}

/// Ordered collection of uniquely named entries.
#[derive(Debug, Clone, Default)]
pub struct Archive {
    entries: Vec<ArchiveEntry>,
    names: HashSet<String>,
}

fn corrupt(e: std::io::Error) -> ArchiveError {
    ArchiveError::Corrupt {
        message: e.to_string(),
    }
}

impl Archive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Append an entry. Fails if the name is already taken.
    pub fn push(&mut self, name: impl Into<String>, data: Vec<u8>) -> ArchiveResult<()> {
        let name = name.into();
        if !self.names.insert(name.clone()) {
            return Err(ArchiveError::DuplicateEntry { name });
        }
        self.entries.push(ArchiveEntry { name, data });
        Ok(())
    }

    /// Append an entry named `{stem}.{extension}`, or `{stem}-{n}.{extension}`
    /// with the smallest free `n` if that name is taken. Returns the name used.
    pub fn push_unique(&mut self, stem: &str, extension: &str, data: Vec<u8>) -> String {
        let mut name = format!("{stem}.{extension}");
        let mut n = 1;
        while self.names.contains(&name) {
            name = format!("{stem}-{n}.{extension}");
            n += 1;
        }
        self.names.insert(name.clone());
        self.entries.push(ArchiveEntry {
            name: name.clone(),
            data,
        });
        name
    }

    /// Encode as a gzip-compressed tar stream.
    pub fn encode(&self) -> ArchiveResult<Vec<u8>> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for entry in &self.entries {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(entry.data.len() as u64);
            header.set_mode(0o644);
            header.set_mtime(0);
            builder
                .append_data(&mut header, &entry.name, entry.data.as_slice())
                .map_err(|source| ArchiveError::Io { source })?;
        }
        let encoder = builder
            .into_inner()
            .map_err(|source| ArchiveError::Io { source })?;
        encoder.finish().map_err(|source| ArchiveError::Io { source })
    }

    /// Decode a gzip-compressed tar stream.
    pub fn decode(bytes: &[u8], limits: &ArchiveLimits) -> ArchiveResult<Self> {
        if bytes.is_empty() {
            return Err(ArchiveError::Corrupt {
                message: "archive is empty".into(),
            });
        }

        let mut tar = tar::Archive::new(GzDecoder::new(bytes));
        let mut archive = Archive::new();
        for entry in tar.entries().map_err(corrupt)? {
            let mut entry = entry.map_err(corrupt)?;
            let entry_type = entry.header().entry_type();
            if entry_type.is_dir() {
                continue;
            }
            let name = entry.path().map_err(corrupt)?.to_string_lossy().into_owned();
            if !entry_type.is_file() {
                tracing::warn!(entry = %name, "skipping non-file archive entry");
                continue;
            }
            if archive.len() >= limits.max_entries {
                return Err(ArchiveError::TooManyEntries {
                    max: limits.max_entries,
                });
            }
            let size = entry.header().size().map_err(corrupt)?;
            if size > limits.max_entry_bytes {
                return Err(ArchiveError::EntryTooLarge {
                    name,
                    max: limits.max_entry_bytes,
                });
            }
            let mut data = Vec::with_capacity(size as usize);
            entry.read_to_end(&mut data).map_err(corrupt)?;
            archive.push(name, data)?;
        }
        Ok(archive)
    }
}
