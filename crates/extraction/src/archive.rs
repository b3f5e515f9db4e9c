//! ZIP archives of grade report PDFs.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::error::ExtractionError;

/// One PDF pulled out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// PDFs in `bytes` plus the names of entries that were skipped.
#[derive(Debug, Default)]
pub struct ArchiveContents {
    pub pdfs: Vec<ArchiveEntry>,
    pub skipped: Vec<String>,
}

/// Read every `.pdf` entry. Directories and macOS resource forks are
/// ignored; any other file is reported as skipped.
pub fn read_pdfs(bytes: &[u8]) -> Result<ArchiveContents, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut contents = ArchiveContents::default();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        let name = file.name().to_string();
        if file.is_dir() || name.starts_with("__MACOSX/") {
            continue;
        }
        if !name.to_ascii_lowercase().ends_with(".pdf") {
            contents.skipped.push(name);
            continue;
        }
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)
            .map_err(|e| ExtractionError::Archive(format!("{name}: {e}")))?;
        contents.pdfs.push(ArchiveEntry { name, bytes: buf });
    }

    tracing::debug!(
        pdfs = contents.pdfs.len(),
        skipped = contents.skipped.len(),
        "Archive read"
    );
    Ok(contents)
}
