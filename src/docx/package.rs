//! Zip container access for `.docx` packages.

use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::PackageError;

/// Main document part every WordprocessingML package carries.
pub const MAIN_DOCUMENT_PART: &str = "word/document.xml";

/// Decompressed size allowed for a single part unless configured otherwise.
pub const DEFAULT_PART_LIMIT: u64 = 64 * 1024 * 1024;

/// An opened template package borrowed from the request buffer.
pub struct DocxPackage<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    part_limit: u64,
}

impl<'a> DocxPackage<'a> {
    /// Open a package and check that it carries a main document part.
    pub fn open(bytes: &'a [u8]) -> Result<Self, PackageError> {
        Self::open_with_limit(bytes, DEFAULT_PART_LIMIT)
    }

    /// Like [`DocxPackage::open`], refusing to inflate any part past `part_limit` bytes.
    pub fn open_with_limit(bytes: &'a [u8], part_limit: u64) -> Result<Self, PackageError> {
        let archive = ZipArchive::new(Cursor::new(bytes))?;
        if archive.index_for_name(MAIN_DOCUMENT_PART).is_none() {
            return Err(PackageError::MissingPart(MAIN_DOCUMENT_PART.to_string()));
        }
        Ok(Self {
            archive,
            part_limit,
        })
    }

    /// Names of the parts that may contain placeholder tags, main document first.
    pub fn text_parts(&self) -> Vec<String> {
        let mut secondary: Vec<String> = self
            .archive
            .file_names()
            .filter(|name| is_secondary_text_part(name))
            .map(str::to_string)
            .collect();
        secondary.sort();

        let mut parts = Vec::with_capacity(secondary.len() + 1);
        parts.push(MAIN_DOCUMENT_PART.to_string());
        parts.extend(secondary);
        parts
    }

    /// Read a part as UTF-8 text.
    ///
    /// The declared size in the zip header is not trusted: at most
    /// `part_limit` bytes are inflated before the read is abandoned.
    pub fn read_part(&mut self, name: &str) -> Result<String, PackageError> {
        let limit = self.part_limit;
        let mut file = self
            .archive
            .by_name(name)
            .map_err(|_| PackageError::MissingPart(name.to_string()))?;
        let mut buffer = Vec::with_capacity(file.size().min(limit) as usize);
        file.by_ref()
            .take(limit.saturating_add(1))
            .read_to_end(&mut buffer)?;
        if buffer.len() as u64 > limit {
            return Err(PackageError::PartTooLarge {
                part: name.to_string(),
                limit,
            });
        }
        String::from_utf8(buffer).map_err(|_| PackageError::Encoding(name.to_string()))
    }

    /// Serialize a new package, replacing the given parts and copying the rest verbatim.
    pub fn rewrite(
        mut self,
        mut replacements: HashMap<String, Vec<u8>>,
    ) -> Result<Vec<u8>, PackageError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for index in 0..self.archive.len() {
            let file = self.archive.by_index(index)?;
            match replacements.remove(file.name()) {
                Some(content) => {
                    let name = file.name().to_string();
                    drop(file);
                    writer.start_file(name, options)?;
                    writer.write_all(&content)?;
                }
                None => writer.raw_copy_file(file)?,
            }
        }

        Ok(writer.finish()?.into_inner())
    }
}

fn is_secondary_text_part(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    if file.contains('/') || !file.ends_with(".xml") {
        return false;
    }
    file.starts_with("header")
        || file.starts_with("footer")
        || file == "footnotes.xml"
        || file == "endnotes.xml"
}
