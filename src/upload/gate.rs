//! Upload Gate: decides whether an uploaded file may reach the renderer.

use thiserror::Error;

use crate::docx::DOCX_MIME;

const DOCX_EXTENSION: &str = ".docx";

/// Why an upload was turned away.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("Only .docx files are allowed")]
    NotDocx,
    #[error("File too large. Maximum template size is {}", human_size(.limit))]
    TooLarge { limit: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct UploadGate {
    max_bytes: usize,
}

impl UploadGate {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Check the declared metadata before any bytes are read.
    ///
    /// Both the content type and the extension must say Word document.
    pub fn check_declared(
        &self,
        filename: &str,
        content_type: Option<&str>,
    ) -> Result<(), RejectReason> {
        let content_type_ok =
            content_type.is_some_and(|value| value.eq_ignore_ascii_case(DOCX_MIME));
        let extension_ok = filename.to_ascii_lowercase().ends_with(DOCX_EXTENSION);

        if content_type_ok && extension_ok {
            Ok(())
        } else {
            Err(RejectReason::NotDocx)
        }
    }

    /// Check a running byte count while the file is streamed in.
    pub fn check_size(&self, received: usize) -> Result<(), RejectReason> {
        if received > self.max_bytes {
            return Err(RejectReason::TooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

fn human_size(bytes: &usize) -> String {
    let bytes = *bytes;
    const MIB: usize = 1024 * 1024;
    const KIB: usize = 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{} KiB", bytes / KIB)
    } else {
        format!("{bytes} bytes")
    }
}
