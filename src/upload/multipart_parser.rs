use actix_multipart::{Field, Multipart};
use actix_web::{mime, HttpMessage, HttpRequest};
use futures::StreamExt;
use log::debug;

use super::gate::{RejectReason, UploadGate};

pub const TEMPLATE_FIELD: &str = "template";
pub const DATA_FIELD: &str = "data";

/// A template file held in memory for the duration of one request.
#[derive(Debug)]
pub struct UploadedTemplate {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Everything the upload routes read out of a multipart body.
#[derive(Debug, Default)]
pub struct TemplateUpload {
    pub template: Option<UploadedTemplate>,
    /// Raw `data` text field, JSON not yet parsed.
    pub data: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Multipart field error: {0}")]
    FieldError(String),
    #[error(transparent)]
    Rejected(#[from] RejectReason),
    #[error("Invalid UTF-8 in `{0}` field")]
    Utf8Error(String),
    #[error("Only one template file may be uploaded")]
    DuplicateTemplate,
    #[error("The `{field}` field exceeds the {limit} byte limit")]
    FieldTooLarge { field: String, limit: usize },
}

/// Whether the request declares a `multipart/form-data` body.
pub fn is_multipart(req: &HttpRequest) -> bool {
    matches!(
        req.mime_type(),
        Ok(Some(m)) if m.type_() == mime::MULTIPART && m.subtype() == mime::FORM_DATA
    )
}

pub struct MultipartParser;

impl MultipartParser {
    /// Read the `template` file and `data` field, passing the file through `gate`.
    ///
    /// The gate sees the declared filename and content type before any file
    /// bytes are buffered, and the running size after every chunk, so an
    /// oversize upload is abandoned as soon as it crosses the ceiling.
    pub async fn parse_template_multipart(
        mut multipart: Multipart,
        gate: &UploadGate,
        data_limit: usize,
    ) -> Result<TemplateUpload, UploadError> {
        let mut upload = TemplateUpload::default();

        while let Some(item) = multipart.next().await {
            let mut field = item.map_err(|e| UploadError::FieldError(e.to_string()))?;
            let content_disposition = field.content_disposition().ok_or_else(|| {
                UploadError::FieldError("Content disposition not found".to_string())
            })?;
            let name = content_disposition
                .get_name()
                .ok_or_else(|| UploadError::FieldError("Field name not found".to_string()))?
                .to_string();
            let filename = content_disposition.get_filename().map(str::to_string);

            match (name.as_str(), filename) {
                (TEMPLATE_FIELD, Some(filename)) => {
                    if upload.template.is_some() {
                        return Err(UploadError::DuplicateTemplate);
                    }
                    let content_type = field.content_type().map(|m| m.essence_str().to_string());
                    gate.check_declared(&filename, content_type.as_deref())?;

                    let bytes = read_file(&mut field, gate).await?;
                    debug!("Received template '{}' ({} bytes)", filename, bytes.len());
                    upload.template = Some(UploadedTemplate { filename, bytes });
                }
                (DATA_FIELD, _) => {
                    let bytes = read_text(&mut field, DATA_FIELD, data_limit).await?;
                    let value = String::from_utf8(bytes)
                        .map_err(|_| UploadError::Utf8Error(DATA_FIELD.to_string()))?;
                    upload.data = Some(value);
                }
                _ => {
                    continue;
                }
            }
        }

        Ok(upload)
    }
}

async fn read_file(field: &mut Field, gate: &UploadGate) -> Result<Vec<u8>, UploadError> {
    let mut buffer = Vec::new();
    while let Some(chunk) = field.next().await {
        let data_chunk = chunk.map_err(|e| UploadError::FieldError(e.to_string()))?;
        gate.check_size(buffer.len() + data_chunk.len())?;
        buffer.extend_from_slice(&data_chunk);
    }
    Ok(buffer)
}

async fn read_text(field: &mut Field, name: &str, limit: usize) -> Result<Vec<u8>, UploadError> {
    let mut buffer = Vec::new();
    while let Some(chunk) = field.next().await {
        let data_chunk = chunk.map_err(|e| UploadError::FieldError(e.to_string()))?;
        if buffer.len() + data_chunk.len() > limit {
            return Err(UploadError::FieldTooLarge {
                field: name.to_string(),
                limit,
            });
        }
        buffer.extend_from_slice(&data_chunk);
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header;
    use actix_web::test::TestRequest;

    #[test]
    fn test_is_multipart_checks_declared_type() {
        let form = TestRequest::default()
            .insert_header((header::CONTENT_TYPE, "multipart/form-data; boundary=xyz"))
            .to_http_request();
        let json = TestRequest::default()
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .to_http_request();
        let bare = TestRequest::default().to_http_request();

        assert!(is_multipart(&form));
        assert!(!is_multipart(&json));
        assert!(!is_multipart(&bare));
    }

    #[test]
    fn test_upload_error_display() {
        let error = UploadError::FieldTooLarge {
            field: "data".to_string(),
            limit: 10,
        };
        assert_eq!(error.to_string(), "The `data` field exceeds the 10 byte limit");

        let rejected: UploadError = RejectReason::NotDocx.into();
        assert_eq!(rejected.to_string(), "Only .docx files are allowed");
    }
}
