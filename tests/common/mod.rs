#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::Path;

use docx_template_server::docx::text::extract_text;
use docx_template_server::docx::{DocxPackage, DOCX_MIME};
use docx_template_server::AppConfig;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const BOUNDARY: &str = "----docx-template-test-boundary";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

/// A package with one paragraph per entry; each entry is split into the given runs.
pub fn docx_with_runs(paragraphs: &[&[&str]]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|runs| {
            let runs: String = runs
                .iter()
                .map(|text| format!(r#"<w:r><w:t xml:space="preserve">{text}</w:t></w:r>"#))
                .collect();
            format!("<w:p>{runs}</w:p>")
        })
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    );

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(CONTENT_TYPES.as_bytes()).unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document.as_bytes()).unwrap();
    writer.finish().unwrap().into_inner()
}

/// A package with one single-run paragraph per entry.
pub fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let runs: Vec<[&str; 1]> = paragraphs.iter().map(|p| [*p]).collect();
    let split: Vec<&[&str]> = runs.iter().map(|r| &r[..]).collect();
    docx_with_runs(&split)
}

/// Visible text of a generated document.
pub fn document_text(bytes: &[u8]) -> String {
    let mut package = DocxPackage::open(bytes).expect("response is a docx package");
    extract_text(&mut package).expect("text can be extracted")
}

pub enum Part<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        bytes: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

impl<'a> Part<'a> {
    /// A correctly declared `.docx` upload in the `template` field.
    pub fn template(bytes: &'a [u8]) -> Self {
        Part::File {
            name: "template",
            filename: "letter.docx",
            content_type: DOCX_MIME,
            bytes,
        }
    }

    pub fn data(value: &'a str) -> Self {
        Part::Text { name: "data", value }
    }
}

/// Content-Type header value and body of a `multipart/form-data` request.
pub fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                name,
                filename,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

/// Configuration pointing at a throw-away template and a generous rate limit.
pub fn test_config(default_template: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.default_template_path = default_template.to_path_buf();
    config.rate_limit.max_requests = 1_000;
    config
}
