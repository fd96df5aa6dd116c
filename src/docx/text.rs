//! Plain text extraction from WordprocessingML parts.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::{DocxPackage, PackageError};

/// Visible text of the whole package: main document first, then headers, footers and notes.
pub fn extract_text(package: &mut DocxPackage<'_>) -> Result<String, PackageError> {
    let mut text = String::new();
    for part in package.text_parts() {
        let xml = package.read_part(&part)?;
        text.push_str(&visible_text(&part, &xml)?);
    }
    Ok(text)
}

/// Visible text of one part, ignoring formatting.
///
/// `w:tab` becomes a tab, `w:br` / `w:cr` a newline, and every paragraph ends
/// with a newline.
pub fn visible_text(part: &str, xml: &str) -> Result<String, PackageError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text_start = false;
    reader.config_mut().trim_text_end = false;

    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        let event = reader.read_event().map_err(|err| PackageError::Xml {
            part: part.to_string(),
            message: err.to_string(),
        })?;
        match event {
            Event::Start(start) if start.name().as_ref() == b"w:t" => in_run_text = true,
            Event::End(end) => match end.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(empty) => match empty.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Text(content) if in_run_text => {
                let unescaped = content.unescape().map_err(|err| PackageError::Xml {
                    part: part.to_string(),
                    message: err.to_string(),
                })?;
                text.push_str(&unescaped);
            }
            Event::CData(content) if in_run_text => {
                text.push_str(&String::from_utf8_lossy(&content));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::fixtures;

    #[test]
    fn test_visible_text_ignores_markup_and_properties() {
        let xml = fixtures::document_xml(
            "<w:p><w:pPr><w:jc w:val=\"center\"/></w:pPr><w:r><w:rPr><w:b/></w:rPr><w:t>Bold</w:t></w:r><w:r><w:tab/><w:t xml:space=\"preserve\"> text</w:t></w:r></w:p><w:p/>",
        );
        assert_eq!(visible_text("word/document.xml", &xml).unwrap(), "Bold\t text\n\n");
    }

    #[test]
    fn test_extract_text_reads_header_after_body() {
        let body = fixtures::document_xml(&fixtures::paragraph(&["body"]));
        let header = format!(
            r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">{}</w:hdr>"#,
            fixtures::paragraph(&["header"])
        );
        let bytes =
            fixtures::package(&[("word/header1.xml", &header), ("word/document.xml", &body)]);
        let mut package = DocxPackage::open(&bytes).unwrap();

        assert_eq!(extract_text(&mut package).unwrap(), "body\nheader\n");
    }
}
