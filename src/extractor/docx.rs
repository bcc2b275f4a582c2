//! DOCX 텍스트 추출 모듈
//!
//! `word/document.xml`의 `<w:t>` 텍스트를 모으고, `<w:p>` 문단 경계를
//! 빈 줄로 바꿔 청커가 문단 단위로 자를 수 있게 합니다.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// document.xml 최대 크기
const MAX_XML_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

/// DOCX 파일에서 텍스트 추출
pub fn extract_text_from_docx(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read DOCX: {:?}", path))?;
    extract_text_from_docx_bytes(&bytes).with_context(|| format!("Failed to parse DOCX: {:?}", path))
}

/// DOCX 바이트에서 텍스트 추출
pub fn extract_text_from_docx_bytes(bytes: &[u8]) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).context("Not a valid DOCX archive")?;

    let entry = archive
        .by_name("word/document.xml")
        .context("word/document.xml not found")?;

    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .context("Failed to read word/document.xml")?;

    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        bail!("word/document.xml exceeds size limit");
    }

    paragraphs_from_xml(&xml)
}

/// `<w:p>` 단위로 `<w:t>` 텍스트를 모아 빈 줄로 연결
fn paragraphs_from_xml(xml: &[u8]) -> Result<String> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => current.clear(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().context("Invalid XML text")?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let para = current.trim();
                    if !para.is_empty() {
                        paragraphs.push(para.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => bail!("XML parse error: {}", e),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs.join("\n\n"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("word/document.xml", options).unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_paragraphs_become_blank_lines() {
        let xml = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Termination Clause:</w:t></w:r><w:r><w:t xml:space="preserve"> 30 days.</w:t></w:r></w:p>
    <w:p><w:r><w:t>Governing law &amp; venue.</w:t></w:r></w:p>
    <w:p></w:p>
  </w:body>
</w:document>"#;

        let bytes = build_docx(xml);
        let text = extract_text_from_docx_bytes(&bytes).unwrap();
        assert_eq!(text, "Termination Clause: 30 days.\n\nGoverning law & venue.");
    }

    #[test]
    fn test_invalid_zip_fails() {
        assert!(extract_text_from_docx_bytes(b"not a zip").is_err());
    }

    #[test]
    fn test_missing_document_xml_fails() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            writer
                .start_file("other.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"<x/>").unwrap();
            writer.finish().unwrap();
        }
        let err = extract_text_from_docx_bytes(&cursor.into_inner()).unwrap_err();
        assert!(err.to_string().contains("document.xml"));
    }
}
