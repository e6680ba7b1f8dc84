//! Document loaders
//!
//! Turns uploaded bytes into plain-text documents. The accepted formats form a closed list,
//! anything else is rejected before parsing.

use kbchat_core::{validation_error, ErrorContext, KbChatError, KbChatResult};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Cursor, Read};

const COMPONENT: &str = "loader";

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Csv,
    PlainText,
    Markdown,
}

impl DocumentKind {
    /// Resolve a MIME type, ignoring parameters such as `charset`
    pub fn from_mime(mime: &str) -> KbChatResult<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/pdf" => Ok(DocumentKind::Pdf),
            DOCX_MIME => Ok(DocumentKind::Docx),
            "text/csv" => Ok(DocumentKind::Csv),
            "text/plain" => Ok(DocumentKind::PlainText),
            "text/markdown" => Ok(DocumentKind::Markdown),
            _ => Err(validation_error!(
                format!("Unsupported file type: {}", mime),
                "file",
                COMPONENT
            )),
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "application/pdf",
            DocumentKind::Docx => DOCX_MIME,
            DocumentKind::Csv => "text/csv",
            DocumentKind::PlainText => "text/plain",
            DocumentKind::Markdown => "text/markdown",
        }
    }
}

/// Text extracted from an upload, with loader metadata
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub text: String,
    pub metadata: HashMap<String, String>,
}

impl LoadedDocument {
    fn new(text: String, file_name: &str) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("source".to_string(), file_name.to_string());
        Self { text, metadata }
    }
}

fn parse_error(kind: DocumentKind, file_name: &str, message: String) -> KbChatError {
    KbChatError::Validation {
        message: format!("Failed to parse {}: {}", file_name, message),
        field: Some("file".to_string()),
        context: ErrorContext::new(COMPONENT)
            .with_operation("load")
            .with_metadata("mime", kind.mime())
            .with_suggestion("Check that the file is not corrupted"),
    }
}

/// Parse `bytes` according to `kind`
pub fn load_document(
    kind: DocumentKind,
    bytes: &[u8],
    file_name: &str,
) -> KbChatResult<Vec<LoadedDocument>> {
    let documents = match kind {
        DocumentKind::Pdf => {
            let text = pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| parse_error(kind, file_name, e.to_string()))?;
            vec![LoadedDocument::new(text, file_name)]
        }
        DocumentKind::Docx => {
            let text = extract_docx_text(bytes)
                .map_err(|e| parse_error(kind, file_name, e))?;
            vec![LoadedDocument::new(text, file_name)]
        }
        DocumentKind::Csv => load_csv(&String::from_utf8_lossy(bytes), file_name),
        DocumentKind::PlainText | DocumentKind::Markdown => {
            vec![LoadedDocument::new(
                String::from_utf8_lossy(bytes).into_owned(),
                file_name,
            )]
        }
    };

    Ok(documents
        .into_iter()
        .filter(|d| !d.text.trim().is_empty())
        .collect())
}

/// Paragraph text of `word/document.xml`
fn extract_docx_text(bytes: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let mut xml = Vec::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| e.to_string())?
        .read_to_end(&mut xml)
        .map_err(|e| e.to_string())?;

    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| e.to_string())? {
            Event::Text(t) => text.push_str(&String::from_utf8_lossy(&t)),
            Event::GeneralRef(r) => {
                let name = String::from_utf8_lossy(&r);
                if let Some(resolved) = resolve_reference(&name) {
                    text.push_str(&resolved);
                }
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"w:p" => text.push('\n'),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

/// Predefined XML entities and numeric character references
fn resolve_reference(name: &str) -> Option<String> {
    if let Some(code) = name.strip_prefix('#') {
        let value = match code.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => code.parse().ok()?,
        };
        return char::from_u32(value).map(String::from);
    }
    resolve_predefined_entity(name).map(str::to_string)
}

/// One document per data row, each field rendered as `header: value`
fn load_csv(content: &str, file_name: &str) -> Vec<LoadedDocument> {
    let mut rows = parse_csv(content).into_iter();
    let Some(headers) = rows.next() else {
        return Vec::new();
    };

    rows.enumerate()
        .filter(|(_, row)| row.iter().any(|field| !field.trim().is_empty()))
        .map(|(line, row)| {
            let text = headers
                .iter()
                .zip(row.iter())
                .map(|(header, value)| format!("{}: {}", header.trim(), value.trim()))
                .collect::<Vec<_>>()
                .join("\n");
            let mut document = LoadedDocument::new(text, file_name);
            document
                .metadata
                .insert("line".to_string(), (line + 1).to_string());
            document
        })
        .collect()
}

/// Minimal RFC 4180 reader: quoted fields, escaped quotes, CRLF or LF
fn parse_csv(content: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(
                "word/document.xml",
                zip::write::SimpleFileOptions::default()
                    .compression_method(zip::CompressionMethod::Stored),
            )
            .unwrap();
        writer.write_all(xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn mime_whitelist() {
        assert_eq!(
            DocumentKind::from_mime("application/pdf").unwrap(),
            DocumentKind::Pdf
        );
        assert_eq!(
            DocumentKind::from_mime("text/plain; charset=utf-8").unwrap(),
            DocumentKind::PlainText
        );
        assert_eq!(DocumentKind::from_mime(DOCX_MIME).unwrap(), DocumentKind::Docx);

        let err = DocumentKind::from_mime("image/png").unwrap_err();
        assert!(matches!(err, KbChatError::Validation { .. }));
    }

    #[test]
    fn plain_text_is_loaded_verbatim() {
        let docs = load_document(DocumentKind::PlainText, b"Open 9-5", "hours.txt").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "Open 9-5");
        assert_eq!(docs[0].metadata["source"], "hours.txt");
    }

    #[test]
    fn blank_documents_are_dropped() {
        let docs = load_document(DocumentKind::Markdown, b"  \n ", "empty.md").unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn csv_rows_become_documents() {
        let csv = "day,hours\nMonday,\"9-5, closed for lunch\"\r\nSaturday,\"\"\"closed\"\"\"\n";
        let docs = load_document(DocumentKind::Csv, csv.as_bytes(), "hours.csv").unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "day: Monday\nhours: 9-5, closed for lunch");
        assert_eq!(docs[1].text, "day: Saturday\nhours: \"closed\"");
        assert_eq!(docs[1].metadata["line"], "2");
    }

    #[test]
    fn docx_paragraphs_are_extracted() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Opening hours</w:t></w:r></w:p><w:p><w:r><w:t>Monday</w:t><w:tab/><w:t>9-5</w:t></w:r></w:p></w:body></w:document>"#;

        let docs = load_document(DocumentKind::Docx, &docx_bytes(xml), "hours.docx").unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.contains("Opening hours\n"));
        assert!(docs[0].text.contains("Monday\t9-5"));
    }

    #[test]
    fn docx_entity_references_are_resolved() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>Tom &amp; Jerry &lt;support&gt; &#169; &#x263A;</w:t></w:r></w:p></w:body></w:document>"#;

        let docs = load_document(DocumentKind::Docx, &docx_bytes(xml), "team.docx").unwrap();
        assert_eq!(docs[0].text, "Tom & Jerry <support> \u{a9} \u{263a}\n");
    }

    #[test]
    fn references_resolve_to_characters() {
        assert_eq!(resolve_reference("amp").as_deref(), Some("&"));
        assert_eq!(resolve_reference("quot").as_deref(), Some("\""));
        assert_eq!(resolve_reference("#65").as_deref(), Some("A"));
        assert_eq!(resolve_reference("#x41").as_deref(), Some("A"));
        assert_eq!(resolve_reference("nbsp"), None);
        assert_eq!(resolve_reference("#xZZ"), None);
    }

    #[test]
    fn corrupt_docx_is_a_validation_error() {
        let err = load_document(DocumentKind::Docx, b"not a zip", "bad.docx").unwrap_err();
        assert!(matches!(err, KbChatError::Validation { .. }));
    }
}
