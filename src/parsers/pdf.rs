//! PDF plain-text extractor.
//!
//! Text is read page by page with `lopdf`. When no page yields text, the
//! whole document goes through `pdf-extract` instead. The text is then cut
//! into chunks of roughly `chunk_size` characters, stored in order under the
//! [`CHUNK_SECTION`] section. Structure is not recovered.

use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use super::{present, ArticleParser, Extraction, FieldError, ParseError, SourceFormat};
use crate::config::default_chunk_size;
use crate::models::ArticleBuilder;
use crate::utils::{chunk_text, compute_uid, normalize_text, NormalizationPolicy};

/// Section name given to every chunk
pub const CHUNK_SECTION: &str = "Article Chunk";

/// Extractor for PDF plain text
#[derive(Debug, Clone)]
pub struct PdfParser {
    chunk_size: usize,
    policy: NormalizationPolicy,
}

impl Default for PdfParser {
    fn default() -> Self {
        Self::new(default_chunk_size(), NormalizationPolicy::default())
    }
}

impl PdfParser {
    pub fn new(chunk_size: usize, policy: NormalizationPolicy) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            policy,
        }
    }

    /// Maximum characters per chunk
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn text(&self, doc: &Document, raw: &[u8]) -> String {
        let mut pages = Vec::new();
        for (number, _) in doc.get_pages() {
            match doc.extract_text(&[number]) {
                Ok(text) => pages.push(text),
                Err(e) => debug!("page {number}: no text ({e})"),
            }
        }

        let text = pages.join("\n");
        if !text.trim().is_empty() {
            return text;
        }

        debug!("no text from page extraction, falling back to pdf-extract");
        match pdf_extract::extract_text_from_mem(raw) {
            Ok(text) => text,
            Err(e) => {
                debug!("pdf-extract failed: {e}");
                String::new()
            }
        }
    }
}

impl ArticleParser for PdfParser {
    fn format(&self) -> SourceFormat {
        SourceFormat::PyPdf
    }

    fn extract(&self, raw: &[u8]) -> Result<Extraction, ParseError> {
        let doc = Document::load_mem(raw)
            .map_err(|e| ParseError::malformed(SourceFormat::PyPdf, e))?;

        let text = self.text(&doc, raw);
        let chunks: Vec<(String, String)> = chunk_text(&text, self.chunk_size)
            .into_iter()
            .map(|chunk| (CHUNK_SECTION.to_string(), chunk))
            .collect();

        let mut builder = ArticleBuilder::new(compute_uid(raw))
            .title(present(info_title(&doc), "title"))
            .section_paragraphs(self.policy.strip_boilerplate(chunks));
        if text.trim().is_empty() {
            builder = builder.warn(
                "section_paragraphs",
                FieldError::Missing("section_paragraphs"),
            );
        }

        Ok(builder.finish().into())
    }
}

/// Title from the document information dictionary
fn info_title(doc: &Document) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let dict: &Dictionary = match info {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        Object::Dictionary(dict) => dict,
        _ => return None,
    };
    let bytes = dict.get(b"Title").ok()?.as_str().ok()?;
    Some(normalize_text(&decode_text_string(bytes)))
}

/// Decode a PDF text string: UTF-16BE with a byte order mark, else single-byte
fn decode_text_string(bytes: &[u8]) -> String {
    match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                .collect()
        }
        None => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};

    fn sample_pdf(title: Option<Object>, lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for line in lines {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            operations.push(Operation::new("Td", vec![0.into(), (-14).into()]));
        }
        operations.push(Operation::new("ET", vec![]));
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        if let Some(title) = title {
            let info_id = doc.add_object(dictionary! { "Title" => title });
            doc.trailer.set("Info", info_id);
        }

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_extracts_chunks_and_title() {
        let raw = sample_pdf(
            Some(Object::string_literal("A Study of Things")),
            &["Hello world from a PDF", "second line of text"],
        );
        let extraction = PdfParser::new(10, NormalizationPolicy::default())
            .extract(&raw)
            .unwrap();
        let article = extraction.article;

        assert_eq!(article.uid, compute_uid(&raw));
        assert_eq!(article.title.as_deref(), Some("A Study of Things"));
        assert!(!article.section_paragraphs.is_empty());
        assert!(article
            .section_paragraphs
            .iter()
            .all(|(section, chunk)| section == CHUNK_SECTION && chunk.chars().count() <= 10));
        let joined: Vec<&str> = article
            .section_paragraphs
            .iter()
            .map(|(_, chunk)| chunk.as_str())
            .collect();
        assert!(joined.join(" ").contains("Hello"));
        assert!(article.authors.is_empty());
        assert_eq!(article.doi, None);
        assert_eq!(article.date, None);
    }

    #[test]
    fn test_missing_info_leaves_title_absent() {
        let raw = sample_pdf(None, &["Body only"]);
        let extraction = PdfParser::default().extract(&raw).unwrap();
        assert_eq!(extraction.article.title, None);
        assert!(extraction.has_warning("title"));
    }

    #[test]
    fn test_utf16_title() {
        let mut title = vec![0xFE, 0xFF];
        for unit in "Über".encode_utf16() {
            title.extend_from_slice(&unit.to_be_bytes());
        }
        assert_eq!(decode_text_string(&title), "Über");
        assert_eq!(decode_text_string(b"Plain"), "Plain");
    }

    #[test]
    fn test_corrupt_input_is_malformed() {
        let err = PdfParser::default()
            .parse(b"%PDF-1.4 this is not really a pdf")
            .unwrap_err();
        assert!(matches!(
            err,
            ParseError::MalformedInput {
                format: SourceFormat::PyPdf,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        assert_eq!(PdfParser::new(0, NormalizationPolicy::default()).chunk_size(), 1);
    }
}
