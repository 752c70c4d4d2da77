//! PDF to linear text.

use lopdf::Document;
use tracing::{debug, warn};

use crate::error::{ExtractionError, Result};

/// Extract the bill text: one line per page, words joined by single spaces.
///
/// Pages without words are skipped, so an image-only PDF yields `""`.
pub fn extract_text(data: &[u8]) -> Result<String> {
    let doc = Document::load_mem(data).map_err(|e| ExtractionError::pdf(e.to_string()))?;

    let pages = doc.get_pages();
    let mut lines = Vec::with_capacity(pages.len());

    for page_num in pages.keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(content) => {
                let line = join_words(&content);
                if !line.is_empty() {
                    lines.push(line);
                }
            }
            Err(e) => warn!("Skipping page {}: {}", page_num, e),
        }
    }

    debug!("Extracted {} non-empty pages out of {}", lines.len(), pages.len());
    Ok(lines.join("\n"))
}

fn join_words(content: &str) -> String {
    content.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// One page per entry; an empty entry becomes a page with no text operators.
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let operations = if text.is_empty() {
                Vec::new()
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_one_line_per_page_skipping_blank_pages() {
        let pdf = build_pdf(&["ENERGISA   KWH 410,00", "", "Saldo 1,00"]);
        assert_eq!(extract_text(&pdf).unwrap(), "ENERGISA KWH 410,00\nSaldo 1,00");
    }

    #[test]
    fn test_document_without_words_is_empty() {
        assert_eq!(extract_text(&build_pdf(&[""])).unwrap(), "");
        assert_eq!(extract_text(&build_pdf(&["", ""])).unwrap(), "");
    }

    #[test]
    fn test_garbage_is_a_pdf_error() {
        let err = extract_text(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, ExtractionError::Pdf { .. }));
    }

    #[test]
    fn test_join_words_collapses_layout() {
        assert_eq!(
            join_words("  Leitura Anterior:05/08/2025\n\n  Leitura Atual:04/09/2025 \t"),
            "Leitura Anterior:05/08/2025 Leitura Atual:04/09/2025"
        );
        assert_eq!(join_words(" \n\t "), "");
    }
}
