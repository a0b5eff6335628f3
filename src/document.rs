use anyhow::{Context, Result, anyhow};
use lopdf::Document;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::ocr::{self, OcrOptions};
use crate::text::normalize_text;

pub const PDF_EXTENSION: &str = "pdf";
const UNIT_SEPARATOR: char = '\u{000C}';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitSource {
    PdfText,
    Ocr,
    Plain,
}

/// One page (or plain-text unit) of normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// 1-based.
    pub page: usize,
    pub text: String,
    pub source: UnitSource,
}

impl TextUnit {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

pub fn joined_text(units: &[TextUnit]) -> String {
    units
        .iter()
        .map(|unit| unit.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits plain text on form feeds, the separator `pdftotext` emits
/// between pages.
pub fn split_plain_units(text: &str) -> Vec<TextUnit> {
    text.split(UNIT_SEPARATOR)
        .enumerate()
        .map(|(idx, raw)| TextUnit {
            page: idx + 1,
            text: normalize_text(raw),
            source: UnitSource::Plain,
        })
        .collect()
}

pub fn load_units(path: &Path, ocr: Option<&OcrOptions>) -> Result<Vec<TextUnit>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read input: {}", path.display()))?;
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(PDF_EXTENSION))
        .unwrap_or(false)
        || bytes.starts_with(b"%PDF-");
    if is_pdf {
        return load_pdf_units(&bytes, ocr);
    }
    let text = String::from_utf8(bytes)
        .map_err(|_| anyhow!("input is neither a pdf nor UTF-8 text: {}", path.display()))?;
    Ok(split_plain_units(&text))
}

/// Extracts normalized text per page. A page whose text cannot be extracted
/// counts as empty; near-empty pages are OCR'd when `ocr` is given.
pub fn load_pdf_units(bytes: &[u8], ocr: Option<&OcrOptions>) -> Result<Vec<TextUnit>> {
    let document = Document::load_mem(bytes).with_context(|| "failed to parse pdf")?;
    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(anyhow!("no pages found in pdf"));
    }
    info!(pages = pages.len(), "extracting pdf text");

    let mut units = Vec::with_capacity(pages.len());
    for (idx, page_number) in pages.keys().enumerate() {
        let raw = match document.extract_text(&[*page_number]) {
            Ok(text) => text,
            Err(err) => {
                warn!(page = idx + 1, "text extraction failed: {}", err);
                String::new()
            }
        };
        let mut unit = TextUnit {
            page: idx + 1,
            text: normalize_text(&raw),
            source: UnitSource::PdfText,
        };
        if let Some(options) = ocr
            && unit.char_len() < options.min_chars
        {
            apply_ocr(&mut unit, bytes, options);
        }
        units.push(unit);
    }
    Ok(units)
}

fn apply_ocr(unit: &mut TextUnit, pdf_bytes: &[u8], options: &OcrOptions) {
    debug!(page = unit.page, chars = unit.char_len(), "page below ocr threshold");
    match ocr::ocr_pdf_page(pdf_bytes, unit.page, options) {
        Ok(text) => {
            let normalized = normalize_text(&text);
            if normalized.chars().count() > unit.char_len() {
                unit.text = normalized;
                unit.source = UnitSource::Ocr;
            }
        }
        Err(err) => warn!(page = unit.page, "ocr failed: {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};
    use tempfile::tempdir;

    /// A PDF whose pages carry `texts` in order; an empty string gives a
    /// page with an empty content stream.
    fn pdf_with_pages(texts: &[&str]) -> Vec<u8> {
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
        let media_box: Vec<Object> = [0, 0, 612, 792].into_iter().map(Object::Integer).collect();
        let mut kids: Vec<Object> = Vec::new();
        for text in texts {
            let operations = if text.is_empty() {
                Vec::new()
            } else {
                vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ]
            };
            let content = Content { operations }.encode().expect("encode content");
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => media_box.clone(),
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
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save pdf");
        bytes
    }

    #[test]
    fn plain_text_splits_on_form_feed() {
        let units = split_plain_units("第一頁  CT\u{c}\u{c}第三頁（MRI）");
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].text, "第一頁 CT");
        assert_eq!(units[1].text, "");
        assert_eq!(units[2].page, 3);
        assert_eq!(units[2].text, "第三頁(MRI)");
        assert!(units.iter().all(|unit| unit.source == UnitSource::Plain));
    }

    #[test]
    fn text_files_load_as_plain_units() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("slides.txt");
        std::fs::write(&path, "CT 電腦斷層").expect("write");
        let units = load_units(&path, None).expect("load");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].text, "CT 電腦斷層");
    }

    #[test]
    fn broken_pdf_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 not really").expect("write");
        assert!(load_units(&path, None).is_err());
    }

    #[test]
    fn pdf_pages_are_numbered_from_one() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("slides.pdf");
        std::fs::write(&path, pdf_with_pages(&["CT scan", ""])).expect("write");

        let units = load_units(&path, None).expect("load");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].page, 1);
        assert!(units[0].text.contains("CT scan"), "{:?}", units[0].text);
        assert_eq!(units[1].page, 2);
        assert_eq!(units[1].text.trim(), "");
        assert!(units.iter().all(|unit| unit.source == UnitSource::PdfText));
    }

    #[test]
    fn pages_at_or_above_min_chars_skip_ocr() {
        let bytes = pdf_with_pages(&["", "CT scan"]);
        let options = OcrOptions {
            languages: "eng".to_string(),
            min_chars: 0,
            dpi: 150,
        };
        let units = load_pdf_units(&bytes, Some(&options)).expect("load");
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text.trim(), "");
        assert!(units[1].text.contains("CT scan"));
        assert!(units.iter().all(|unit| unit.source == UnitSource::PdfText));
    }
}
