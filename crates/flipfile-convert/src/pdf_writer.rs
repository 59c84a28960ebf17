//! Plain-text PDF rendering on lopdf.
//!
//! Renders paragraphs of text into US Letter pages with a built-in Helvetica
//! font. No shaping or font embedding; characters outside Latin-1 are
//! replaced. Good enough for the word-to-pdf route, which carries extracted
//! document text rather than layout.

use crate::traits::{ConvertError, ConvertResult};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 54.0;
const FONT_SIZE: f32 = 11.0;
const LEADING: f32 = 13.0;
const MAX_CHARS_PER_LINE: usize = 95;
const MAX_LINES_PER_PAGE: usize = 52;

/// Render text lines into a complete PDF, returned as bytes.
pub fn render_text_pdf(lines: &[String]) -> ConvertResult<Vec<u8>> {
    let mut doc = Document::with_version("1.5");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let pages_id = doc.new_object_id();
    let mut page_ids: Vec<Object> = Vec::new();

    for page_lines in paginate(lines) {
        let content = page_content(&page_lines);
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content
                .encode()
                .map_err(|e| ConvertError::Backend(format!("Content encode failed: {}", e)))?,
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        page_ids.push(page_id.into());
    }

    let page_count = page_ids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids,
            "Count" => page_count as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ConvertError::Backend(format!("PDF serialization failed: {}", e)))?;
    Ok(out)
}

/// Count pages in a PDF on disk, rejecting unreadable or empty documents.
pub fn page_count(path: &Path) -> ConvertResult<usize> {
    let doc = Document::load(path)
        .map_err(|e| ConvertError::Unreadable(format!("Not a readable PDF: {}", e)))?;
    let count = doc.get_pages().len();
    if count == 0 {
        return Err(ConvertError::Unreadable("PDF contains no pages".to_string()));
    }
    Ok(count)
}

/// Wrap and split lines into pages.
fn paginate(lines: &[String]) -> Vec<Vec<String>> {
    let mut wrapped = Vec::new();
    for line in lines {
        if line.is_empty() {
            wrapped.push(String::new());
            continue;
        }
        for chunk in wrap_line(line) {
            wrapped.push(chunk);
        }
    }
    if wrapped.is_empty() {
        wrapped.push(String::new());
    }

    wrapped
        .chunks(MAX_LINES_PER_PAGE)
        .map(|c| c.to_vec())
        .collect()
}

/// Greedy word wrap at the line budget; oversized words are split hard.
fn wrap_line(line: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= MAX_CHARS_PER_LINE {
            current.push(' ');
            current.push_str(word);
        } else {
            out.push(std::mem::take(&mut current));
            current = word.to_string();
        }

        while current.chars().count() > MAX_CHARS_PER_LINE {
            let head: String = current.chars().take(MAX_CHARS_PER_LINE).collect();
            let tail: String = current.chars().skip(MAX_CHARS_PER_LINE).collect();
            out.push(head);
            current = tail;
        }
    }

    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

fn page_content(lines: &[String]) -> Content {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
        Operation::new("TL", vec![LEADING.into()]),
        Operation::new(
            "Td",
            vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()],
        ),
    ];

    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            operations.push(Operation::new("T*", vec![]));
        }
        if !line.is_empty() {
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(to_winansi(line))],
            ));
        }
    }

    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}

/// Map text to WinAnsi bytes, substituting anything outside Latin-1.
fn to_winansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            let code = c as u32;
            if code < 256 {
                code as u8
            } else {
                b'?'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_render_produces_valid_pdf() {
        let lines = vec!["Hello".to_string(), "World".to_string()];
        let bytes = render_text_pdf(&lines).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_long_text_spills_onto_second_page() {
        let lines: Vec<String> = (0..MAX_LINES_PER_PAGE + 5)
            .map(|i| format!("line {}", i))
            .collect();
        let bytes = render_text_pdf(&lines).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn test_empty_input_still_yields_one_page() {
        let bytes = render_text_pdf(&[]).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_wrap_line_splits_oversized_word() {
        let long = "x".repeat(MAX_CHARS_PER_LINE * 2 + 10);
        let chunks = wrap_line(&long);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= MAX_CHARS_PER_LINE));
    }

    #[test]
    fn test_non_latin_text_is_substituted_not_dropped() {
        let bytes = to_winansi("héllo — 世界");
        assert_eq!(bytes.len(), "héllo — 世界".chars().count());
        assert!(bytes.contains(&b'?'));
    }

    #[test]
    fn test_page_count_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"this is not a pdf").unwrap();

        let err = page_count(&path).unwrap_err();
        assert!(matches!(err, ConvertError::Unreadable(_)));
    }

    #[test]
    fn test_page_count_on_rendered_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.pdf");
        let bytes = render_text_pdf(&["only page".to_string()]).unwrap();
        std::fs::write(&path, bytes).unwrap();

        assert_eq!(page_count(&path).unwrap(), 1);
    }
}
