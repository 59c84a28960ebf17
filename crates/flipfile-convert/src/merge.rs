//! Multi-PDF merge driver.
//!
//! Loads every input with lopdf, renumbers object ids into one shared space,
//! and stitches the page trees together. Output page order is upload order;
//! pages within a document keep their original order. Any unreadable or
//! empty input fails the whole merge before objects are combined.

use crate::traits::{ConversionDriver, ConversionOutput, ConvertError, ConvertResult};
use async_trait::async_trait;
use flipfile_core::ConversionKind;
use lopdf::{dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct MergePdfDriver;

#[async_trait]
impl ConversionDriver for MergePdfDriver {
    fn kind(&self) -> ConversionKind {
        ConversionKind::MergePdf
    }

    async fn convert(
        &self,
        inputs: &[PathBuf],
        _workdir: &Path,
    ) -> ConvertResult<ConversionOutput> {
        if inputs.len() < 2 {
            return Err(ConvertError::Unreadable(
                "Merge requires at least two input files".to_string(),
            ));
        }

        let paths = inputs.to_vec();
        let bytes = tokio::task::spawn_blocking(move || merge_documents(&paths))
            .await
            .map_err(|e| ConvertError::Backend(format!("Merge task panicked: {}", e)))??;

        Ok(ConversionOutput::Document(bytes))
    }
}

fn merge_documents(paths: &[PathBuf]) -> ConvertResult<Vec<u8>> {
    let mut max_id = 1;
    // Pages in final order; objects keyed by their renumbered ids.
    let mut ordered_pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut all_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for (index, path) in paths.iter().enumerate() {
        let mut doc = Document::load(path).map_err(|e| {
            ConvertError::Unreadable(format!("File {} is not a readable PDF: {}", index + 1, e))
        })?;

        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(ConvertError::Unreadable(format!(
                "File {} contains no pages",
                index + 1
            )));
        }
        debug!(input = index + 1, pages = pages.len(), "Loaded merge input");

        // get_pages is keyed by page number, so iteration is page order.
        for (_, object_id) in pages {
            let mut page_dict = doc
                .get_object(object_id)
                .and_then(Object::as_dict)
                .map_err(|e| {
                    ConvertError::Backend(format!("Missing page object in input: {}", e))
                })?
                .clone();
            // The source page tree is discarded below, so anything a page
            // inherits from its ancestors must be materialized now.
            copy_inherited_attributes(&doc, &mut page_dict);
            ordered_pages.push((object_id, Object::Dictionary(page_dict)));
        }

        all_objects.extend(doc.objects);
    }

    let mut merged = Document::with_version("1.5");

    let mut pages_dict = None;
    for (object_id, object) in all_objects {
        match object.type_name().unwrap_or("") {
            "Catalog" | "Outlines" => {
                // Rebuilt from scratch below.
            }
            "Pages" => {
                // Keep the first Pages dictionary as the base node.
                if pages_dict.is_none() {
                    if let Ok(dict) = object.as_dict() {
                        pages_dict = Some((object_id, dict.clone()));
                    }
                }
            }
            "Page" => {
                // Re-inserted in order below.
            }
            _ => {
                merged.objects.insert(object_id, object);
            }
        }
    }

    let (pages_id, mut pages_dict) = pages_dict.ok_or_else(|| {
        ConvertError::Unreadable("No page tree found in merge inputs".to_string())
    })?;

    for (object_id, object) in &ordered_pages {
        if let Ok(dict) = object.as_dict() {
            let mut dict = dict.clone();
            dict.set("Parent", pages_id);
            merged
                .objects
                .insert(*object_id, Object::Dictionary(dict));
        }
    }

    pages_dict.set("Count", ordered_pages.len() as i64);
    pages_dict.set(
        "Kids",
        ordered_pages
            .iter()
            .map(|(id, _)| Object::Reference(*id))
            .collect::<Vec<_>>(),
    );
    pages_dict.remove(b"Parent");
    merged.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    merged.max_id = merged.objects.keys().map(|id| id.0).max().unwrap_or(max_id);
    merged.renumber_objects();
    merged.compress();

    let mut out = Vec::new();
    merged
        .save_to(&mut out)
        .map_err(|e| ConvertError::Backend(format!("Merged PDF serialization failed: {}", e)))?;
    Ok(out)
}

/// Page attributes that may live on a page-tree ancestor instead of the
/// page itself.
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Pull inheritable attributes down onto the page dictionary by walking its
/// Parent chain. Values already set on the page win. The depth cap guards
/// against cyclic Parent references in damaged files.
fn copy_inherited_attributes(doc: &Document, page_dict: &mut lopdf::Dictionary) {
    for key in INHERITABLE_PAGE_KEYS {
        if page_dict.has(key) {
            continue;
        }
        let mut ancestor = page_dict.get(b"Parent").and_then(Object::as_reference).ok();
        for _ in 0..32 {
            let Some(id) = ancestor else { break };
            let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else {
                break;
            };
            if let Ok(value) = dict.get(key) {
                page_dict.set(key, value.clone());
                break;
            }
            ancestor = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }
}
