//! PDF outline (bookmark) generation built on top of `lopdf`.
//!
//! The outline starts with an "Overview" entry for the cover page followed by one entry per
//! operation section, each pointing at the page the section starts on.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};
use thiserror::Error;

use crate::model::Section;

const OVERVIEW_TITLE: &str = "Overview";

/// Errors that can occur while embedding bookmarks into a rendered PDF document.
#[derive(Debug, Error)]
pub enum BookmarkError {
    #[error("Failed to parse PDF bytes: {0}")]
    Parse(#[from] lopdf::Error),

    #[error("Failed to write PDF bytes: {0}")]
    Write(#[from] std::io::Error),

    #[error("PDF catalog entry is missing or not a dictionary")]
    InvalidCatalog,

    #[error("Section '{section}' refers to missing page {page}")]
    MissingPage { section: String, page: usize },
}

struct OutlineEntry {
    object_id: ObjectId,
    page_ref: ObjectId,
    title: String,
}

/// Adds a flat outline mapping the cover and every section to its first page.
///
/// Sections without a recorded page are skipped.
pub fn apply_section_bookmarks(
    pdf_bytes: &[u8],
    sections: &[Section],
    section_pages: &[Option<usize>],
) -> Result<Vec<u8>, BookmarkError> {
    let mut document = Document::load_mem(pdf_bytes)?;
    let pages = document.get_pages();

    let targets = std::iter::once((OVERVIEW_TITLE, Some(1))).chain(
        sections
            .iter()
            .zip(section_pages.iter().copied())
            .map(|(section, page)| (section.title(), page)),
    );

    let mut entries = Vec::new();
    for (title, page) in targets {
        let Some(page) = page else {
            continue;
        };
        entries.push(OutlineEntry {
            object_id: document.new_object_id(),
            page_ref: page_reference(&pages, title, page)?,
            title: title.to_owned(),
        });
    }

    let outlines_id = document.new_object_id();
    for (index, entry) in entries.iter().enumerate() {
        let mut item = Dictionary::new();
        item.set("Title", Object::string_literal(entry.title.as_str()));
        item.set(
            "Dest",
            Object::Array(vec![
                Object::Reference(entry.page_ref),
                Object::Name(b"Fit".to_vec()),
            ]),
        );
        item.set("Parent", Object::Reference(outlines_id));
        if let Some(previous) = index.checked_sub(1).and_then(|i| entries.get(i)) {
            item.set("Prev", Object::Reference(previous.object_id));
        }
        if let Some(next) = entries.get(index + 1) {
            item.set("Next", Object::Reference(next.object_id));
        }
        document
            .objects
            .insert(entry.object_id, Object::Dictionary(item));
    }

    let mut root = Dictionary::new();
    root.set("Type", Object::Name(b"Outlines".to_vec()));
    root.set("Count", Object::Integer(entries.len() as i64));
    if let (Some(first), Some(last)) = (entries.first(), entries.last()) {
        root.set("First", Object::Reference(first.object_id));
        root.set("Last", Object::Reference(last.object_id));
    }
    document.objects.insert(outlines_id, Object::Dictionary(root));

    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| BookmarkError::InvalidCatalog)?;
    let catalog = document
        .objects
        .get_mut(&catalog_id)
        .and_then(|object| object.as_dict_mut().ok())
        .ok_or(BookmarkError::InvalidCatalog)?;
    catalog.set("Outlines", Object::Reference(outlines_id));
    catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));

    let mut buffer = Vec::new();
    document.save_to(&mut buffer)?;
    Ok(buffer)
}

fn page_reference(
    pages: &BTreeMap<u32, ObjectId>,
    title: &str,
    page: usize,
) -> Result<ObjectId, BookmarkError> {
    u32::try_from(page)
        .ok()
        .and_then(|number| pages.get(&number).copied())
        .ok_or_else(|| BookmarkError::MissingPage {
            section: title.to_owned(),
            page,
        })
}
