//! Copy one page's object subgraph into another document.

use crate::document::{dict_subtype, PdfDocument};
use crate::error::{PdfGraftError, Result};
use crate::graft::GraftMap;
use crate::page_tree;
use crate::report::{Warning, Warnings};
use lopdf::{Dictionary, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Keys copied from the source page, looked up through the Parent chain.
pub const PAGE_KEYS: [&[u8]; 9] = [
    b"Contents",
    b"Resources",
    b"MediaBox",
    b"CropBox",
    b"BleedBox",
    b"TrimBox",
    b"ArtBox",
    b"Rotate",
    b"UserUnit",
];

/// Rotation applied to copied pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<i64>", into = "Option<i64>")]
pub enum Rotation {
    #[default]
    NoChange,
    Degrees(i64),
}

impl From<Option<i64>> for Rotation {
    fn from(value: Option<i64>) -> Self {
        match value {
            Some(deg) => Rotation::Degrees(deg),
            None => Rotation::NoChange,
        }
    }
}

impl From<Rotation> for Option<i64> {
    fn from(value: Rotation) -> Self {
        match value {
            Rotation::NoChange => None,
            Rotation::Degrees(deg) => Some(deg),
        }
    }
}

impl Rotation {
    pub fn validate(self) -> Result<Self> {
        match self {
            Rotation::Degrees(deg) if deg % 90 != 0 => Err(PdfGraftError::InvalidRotation(deg)),
            Rotation::Degrees(deg) => Ok(Rotation::Degrees(deg.rem_euclid(360))),
            Rotation::NoChange => Ok(self),
        }
    }
}

/// Annotations of `page` worth carrying over, as owned dictionaries.
///
/// Popups, replies (`/IRT`) and widgets are always left out; links only when
/// `keep_links` is false. The second list holds the skipped widgets.
pub(crate) fn retained_annotations(
    doc: &PdfDocument,
    page: ObjectId,
    keep_links: bool,
) -> Result<(Vec<(Option<ObjectId>, Dictionary)>, Vec<ObjectId>)> {
    let mut kept = Vec::new();
    let mut widgets = Vec::new();
    let page_dict = doc.dict(page)?;
    let Some(annots) = doc.get_resolved(page_dict, b"Annots") else {
        return Ok((kept, widgets));
    };
    let Ok(annots) = annots.as_array() else {
        return Ok((kept, widgets));
    };

    for entry in annots {
        let id = entry.as_reference().ok();
        let Some(annot) = doc.resolve_dict(entry) else {
            debug!(?id, "annotation entry is not a dictionary");
            continue;
        };
        if annot.has(b"IRT") {
            continue;
        }
        match dict_subtype(annot) {
            Some(b"Popup") => continue,
            Some(b"Link") if !keep_links => continue,
            Some(b"Widget") => {
                if let Some(id) = id {
                    widgets.push(id);
                }
                continue;
            }
            _ => {}
        }
        kept.push((id, annot.clone()));
    }
    Ok((kept, widgets))
}

/// Drop the references that would drag objects outside the page along.
pub(crate) fn strip_back_references(mut annot: Dictionary) -> Dictionary {
    annot.remove(b"Popup");
    annot.remove(b"Parent");
    annot.remove(b"P");
    annot
}

/// Copy page `src_page_no` of `src` into `dst` at position `insert_pos`.
#[allow(clippy::too_many_arguments)]
pub fn copy_page(
    src: &PdfDocument,
    src_page_no: usize,
    dst: &mut PdfDocument,
    insert_pos: usize,
    rotate: Rotation,
    copy_annots: bool,
    graft_map: &mut GraftMap,
    warnings: &mut Warnings,
) -> Result<ObjectId> {
    if src.is_same_document(dst) {
        return Err(PdfGraftError::SameDocument);
    }
    let src_page = src.lookup_page(src_page_no)?.page;

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    for key in PAGE_KEYS {
        if let Some(value) = src.inherited_attr(src_page, key)? {
            let copied = graft_map.graft_object(src, dst, &value)?;
            page.set(key, copied);
        }
    }

    let new_page = dst.reserve_object_id();

    if copy_annots {
        let (annots, widgets) = retained_annotations(src, src_page, false)?;
        for annot in widgets {
            warnings.push(Warning::SkippedWidget {
                page: src_page_no,
                annot,
            });
        }
        let mut new_annots = Vec::with_capacity(annots.len());
        for (id, annot) in annots {
            let stripped = Object::Dictionary(strip_back_references(annot));
            let copied_id = match id {
                Some(id) => graft_map.graft_replacement(src, dst, id, &stripped)?,
                None => {
                    let copied = graft_map.graft_object(src, dst, &stripped)?;
                    dst.add_object(copied)
                }
            };
            if let Ok(copied) = dst.dict_mut(copied_id) {
                copied.set("P", Object::Reference(new_page));
            }
            new_annots.push(Object::Reference(copied_id));
        }
        if !new_annots.is_empty() {
            page.set("Annots", Object::Array(new_annots));
        }
    }

    if let Rotation::Degrees(deg) = rotate {
        page.set("Rotate", Object::Integer(deg));
    }

    dst.put_object(new_page, page);
    page_tree::insert_page(dst, insert_pos, new_page)?;
    debug!(src_page_no, insert_pos, ?new_page, "grafted page");
    Ok(new_page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        add_annotation, build_document, content_of, page_labels,
    };

    fn graft_first_page(src: &PdfDocument, copy_annots: bool) -> (PdfDocument, ObjectId, Warnings) {
        let mut dst = PdfDocument::new();
        let mut map = GraftMap::new(src, &dst);
        let mut warnings = Warnings::new();
        let id = copy_page(
            src,
            0,
            &mut dst,
            0,
            Rotation::NoChange,
            copy_annots,
            &mut map,
            &mut warnings,
        )
        .unwrap();
        (dst, id, warnings)
    }

    #[test]
    fn test_copy_page_carries_content_and_inherited_boxes() {
        let src = build_document(2);
        let (dst, id, _) = graft_first_page(&src, false);
        assert_eq!(dst.page_count().unwrap(), 1);
        assert_eq!(content_of(&dst, id), b"BT /F1 12 Tf 72 720 Td (Page 0) Tj ET");
        let page = dst.dict(id).unwrap();
        // Inherited from the source root, now local
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
        assert!(!page.has(b"Annots"));
    }

    #[test]
    fn test_same_document_rejected() {
        let src = build_document(1);
        let mut dst = src.clone();
        let mut map = GraftMap::new(&src, &dst);
        let result = copy_page(
            &src,
            0,
            &mut dst,
            0,
            Rotation::NoChange,
            true,
            &mut map,
            &mut Warnings::new(),
        );
        assert!(matches!(result, Err(PdfGraftError::SameDocument)));
        assert_eq!(dst.page_count().unwrap(), 1);
    }

    #[test]
    fn test_annotation_filter() {
        let mut src = build_document(1);
        let text = add_annotation(&mut src, 0, "Text", &[]);
        add_annotation(&mut src, 0, "Popup", &[]);
        add_annotation(&mut src, 0, "Link", &[]);
        add_annotation(&mut src, 0, "Text", &[("IRT", Object::Reference(text))]);
        add_annotation(&mut src, 0, "Widget", &[]);

        let (dst, id, warnings) = graft_first_page(&src, true);
        let annots = dst.dict(id).unwrap().get(b"Annots").unwrap().as_array().unwrap().clone();
        assert_eq!(annots.len(), 1);
        let copied = dst.dict(annots[0].as_reference().unwrap()).unwrap();
        assert_eq!(dict_subtype(copied), Some(&b"Text"[..]));
        assert_eq!(copied.get(b"P").unwrap(), &Object::Reference(id));
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings.iter().next(), Some(Warning::SkippedWidget { page: 0, .. })));
    }

    #[test]
    fn test_annotation_back_reference_does_not_pull_source_tree() {
        let mut src = build_document(3);
        let root = src.pages_root_id().unwrap();
        add_annotation(&mut src, 0, "Square", &[("Parent", Object::Reference(root))]);

        let (dst, _, _) = graft_first_page(&src, true);
        // Only the copied page may be a Page object in the destination
        let pages = dst
            .inner()
            .objects
            .values()
            .filter_map(|o| o.as_dict().ok())
            .filter(|d| crate::document::dict_type(d) == Some(&b"Page"[..]))
            .count();
        assert_eq!(pages, 1);
    }

    #[test]
    fn test_rotation_override() {
        let src = build_document(1);
        let mut dst = PdfDocument::new();
        let mut map = GraftMap::new(&src, &dst);
        let id = copy_page(
            &src,
            0,
            &mut dst,
            0,
            Rotation::Degrees(90),
            false,
            &mut map,
            &mut Warnings::new(),
        )
        .unwrap();
        assert_eq!(dst.dict(id).unwrap().get(b"Rotate").unwrap(), &Object::Integer(90));
    }

    #[test]
    fn test_insert_position_is_respected() {
        let src = build_document(3);
        let mut dst = build_document(2);
        let mut map = GraftMap::new(&src, &dst);
        copy_page(
            &src,
            2,
            &mut dst,
            1,
            Rotation::NoChange,
            false,
            &mut map,
            &mut Warnings::new(),
        )
        .unwrap();
        assert_eq!(page_labels(&dst), vec!["Page 0", "Page 2", "Page 1"]);
    }

    #[test]
    fn test_rotation_validation() {
        assert_eq!(Rotation::Degrees(-90).validate().unwrap(), Rotation::Degrees(270));
        assert!(Rotation::Degrees(45).validate().is_err());
        assert_eq!(Rotation::NoChange.validate().unwrap(), Rotation::NoChange);
    }
}
