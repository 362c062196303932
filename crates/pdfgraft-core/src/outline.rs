//! Outline (bookmark) traversal.

use crate::cycle::CycleGuard;
use crate::document::{dict_type, PdfDocument};
use crate::error::Result;
use crate::links::target_page_ref;
use crate::report::{Warning, Warnings};
use lopdf::{Object, ObjectId};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, Serialize)]
pub struct OutlineScan {
    /// Outline item ids, depth first, outline root excluded.
    pub xrefs: Vec<ObjectId>,
    pub warnings: Vec<Warning>,
}

fn reference(dict: &lopdf::Dictionary, key: &[u8]) -> Option<ObjectId> {
    dict.get(key).and_then(Object::as_reference).ok()
}

/// Walk the sibling chain starting at `first`, descending into children.
fn collect_chain(
    doc: &PdfDocument,
    first: ObjectId,
    guard: &mut CycleGuard,
    seen: &mut HashSet<ObjectId>,
    out: &mut Vec<ObjectId>,
    warnings: &mut Warnings,
) {
    let mut on_path = Vec::new();
    let mut current = Some(first);
    while let Some(id) = current {
        // Reached again through another branch; its subtree and siblings are done
        if seen.contains(&id) && !guard.contains(id) {
            break;
        }
        if !guard.enter_or_warn(id, "outline", warnings) {
            break;
        }
        on_path.push(id);
        let Ok(dict) = doc.dict(id) else {
            tracing::debug!(?id, "outline item is not a dictionary");
            break;
        };
        if dict_type(dict) == Some(&b"Outlines"[..]) {
            break;
        }
        seen.insert(id);
        out.push(id);
        if let Some(child) = reference(dict, b"First") {
            collect_chain(doc, child, guard, seen, out, warnings);
        }
        current = reference(dict, b"Next");
    }
    for id in on_path {
        guard.leave(id);
    }
}

impl PdfDocument {
    fn outline_root(&self) -> Option<ObjectId> {
        reference(self.catalog().ok()?, b"Outlines")
    }

    /// Ids of all outline items. Cycles are cut and reported as warnings.
    pub fn outline_xrefs(&self) -> Result<OutlineScan> {
        let mut scan = OutlineScan::default();
        let Some(root) = self.outline_root() else {
            return Ok(scan);
        };
        let mut warnings = Warnings::new();
        let first = self.dict(root).ok().and_then(|d| reference(d, b"First"));
        if let Some(first) = first {
            let mut guard = CycleGuard::new();
            guard.enter(root);
            let mut seen = HashSet::new();
            collect_chain(self, first, &mut guard, &mut seen, &mut scan.xrefs, &mut warnings);
        }
        scan.warnings = warnings.into_vec();
        Ok(scan)
    }
}

/// Remove the destination of every outline item that jumps to one of `pages`.
/// The items themselves stay. Returns how many were changed.
pub(crate) fn neutralize_outline_targets(
    doc: &mut PdfDocument,
    pages: &HashSet<ObjectId>,
    warnings: &mut Warnings,
) -> Result<usize> {
    let scan = doc.outline_xrefs()?;
    for w in scan.warnings {
        warnings.push(w);
    }
    let mut targeted = Vec::new();
    for id in scan.xrefs {
        let dict = doc.dict(id)?;
        if let Some(page) = target_page_ref(doc, dict) {
            if pages.contains(&page) {
                targeted.push(id);
            }
        }
    }
    for &id in &targeted {
        let dict = doc.dict_mut(id)?;
        dict.remove(b"Dest");
        dict.remove(b"A");
    }
    Ok(targeted.len())
}
