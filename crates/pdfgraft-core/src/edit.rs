//! Page moving, copying and deletion within one document.

use crate::document::{dict_subtype, PdfDocument};
use crate::error::Result;
use crate::links::{prune_named_dests, target_page_ref};
use crate::outline::neutralize_outline_targets;
use crate::page_tree::{delete_page_at, relocate};
use crate::report::{DeleteReport, Warning, Warnings};
use lopdf::{Object, ObjectId};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

impl PdfDocument {
    /// Where `to` sends a page: `-1` is after the last page, anything else
    /// is before page `to`.
    fn target_of(&self, to: i64) -> Result<(usize, bool)> {
        if to == -1 {
            Ok((self.normalize_page(-1)?, false))
        } else {
            Ok((self.normalize_page(to)?, true))
        }
    }

    /// Move page `pno` before page `to`, or to the end when `to == -1`.
    pub fn move_page(&mut self, pno: i64, to: i64) -> Result<()> {
        let page_no = self.normalize_page(pno)?;
        let (target, before) = self.target_of(to)?;
        relocate(self, page_no, target, before, false)?;
        Ok(())
    }

    /// Insert a duplicate of page `pno` before page `to`, or at the end when
    /// `to == -1`. Returns the duplicate's object id.
    pub fn copy_page(&mut self, pno: i64, to: i64) -> Result<ObjectId> {
        let page_no = self.normalize_page(pno)?;
        let (target, before) = self.target_of(to)?;
        relocate(self, page_no, target, before, true)
    }

    /// Delete one page. Structural errors are returned.
    pub fn delete_page(&mut self, pno: i64) -> Result<DeleteReport> {
        let page_no = self.normalize_page(pno)?;
        self.remove_pages(BTreeSet::from([page_no]), false)
    }

    /// Delete several pages. Numbers refer to the document before the call
    /// and may repeat or be negative. A page whose removal hits a structural
    /// error is skipped with a warning.
    pub fn delete_pages(&mut self, pages: &[i64]) -> Result<DeleteReport> {
        let mut set = BTreeSet::new();
        for &pno in pages {
            set.insert(self.normalize_page(pno)?);
        }
        self.remove_pages(set, true)
    }

    fn remove_pages(&mut self, pages: BTreeSet<usize>, best_effort: bool) -> Result<DeleteReport> {
        let mut report = DeleteReport::default();
        let mut warnings = Warnings::new();
        let mut removed = HashSet::new();

        // Highest first, so lower numbers stay valid
        for &page_no in pages.iter().rev() {
            match delete_page_at(self, page_no) {
                Ok(id) => {
                    removed.insert(id);
                    report.deleted.push(page_no);
                }
                Err(e) if best_effort && e.is_page_local() => {
                    warnings.push(Warning::PageSkipped {
                        page: page_no,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        report.deleted.reverse();

        if !removed.is_empty() {
            for page in self.page_ids()? {
                report.links_removed += prune_links_to(self, page, &removed)?;
            }
            report.outline_items_neutralized =
                neutralize_outline_targets(self, &removed, &mut warnings)?;
            // Last: the passes above resolve names through these entries
            report.named_dests_removed = prune_named_dests(self, &removed)?;
        }

        info!(
            deleted = report.deleted.len(),
            links = report.links_removed,
            outline = report.outline_items_neutralized,
            named_dests = report.named_dests_removed,
            "pages deleted"
        );
        report.warnings = warnings.into_vec();
        Ok(report)
    }
}

/// Drop link annotations on `page` that jump to one of `targets`.
fn prune_links_to(doc: &mut PdfDocument, page: ObjectId, targets: &HashSet<ObjectId>) -> Result<usize> {
    let page_dict = doc.dict(page)?;
    let indirect = page_dict.get(b"Annots").and_then(Object::as_reference).ok();
    let Some(Object::Array(annots)) = doc.get_resolved(page_dict, b"Annots") else {
        return Ok(0);
    };

    let kept: Vec<Object> = annots
        .iter()
        .filter(|entry| match doc.resolve_dict(entry) {
            Some(annot) if dict_subtype(annot) == Some(&b"Link"[..]) => {
                !target_page_ref(doc, annot).is_some_and(|t| targets.contains(&t))
            }
            _ => true,
        })
        .cloned()
        .collect();
    let removed = annots.len() - kept.len();
    if removed == 0 {
        return Ok(0);
    }

    match indirect {
        Some(id) => *doc.object_mut(id)? = Object::Array(kept),
        None => doc.dict_mut(page)?.set("Annots", Object::Array(kept)),
    }
    debug!(?page, removed, "pruned links to deleted pages");
    Ok(removed)
}
