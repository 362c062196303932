//! Page tree editing.
//!
//! Internal nodes carry `/Kids` and a cached `/Count` of leaf pages beneath
//! them. This module is the only place that writes `/Count`, and every write
//! keeps `Count == leaves in subtree` for each ancestor it touches.

use crate::cycle::CycleGuard;
use crate::document::{dict_type, PdfDocument, INHERITABLE_KEYS};
use crate::error::{PdfGraftError, Result};
use lopdf::{Dictionary, Object, ObjectId};
use tracing::debug;

/// Where a leaf sits: the page, the node whose Kids hold it, and its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLoc {
    pub page: ObjectId,
    pub parent: ObjectId,
    pub index: usize,
    /// `parent` and every node above it, ending at the root, as reached
    /// through `/Kids`. `/Parent` entries are not consulted.
    pub ancestors: Vec<ObjectId>,
}

fn is_internal(dict: &Dictionary) -> bool {
    match dict_type(dict) {
        Some(b"Pages") => true,
        Some(b"Page") => false,
        _ => dict.has(b"Kids"),
    }
}

impl PdfDocument {
    /// Number of pages according to the root's `/Count`.
    pub fn page_count(&self) -> Result<usize> {
        let root = self.pages_root_id()?;
        node_count(self, root)
    }

    /// Python-style index normalization: `-1` is the last page.
    pub fn normalize_page(&self, pno: i64) -> Result<usize> {
        let count = self.page_count()?;
        let idx = if pno < 0 { pno + count as i64 } else { pno };
        if idx < 0 || idx >= count as i64 {
            return Err(PdfGraftError::BadPageNumber { page: pno, count });
        }
        Ok(idx as usize)
    }

    /// Leaf at position `needle`, found by skipping subtrees via `/Count`.
    pub fn lookup_page(&self, needle: usize) -> Result<PageLoc> {
        let count = self.page_count()?;
        if needle >= count {
            return Err(PdfGraftError::BadPageNumber {
                page: needle as i64,
                count,
            });
        }

        let mut node = self.pages_root_id()?;
        let mut guard = CycleGuard::new();
        guard.enter(node);
        let mut path = vec![node];
        let mut skip = needle;

        'descend: loop {
            let kids = kids_of(self, node)?;
            for (index, kid) in kids.iter().enumerate() {
                let kid_id = kid_ref(kid, node)?;
                let kid_dict = self.dict(kid_id)?;
                if is_internal(kid_dict) {
                    let c = node_count(self, kid_id)?;
                    if skip < c {
                        if !guard.enter(kid_id) {
                            return Err(PdfGraftError::MalformedPageTree(format!(
                                "Kids cycle through {:?}",
                                kid_id
                            )));
                        }
                        node = kid_id;
                        path.push(kid_id);
                        continue 'descend;
                    }
                    skip -= c;
                } else {
                    if skip == 0 {
                        path.reverse();
                        return Ok(PageLoc {
                            page: kid_id,
                            parent: node,
                            index,
                            ancestors: path,
                        });
                    }
                    skip -= 1;
                }
            }
            return Err(PdfGraftError::MalformedPageTree(format!(
                "page {} not found under {:?}: Count disagrees with Kids",
                needle, node
            )));
        }
    }

    /// Object ids of all leaf pages in document order.
    pub fn page_ids(&self) -> Result<Vec<ObjectId>> {
        let root = self.pages_root_id()?;
        let mut out = Vec::new();
        let mut guard = CycleGuard::new();
        collect_leaves(self, root, &mut guard, &mut out)?;
        Ok(out)
    }

    /// Recount every subtree and fail on the first `/Count` that disagrees.
    pub fn validate_page_tree(&self) -> Result<usize> {
        let root = self.pages_root_id()?;
        let mut guard = CycleGuard::new();
        validate_node(self, root, &mut guard)
    }
}

fn kid_ref(kid: &Object, parent: ObjectId) -> Result<ObjectId> {
    kid.as_reference().map_err(|_| {
        PdfGraftError::MalformedPageTree(format!("non-reference entry in Kids of {:?}", parent))
    })
}

fn kids_of(doc: &PdfDocument, node: ObjectId) -> Result<Vec<Object>> {
    let dict = doc.dict(node)?;
    match dict.get(b"Kids") {
        Ok(kids) => Ok(doc.resolve(kids)?.as_array()?.clone()),
        Err(_) => Err(PdfGraftError::MalformedPageTree(format!(
            "page tree node {:?} has no Kids",
            node
        ))),
    }
}

fn kids_mut(doc: &mut PdfDocument, node: ObjectId) -> Result<&mut Vec<Object>> {
    let indirect = match doc.dict(node)?.get(b"Kids") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(_) => None,
        Err(_) => {
            return Err(PdfGraftError::MalformedPageTree(format!(
                "page tree node {:?} has no Kids",
                node
            )))
        }
    };
    let kids = match indirect {
        Some(id) => doc.object_mut(id)?,
        None => doc.dict_mut(node)?.get_mut(b"Kids")?,
    };
    Ok(kids.as_array_mut()?)
}

fn node_count(doc: &PdfDocument, node: ObjectId) -> Result<usize> {
    let dict = doc.dict(node)?;
    let count = dict
        .get(b"Count")
        .ok()
        .and_then(|c| doc.resolve(c).ok())
        .and_then(|c| c.as_i64().ok())
        .ok_or_else(|| {
            PdfGraftError::MalformedPageTree(format!("page tree node {:?} has no Count", node))
        })?;
    usize::try_from(count).map_err(|_| {
        PdfGraftError::MalformedPageTree(format!("negative Count {} on {:?}", count, node))
    })
}

fn collect_leaves(
    doc: &PdfDocument,
    node: ObjectId,
    guard: &mut CycleGuard,
    out: &mut Vec<ObjectId>,
) -> Result<()> {
    if !guard.enter(node) {
        return Err(PdfGraftError::MalformedPageTree(format!(
            "Kids cycle through {:?}",
            node
        )));
    }
    for kid in kids_of(doc, node)? {
        let kid_id = kid_ref(&kid, node)?;
        if is_internal(doc.dict(kid_id)?) {
            collect_leaves(doc, kid_id, guard, out)?;
        } else {
            out.push(kid_id);
        }
    }
    guard.leave(node);
    Ok(())
}

fn validate_node(doc: &PdfDocument, node: ObjectId, guard: &mut CycleGuard) -> Result<usize> {
    if !guard.enter(node) {
        return Err(PdfGraftError::MalformedPageTree(format!(
            "Kids cycle through {:?}",
            node
        )));
    }
    let mut leaves = 0;
    for kid in kids_of(doc, node)? {
        let kid_id = kid_ref(&kid, node)?;
        if is_internal(doc.dict(kid_id)?) {
            leaves += validate_node(doc, kid_id, guard)?;
        } else {
            leaves += 1;
        }
    }
    let declared = node_count(doc, node)?;
    if declared != leaves {
        return Err(PdfGraftError::MalformedPageTree(format!(
            "{:?} declares Count {} but holds {} pages",
            node, declared, leaves
        )));
    }
    guard.leave(node);
    Ok(leaves)
}

fn apply_count_delta(doc: &mut PdfDocument, chain: &[ObjectId], delta: i64) -> Result<()> {
    for &id in chain {
        let current = node_count(doc, id)? as i64;
        doc.dict_mut(id)?.set("Count", Object::Integer(current + delta));
    }
    Ok(())
}

/// Copy inherited attributes onto the page so a new parent cannot change them.
fn materialize_inherited(doc: &mut PdfDocument, page: ObjectId) -> Result<()> {
    let mut resolved = Vec::new();
    for key in INHERITABLE_KEYS {
        if doc.dict(page)?.has(key) {
            continue;
        }
        if let Some(value) = doc.inherited_attr(page, key)? {
            resolved.push((key, value));
        }
    }
    let dict = doc.dict_mut(page)?;
    for (key, value) in resolved {
        dict.set(key, value);
    }
    Ok(())
}

/// Put an existing page object at position `at` (0..=page_count).
pub fn insert_page(doc: &mut PdfDocument, at: usize, page: ObjectId) -> Result<()> {
    let count = doc.page_count()?;
    if at > count {
        return Err(PdfGraftError::BadPageNumber {
            page: at as i64,
            count,
        });
    }
    let (parent, index, chain) = if count == 0 {
        let root = doc.pages_root_id()?;
        (root, 0, vec![root])
    } else if at == count {
        let loc = doc.lookup_page(count - 1)?;
        (loc.parent, loc.index + 1, loc.ancestors)
    } else {
        let loc = doc.lookup_page(at)?;
        (loc.parent, loc.index, loc.ancestors)
    };

    kids_mut(doc, parent)?.insert(index, Object::Reference(page));
    doc.dict_mut(page)?.set("Parent", Object::Reference(parent));
    apply_count_delta(doc, &chain, 1)?;
    debug!(?page, ?parent, index, "inserted page at {}", at);
    Ok(())
}

/// Move or duplicate the page at `page_no` next to the page at `target_no`.
///
/// Returns the object id now sitting at the new position: the page itself
/// for a move, a fresh duplicate for a copy.
pub fn relocate(
    doc: &mut PdfDocument,
    page_no: usize,
    target_no: usize,
    before: bool,
    copy: bool,
) -> Result<ObjectId> {
    let src = doc.lookup_page(page_no)?;
    let dst = doc.lookup_page(target_no)?;
    let pos = if before { dst.index } else { dst.index + 1 };
    let same_parent = src.parent == dst.parent;

    let placed = if copy {
        duplicate_page(doc, src.page, dst.parent)?
    } else {
        if !same_parent {
            materialize_inherited(doc, src.page)?;
            doc.dict_mut(src.page)?
                .set("Parent", Object::Reference(dst.parent));
        }
        src.page
    };

    kids_mut(doc, dst.parent)?.insert(pos, Object::Reference(placed));

    if same_parent {
        if copy {
            apply_count_delta(doc, &dst.ancestors, 1)?;
        } else {
            let old = if src.index < pos {
                src.index
            } else {
                src.index + 1
            };
            kids_mut(doc, src.parent)?.remove(old);
        }
    } else {
        apply_count_delta(doc, &dst.ancestors, 1)?;
        if !copy {
            kids_mut(doc, src.parent)?.remove(src.index);
            apply_count_delta(doc, &src.ancestors, -1)?;
        }
    }
    debug!(page_no, target_no, before, copy, "relocated page");
    Ok(placed)
}

/// Unlink the leaf at `page_no` from the tree. The page object stays in the store.
pub fn delete_page_at(doc: &mut PdfDocument, page_no: usize) -> Result<ObjectId> {
    let loc = doc.lookup_page(page_no)?;
    kids_mut(doc, loc.parent)?.remove(loc.index);
    apply_count_delta(doc, &loc.ancestors, -1)?;
    Ok(loc.page)
}

/// Shallow page duplicate: shares content and resources, owns its annotations.
fn duplicate_page(doc: &mut PdfDocument, page: ObjectId, parent: ObjectId) -> Result<ObjectId> {
    let mut dict = doc.dict(page)?.clone();
    for key in INHERITABLE_KEYS {
        if !dict.has(key) {
            if let Some(value) = doc.inherited_attr(page, key)? {
                dict.set(key, value);
            }
        }
    }
    dict.set("Parent", Object::Reference(parent));
    dict.remove(b"Annots");

    let new_page = doc.reserve_object_id();
    let (annots, widgets) = crate::page_graft::retained_annotations(doc, page, true)?;
    if !widgets.is_empty() {
        tracing::warn!(?page, "{} widget annotations not duplicated", widgets.len());
    }
    let mut new_annots = Vec::with_capacity(annots.len());
    for (_, annot) in annots {
        let mut annot = crate::page_graft::strip_back_references(annot);
        annot.set("P", Object::Reference(new_page));
        new_annots.push(Object::Reference(doc.add_object(annot)));
    }
    if !new_annots.is_empty() {
        dict.set("Annots", Object::Array(new_annots));
    }
    doc.put_object(new_page, dict);
    Ok(new_page)
}
