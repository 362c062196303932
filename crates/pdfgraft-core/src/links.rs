//! Link annotations: reading them, and re-creating them after a merge.

use crate::cycle::CycleGuard;
use crate::document::{dict_subtype, PdfDocument};
use crate::error::{PdfGraftError, Result};
use crate::geometry::{number, Matrix, Point, Rect};
use lopdf::{Dictionary, Object, ObjectId, StringFormat};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum LinkKind {
    /// Jump to a page of this document.
    Goto { page: usize, to: Point, zoom: f32 },
    /// Jump into another PDF file.
    GotoR { file: String, dest: RemoteDest },
    Uri { uri: String },
    Launch { file: String },
    /// Viewer action such as `NextPage`.
    Named { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RemoteDest {
    Page { page: i64, to: Point, zoom: f32 },
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub rect: Rect,
    pub kind: LinkKind,
    /// The annotation object, when it is indirect.
    pub annot: Option<ObjectId>,
}

/// Page id → page number lookup for one document.
pub(crate) type PageIndex = HashMap<ObjectId, usize>;

pub(crate) fn page_index(doc: &PdfDocument) -> Result<PageIndex> {
    Ok(doc
        .page_ids()?
        .into_iter()
        .enumerate()
        .map(|(n, id)| (id, n))
        .collect())
}

fn text(obj: &Object) -> Option<String> {
    match obj {
        Object::String(bytes, _) | Object::Name(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        _ => None,
    }
}

fn literal(s: &str) -> Object {
    Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
}

/// File specification: a plain string or a dictionary with `/UF` or `/F`.
fn file_spec(doc: &PdfDocument, obj: &Object) -> Option<String> {
    match doc.resolve(obj).ok()? {
        Object::Dictionary(d) => d
            .get(b"UF")
            .or_else(|_| d.get(b"F"))
            .ok()
            .and_then(text),
        other => text(other),
    }
}

/// Target point and zoom of an explicit destination array.
fn dest_point(arr: &[Object]) -> (Point, f32) {
    let n = |i: usize| arr.get(i).and_then(number).unwrap_or(0.0);
    let fit = arr.get(1).and_then(|o| o.as_name().ok());
    match fit {
        Some(b"XYZ") => (Point::new(n(2), n(3)), n(4)),
        Some(b"FitH") | Some(b"FitBH") => (Point::new(0.0, n(2)), 0.0),
        Some(b"FitV") | Some(b"FitBV") => (Point::new(n(2), 0.0), 0.0),
        Some(b"FitR") => (Point::new(n(2), n(5)), 0.0),
        _ => (Point::default(), 0.0),
    }
}

fn lookup_name_tree(
    doc: &PdfDocument,
    node: &Object,
    name: &[u8],
    guard: &mut CycleGuard,
) -> Option<Object> {
    let node_id = node.as_reference().ok();
    if let Some(id) = node_id {
        if !guard.enter(id) {
            warn!(?id, "name tree cycle, lookup truncated");
            return None;
        }
    }
    let found = doc
        .resolve_dict(node)
        .and_then(|dict| search_name_node(doc, dict, name, guard));
    if let Some(id) = node_id {
        guard.leave(id);
    }
    found
}

fn search_name_node(
    doc: &PdfDocument,
    dict: &Dictionary,
    name: &[u8],
    guard: &mut CycleGuard,
) -> Option<Object> {
    if let Some(Object::Array(pairs)) = doc.get_resolved(dict, b"Names") {
        for pair in pairs.chunks(2) {
            if let [key, value] = pair {
                if matches!(doc.resolve(key), Ok(Object::String(k, _)) if k.as_slice() == name) {
                    return Some(value.clone());
                }
            }
        }
    }
    if let Some(Object::Array(kids)) = doc.get_resolved(dict, b"Kids") {
        for kid in kids {
            if let Some(found) = lookup_name_tree(doc, kid, name, guard) {
                return Some(found);
            }
        }
    }
    None
}

/// Explicit destination array behind a named destination.
pub(crate) fn resolve_named_dest(doc: &PdfDocument, name: &[u8]) -> Option<Vec<Object>> {
    let catalog = doc.catalog().ok()?;
    let mut value = doc
        .get_resolved(catalog, b"Dests")
        .and_then(|dests| dests.as_dict().ok())
        .and_then(|dests| dests.get(name).ok())
        .cloned();
    if value.is_none() {
        let names = doc.get_resolved(catalog, b"Names")?.as_dict().ok()?;
        let tree = names.get(b"Dests").ok()?;
        value = lookup_name_tree(doc, tree, name, &mut CycleGuard::new());
    }
    match doc.resolve(&value?).ok()? {
        Object::Array(arr) => Some(arr.clone()),
        Object::Dictionary(d) => doc.get_resolved(d, b"D")?.as_array().ok().cloned(),
        _ => None,
    }
}

/// Page named by a destination value: an explicit array or a `/D` dictionary.
fn dest_value_page(doc: &PdfDocument, value: &Object) -> Option<ObjectId> {
    let arr = match doc.resolve(value).ok()? {
        Object::Array(arr) => arr,
        Object::Dictionary(d) => doc.get_resolved(d, b"D")?.as_array().ok()?,
        _ => return None,
    };
    arr.first()?.as_reference().ok()
}

/// Where a pruned `/Names` array is written back.
enum NamesSlot {
    /// The array is an indirect object.
    Array(ObjectId),
    /// The array sits in an indirect tree node.
    Node(ObjectId),
    /// The array sits in a direct tree root inside the catalog's `/Names`.
    Root,
}

fn prune_name_node(
    doc: &PdfDocument,
    node: &Object,
    is_root: bool,
    pages: &HashSet<ObjectId>,
    guard: &mut CycleGuard,
    edits: &mut Vec<(NamesSlot, Vec<Object>)>,
) -> usize {
    let node_id = node.as_reference().ok();
    if let Some(id) = node_id {
        if !guard.enter(id) {
            warn!(?id, "name tree cycle, pruning truncated");
            return 0;
        }
    }
    let mut removed = 0;
    if let Some(dict) = doc.resolve_dict(node) {
        if let Ok(names) = dict.get(b"Names") {
            if let Ok(Object::Array(pairs)) = doc.resolve(names) {
                let mut kept = Vec::with_capacity(pairs.len());
                let mut dropped = 0;
                for pair in pairs.chunks(2) {
                    let doomed = matches!(pair, [_, value]
                        if dest_value_page(doc, value).is_some_and(|p| pages.contains(&p)));
                    if doomed {
                        dropped += 1;
                    } else {
                        kept.extend_from_slice(pair);
                    }
                }
                let slot = match (names.as_reference().ok(), node_id) {
                    (Some(array), _) => Some(NamesSlot::Array(array)),
                    (None, Some(id)) => Some(NamesSlot::Node(id)),
                    (None, None) if is_root => Some(NamesSlot::Root),
                    (None, None) => None,
                };
                match slot {
                    Some(slot) if dropped > 0 => {
                        edits.push((slot, kept));
                        removed += dropped;
                    }
                    None if dropped > 0 => debug!("direct name tree kid left unpruned"),
                    _ => {}
                }
            }
        }
        if let Some(Object::Array(kids)) = doc.get_resolved(dict, b"Kids") {
            for kid in kids {
                removed += prune_name_node(doc, kid, false, pages, guard, edits);
            }
        }
    }
    if let Some(id) = node_id {
        guard.leave(id);
    }
    removed
}

/// Direct `/Dests` tree root inside the catalog's `/Names` dictionary.
fn dests_tree_root_mut(doc: &mut PdfDocument) -> Result<Option<&mut Dictionary>> {
    let catalog_id = doc.catalog_id()?;
    let names_id = match doc.dict(catalog_id)?.get(b"Names") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(_) => None,
        Err(_) => return Ok(None),
    };
    let names = match names_id {
        Some(id) => doc.dict_mut(id)?,
        None => doc.dict_mut(catalog_id)?.get_mut(b"Names")?.as_dict_mut()?,
    };
    Ok(names.get_mut(b"Dests").ok().and_then(|d| d.as_dict_mut().ok()))
}

/// Remove named destinations that jump to one of `pages`, from the catalog
/// `/Dests` dictionary and from the `/Names /Dests` tree. Returns how many
/// names went.
pub(crate) fn prune_named_dests(doc: &mut PdfDocument, pages: &HashSet<ObjectId>) -> Result<usize> {
    let catalog_id = doc.catalog_id()?;
    let catalog = doc.dict(catalog_id)?;

    let dests_id = catalog.get(b"Dests").and_then(Object::as_reference).ok();
    let doomed: Vec<Vec<u8>> = match doc.get_resolved(catalog, b"Dests").and_then(|d| d.as_dict().ok()) {
        Some(dests) => dests
            .iter()
            .filter(|(_, value)| dest_value_page(doc, value).is_some_and(|p| pages.contains(&p)))
            .map(|(name, _)| name.clone())
            .collect(),
        None => Vec::new(),
    };

    let mut edits = Vec::new();
    let tree = doc
        .get_resolved(catalog, b"Names")
        .and_then(|n| n.as_dict().ok())
        .and_then(|n| n.get(b"Dests").ok());
    let tree_removed = match tree {
        Some(tree) => prune_name_node(doc, tree, true, pages, &mut CycleGuard::new(), &mut edits),
        None => 0,
    };

    if !doomed.is_empty() {
        let dests = match dests_id {
            Some(id) => doc.dict_mut(id)?,
            None => doc.dict_mut(catalog_id)?.get_mut(b"Dests")?.as_dict_mut()?,
        };
        for name in &doomed {
            dests.remove(name);
        }
    }
    for (slot, kept) in edits {
        match slot {
            NamesSlot::Array(id) => *doc.object_mut(id)? = Object::Array(kept),
            NamesSlot::Node(id) => doc.dict_mut(id)?.set("Names", Object::Array(kept)),
            NamesSlot::Root => {
                if let Some(root) = dests_tree_root_mut(doc)? {
                    root.set("Names", Object::Array(kept));
                }
            }
        }
    }

    let removed = doomed.len() + tree_removed;
    if removed > 0 {
        debug!(removed, "pruned named destinations");
    }
    Ok(removed)
}

/// Destination value as an explicit array, resolving names.
fn explicit_dest(doc: &PdfDocument, dest: &Object) -> Option<Vec<Object>> {
    match doc.resolve(dest).ok()? {
        Object::Array(arr) => Some(arr.clone()),
        Object::Name(name) | Object::String(name, _) => resolve_named_dest(doc, name),
        _ => None,
    }
}

/// The local destination of a link or outline item: `/Dest`, or `/A` of type GoTo.
fn local_dest(doc: &PdfDocument, dict: &Dictionary) -> Option<Vec<Object>> {
    if let Ok(dest) = dict.get(b"Dest") {
        return explicit_dest(doc, dest);
    }
    let action = doc.get_resolved(dict, b"A")?.as_dict().ok()?;
    match action.get(b"S").and_then(Object::as_name) {
        Ok(b"GoTo") => explicit_dest(doc, action.get(b"D").ok()?),
        _ => None,
    }
}

/// Page object a link or outline item jumps to inside its own document.
pub(crate) fn target_page_ref(doc: &PdfDocument, dict: &Dictionary) -> Option<ObjectId> {
    local_dest(doc, dict)?.first()?.as_reference().ok()
}

fn parse_link(doc: &PdfDocument, annot: &Dictionary, pages: &PageIndex) -> Option<LinkKind> {
    if annot.has(b"Dest") {
        let arr = local_dest(doc, annot)?;
        let page = *pages.get(&arr.first()?.as_reference().ok()?)?;
        let (to, zoom) = dest_point(&arr);
        return Some(LinkKind::Goto { page, to, zoom });
    }

    let action = doc.get_resolved(annot, b"A")?.as_dict().ok()?;
    match action.get(b"S").and_then(Object::as_name).ok()? {
        b"GoTo" => {
            let arr = explicit_dest(doc, action.get(b"D").ok()?)?;
            let page = *pages.get(&arr.first()?.as_reference().ok()?)?;
            let (to, zoom) = dest_point(&arr);
            Some(LinkKind::Goto { page, to, zoom })
        }
        b"GoToR" => {
            let file = file_spec(doc, action.get(b"F").ok()?)?;
            let dest = match doc.resolve(action.get(b"D").ok()?).ok()? {
                Object::Array(arr) => {
                    let page = arr.first().and_then(|p| p.as_i64().ok()).unwrap_or(0);
                    let (to, zoom) = dest_point(arr);
                    RemoteDest::Page { page, to, zoom }
                }
                other => RemoteDest::Named(text(other)?),
            };
            Some(LinkKind::GotoR { file, dest })
        }
        b"URI" => Some(LinkKind::Uri {
            uri: text(doc.resolve(action.get(b"URI").ok()?).ok()?)?,
        }),
        b"Launch" => {
            let spec = action.get(b"F").ok().or_else(|| {
                doc.get_resolved(action, b"Win")
                    .and_then(|w| w.as_dict().ok())
                    .and_then(|w| w.get(b"F").ok())
            })?;
            Some(LinkKind::Launch {
                file: file_spec(doc, spec)?,
            })
        }
        b"Named" => Some(LinkKind::Named {
            name: text(action.get(b"N").ok()?)?,
        }),
        other => {
            debug!(action = %String::from_utf8_lossy(other), "unsupported link action");
            None
        }
    }
}

fn links_on_page(doc: &PdfDocument, page: ObjectId, pages: &PageIndex) -> Result<Vec<Link>> {
    let mut links = Vec::new();
    let page_dict = doc.dict(page)?;
    let Some(Object::Array(annots)) = doc.get_resolved(page_dict, b"Annots") else {
        return Ok(links);
    };
    for entry in annots {
        let Some(annot) = doc.resolve_dict(entry) else {
            continue;
        };
        if dict_subtype(annot) != Some(&b"Link"[..]) {
            continue;
        }
        let rect = annot
            .get(b"Rect")
            .ok()
            .and_then(|r| doc.resolve(r).ok())
            .and_then(Rect::from_object)
            .unwrap_or_default();
        match parse_link(doc, annot, pages) {
            Some(kind) => links.push(Link {
                rect,
                kind,
                annot: entry.as_reference().ok(),
            }),
            None => debug!(?page, "link without a usable target"),
        }
    }
    Ok(links)
}

impl PdfDocument {
    /// Links on page `pno`. Negative numbers count from the end.
    pub fn page_links(&self, pno: i64) -> Result<Vec<Link>> {
        let pno = self.normalize_page(pno)?;
        let page = self.lookup_page(pno)?.page;
        links_on_page(self, page, &page_index(self)?)
    }
}

/// Append `annot` to the page's `/Annots`, following an indirect array.
pub(crate) fn push_annotation(doc: &mut PdfDocument, page: ObjectId, annot: ObjectId) -> Result<()> {
    let indirect = match doc.dict(page)?.get(b"Annots") {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    if let Some(id) = indirect {
        if let Ok(arr) = doc.object_mut(id)?.as_array_mut() {
            arr.push(Object::Reference(annot));
            return Ok(());
        }
    }
    let page_dict = doc.dict_mut(page)?;
    if let Ok(Object::Array(arr)) = page_dict.get_mut(b"Annots") {
        arr.push(Object::Reference(annot));
    } else {
        page_dict.set("Annots", Object::Array(vec![Object::Reference(annot)]));
    }
    Ok(())
}

fn xyz(page: Object, to: Point, zoom: f32) -> Object {
    Object::Array(vec![
        page,
        Object::Name(b"XYZ".to_vec()),
        Object::Real(to.x),
        Object::Real(to.y),
        Object::Real(zoom),
    ])
}

fn link_skeleton(rect: Rect) -> Dictionary {
    Dictionary::from_iter(vec![
        ("Type", Object::Name(b"Annot".to_vec())),
        ("Subtype", Object::Name(b"Link".to_vec())),
        ("Rect", rect.to_object()),
        (
            "Border",
            Object::Array(vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)]),
        ),
    ])
}

fn action(kind: &[u8], entries: Vec<(&str, Object)>) -> Object {
    let mut a = Dictionary::new();
    a.set("S", Object::Name(kind.to_vec()));
    for (k, v) in entries {
        a.set(k, v);
    }
    Object::Dictionary(a)
}

/// Link annotation for a just-copied page, or `None` if the link must go.
///
/// Only GOTO links can go: their target must be among the copied pages.
/// Every other kind points outside the page list and is rebuilt as is.
fn rebuild_link(link: &Link, goto_target: Option<(ObjectId, Point)>) -> Option<Dictionary> {
    let mut annot = link_skeleton(link.rect);
    match &link.kind {
        LinkKind::Goto { zoom, .. } => {
            let (page, to) = goto_target?;
            annot.set("Dest", xyz(Object::Reference(page), to, *zoom));
        }
        LinkKind::GotoR { file, dest } => {
            let d = match dest {
                RemoteDest::Page { page, to, zoom } => xyz(Object::Integer(*page), *to, *zoom),
                RemoteDest::Named(name) => literal(name),
            };
            annot.set("A", action(b"GoToR", vec![("F", literal(file)), ("D", d)]));
        }
        LinkKind::Uri { uri } => {
            annot.set("A", action(b"URI", vec![("URI", literal(uri))]));
        }
        LinkKind::Launch { file } => {
            annot.set("A", action(b"Launch", vec![("F", literal(file))]));
        }
        LinkKind::Named { name } => {
            annot.set(
                "A",
                action(b"Named", vec![("N", Object::Name(name.as_bytes().to_vec()))]),
            );
        }
    }
    Some(annot)
}

/// Re-create the links of source pages `first..=last` on the copies that
/// start at `start_at` in `dst`. Returns the number of links created.
pub fn rewrite_links(
    src: &PdfDocument,
    dst: &mut PdfDocument,
    first: usize,
    last: usize,
    start_at: usize,
) -> Result<usize> {
    let src_positions: Vec<usize> = if first <= last {
        (first..=last).collect()
    } else {
        (last..=first).rev().collect()
    };
    let pairs: Vec<(usize, usize)> = src_positions
        .into_iter()
        .enumerate()
        .map(|(i, sp)| (sp, start_at + i))
        .collect();
    translate_links(src, dst, &pairs)
}

/// Link translation over explicit (source page, destination page) pairs.
pub(crate) fn translate_links(
    src: &PdfDocument,
    dst: &mut PdfDocument,
    pairs: &[(usize, usize)],
) -> Result<usize> {
    if src.is_same_document(dst) {
        return Err(PdfGraftError::SameDocument);
    }
    let lookup: HashMap<usize, usize> = pairs.iter().copied().collect();
    let src_pages = src.page_ids()?;
    let dst_pages = dst.page_ids()?;
    let src_index: PageIndex = src_pages.iter().enumerate().map(|(n, id)| (*id, n)).collect();

    for &(sp, dp) in pairs {
        if sp >= src_pages.len() {
            return Err(PdfGraftError::BadPageNumber {
                page: sp as i64,
                count: src_pages.len(),
            });
        }
        if dp >= dst_pages.len() {
            return Err(PdfGraftError::BadPageNumber {
                page: dp as i64,
                count: dst_pages.len(),
            });
        }
    }

    let mut created = 0;
    for &(sp, dp) in pairs {
        let links = links_on_page(src, src_pages[sp], &src_index)?;
        if links.is_empty() {
            continue;
        }
        for link in &links {
            let goto_target = match link.kind {
                LinkKind::Goto { page, to, .. } => {
                    let Some(&target) = lookup.get(&page) else {
                        debug!(src_page = sp, target = page, "link target outside copied range");
                        continue;
                    };
                    let src_ctm = src.page_transform_for(src_pages[page])?;
                    let dst_ctm = dst.page_transform_for(dst_pages[target])?;
                    let to = reanchor(to, &src_ctm, &dst_ctm);
                    Some((dst_pages[target], to))
                }
                _ => None,
            };
            if let Some(mut annot) = rebuild_link(link, goto_target) {
                annot.set("P", Object::Reference(dst_pages[dp]));
                let id = dst.add_object(annot);
                push_annotation(dst, dst_pages[dp], id)?;
                created += 1;
            }
        }
    }
    Ok(created)
}

/// Carry a point from the source page's user space into the destination
/// page's, through their shared display space.
fn reanchor(to: Point, src_ctm: &Matrix, dst_ctm: &Matrix) -> Point {
    match dst_ctm.invert() {
        Some(inv) => to.transform(&src_ctm.concat(&inv)),
        None => to,
    }
}
