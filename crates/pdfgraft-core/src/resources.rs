//! Font, image and Form XObject inventory of a page.
//!
//! Form XObjects and Type3 fonts carry their own `/Resources`, which may point
//! back at a dictionary already being scanned. Such branches are cut and
//! reported; the scan itself always completes.

use crate::cycle::CycleGuard;
use crate::document::{dict_subtype, PdfDocument};
use crate::error::Result;
use crate::geometry::Rect;
use crate::report::{Warning, Warnings};
use lopdf::{Dictionary, Object, ObjectId};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontInfo {
    pub xref: Option<ObjectId>,
    /// Resource name, e.g. `F1`.
    pub name: String,
    pub base_font: Option<String>,
    pub subtype: Option<String>,
    pub encoding: Option<String>,
    /// Form XObject or Type3 font whose resources hold this entry; `None` for the page.
    pub referencer: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub xref: Option<ObjectId>,
    pub name: String,
    pub width: i64,
    pub height: i64,
    pub bits_per_component: Option<i64>,
    pub color_space: Option<String>,
    pub filter: Option<String>,
    pub referencer: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormInfo {
    pub xref: Option<ObjectId>,
    pub name: String,
    pub bbox: Option<Rect>,
    pub referencer: Option<ObjectId>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceInventory {
    pub fonts: Vec<FontInfo>,
    pub images: Vec<ImageInfo>,
    pub forms: Vec<FormInfo>,
    pub warnings: Vec<Warning>,
}

fn name_of(obj: Option<&Object>) -> Option<String> {
    match obj? {
        Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
        Object::Array(items) => {
            let names: Vec<String> = items
                .iter()
                .filter_map(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .collect();
            (!names.is_empty()).then(|| names.join(","))
        }
        _ => None,
    }
}

struct ResourceScan<'a> {
    doc: &'a PdfDocument,
    guard: CycleGuard,
    warnings: Warnings,
    seen: HashSet<ObjectId>,
    inventory: ResourceInventory,
}

impl<'a> ResourceScan<'a> {
    fn new(doc: &'a PdfDocument) -> Self {
        Self {
            doc,
            guard: CycleGuard::new(),
            warnings: Warnings::new(),
            seen: HashSet::new(),
            inventory: ResourceInventory::default(),
        }
    }

    /// Whether an indirect entry was listed already. Direct entries never are.
    fn first_visit(&mut self, xref: Option<ObjectId>) -> bool {
        xref.map_or(true, |id| self.seen.insert(id))
    }

    fn scan(&mut self, resources: &Object, referencer: Option<ObjectId>) {
        let res_id = resources.as_reference().ok();
        if let Some(id) = res_id {
            if !self.guard.enter_or_warn(id, "resources", &mut self.warnings) {
                return;
            }
        }
        if let Some(dict) = self.doc.resolve_dict(resources) {
            self.fonts(dict, referencer);
            self.xobjects(dict, referencer);
        }
        if let Some(id) = res_id {
            self.guard.leave(id);
        }
    }

    fn fonts(&mut self, resources: &Dictionary, referencer: Option<ObjectId>) {
        let doc = self.doc;
        let Some(fonts) = doc.get_resolved(resources, b"Font").and_then(|f| f.as_dict().ok()) else {
            return;
        };
        for (name, entry) in fonts.iter() {
            let xref = entry.as_reference().ok();
            let Some(font) = doc.resolve_dict(entry) else {
                continue;
            };
            if !self.first_visit(xref) {
                continue;
            }
            let subtype = name_of(font.get(b"Subtype").ok());
            self.inventory.fonts.push(FontInfo {
                xref,
                name: String::from_utf8_lossy(name).into_owned(),
                base_font: name_of(font.get(b"BaseFont").ok()),
                subtype: subtype.clone(),
                encoding: name_of(doc.get_resolved(font, b"Encoding")),
                referencer,
            });

            if subtype.as_deref() == Some("Type3") {
                if let (Some(id), Ok(res)) = (xref, font.get(b"Resources")) {
                    self.descend(id, res, "type3 font");
                }
            }
        }
    }

    fn xobjects(&mut self, resources: &Dictionary, referencer: Option<ObjectId>) {
        let doc = self.doc;
        let Some(xobjects) = doc
            .get_resolved(resources, b"XObject")
            .and_then(|x| x.as_dict().ok())
        else {
            return;
        };
        for (name, entry) in xobjects.iter() {
            let xref = entry.as_reference().ok();
            let Some(dict) = doc.resolve_dict(entry) else {
                continue;
            };
            let name = String::from_utf8_lossy(name).into_owned();
            match dict_subtype(dict) {
                Some(b"Image") => {
                    if !self.first_visit(xref) {
                        continue;
                    }
                    let int = |key: &[u8]| doc.get_resolved(dict, key).and_then(|o| o.as_i64().ok());
                    self.inventory.images.push(ImageInfo {
                        xref,
                        name,
                        width: int(b"Width").unwrap_or(0),
                        height: int(b"Height").unwrap_or(0),
                        bits_per_component: int(b"BitsPerComponent"),
                        color_space: name_of(doc.get_resolved(dict, b"ColorSpace")),
                        filter: name_of(doc.get_resolved(dict, b"Filter")),
                        referencer,
                    });
                }
                Some(b"Form") => {
                    // A form already on the path is a cycle, not a repeat
                    if let Some(id) = xref.filter(|id| self.guard.contains(*id)) {
                        self.warnings.push(Warning::CircularDependency {
                            object: id,
                            context: "form xobject",
                        });
                        continue;
                    }
                    if !self.first_visit(xref) {
                        continue;
                    }
                    self.inventory.forms.push(FormInfo {
                        xref,
                        name,
                        bbox: doc
                            .get_resolved(dict, b"BBox")
                            .and_then(Rect::from_object),
                        referencer,
                    });
                    match (xref, dict.get(b"Resources")) {
                        (Some(id), Ok(res)) => self.descend(id, res, "form xobject"),
                        (None, Ok(res)) => self.scan(res, referencer),
                        _ => {}
                    }
                }
                other => {
                    let subtype = other.map(String::from_utf8_lossy);
                    debug!(?xref, ?subtype, "unknown xobject");
                }
            }
        }
    }

    /// Scan the resources owned by `owner` with `owner` on the path.
    fn descend(&mut self, owner: ObjectId, resources: &Object, context: &'static str) {
        if !self.guard.enter_or_warn(owner, context, &mut self.warnings) {
            return;
        }
        self.scan(resources, Some(owner));
        self.guard.leave(owner);
    }

    fn finish(mut self) -> ResourceInventory {
        self.inventory.warnings = self.warnings.into_vec();
        self.inventory
    }
}

impl PdfDocument {
    /// Fonts, images and forms used by page `pno`, including nested resources.
    pub fn page_resources(&self, pno: i64) -> Result<ResourceInventory> {
        let pno = self.normalize_page(pno)?;
        let page = self.lookup_page(pno)?.page;
        let mut scan = ResourceScan::new(self);
        if let Some(resources) = self.inherited_attr(page, b"Resources")? {
            scan.scan(&resources, None);
        }
        Ok(scan.finish())
    }
}
