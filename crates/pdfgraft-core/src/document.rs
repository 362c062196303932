//! Document identity and object store access.
//!
//! `PdfDocument` wraps a `lopdf::Document` with a [`DocumentId`] so that
//! object ids from different documents can never be confused.

use crate::error::{PdfGraftError, Result};
use crate::geometry::{self, Matrix, Rect};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::path::Path;
use uuid::Uuid;

/// Identity of one document for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Page attributes a page may inherit from its ancestors.
pub const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// A PDF object graph with an identity.
///
/// Cloning keeps the identity: a clone is the same document as far as
/// grafting is concerned. Use [`PdfDocument::fork`] for an independent copy.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    id: DocumentId,
    doc: Document,
}

impl Default for PdfDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfDocument {
    /// Empty document: a catalog and a page tree root with no kids.
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(vec![])),
            ("Count", Object::Integer(0)),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        Self::from_lopdf(doc)
    }

    pub fn from_lopdf(doc: Document) -> Self {
        Self::with_id(doc, DocumentId::new())
    }

    pub fn with_id(doc: Document, id: DocumentId) -> Self {
        Self { id, doc }
    }

    pub fn load_mem(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).map_err(|e| PdfGraftError::ParseError(e.to_string()))?;
        Ok(Self::from_lopdf(doc))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let doc = Document::load(path.as_ref()).map_err(|e| {
            PdfGraftError::ParseError(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Ok(Self::from_lopdf(doc))
    }

    /// Serialize the document, dropping unreachable objects first.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>> {
        self.doc.prune_objects();
        self.doc.compress();

        let mut buffer = Vec::new();
        self.doc
            .save_to(&mut buffer)
            .map_err(|e| PdfGraftError::OperationError(format!("Save failed: {}", e)))?;
        Ok(buffer)
    }

    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.save_to_bytes()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Same object graph under a new identity.
    pub fn fork(&self) -> Self {
        Self::from_lopdf(self.doc.clone())
    }

    pub fn is_same_document(&self, other: &PdfDocument) -> bool {
        self.id == other.id
    }

    pub fn inner(&self) -> &Document {
        &self.doc
    }

    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn into_inner(self) -> Document {
        self.doc
    }

    // ---- object store access ----

    pub fn object(&self, id: ObjectId) -> Result<&Object> {
        self.doc.objects.get(&id).ok_or(PdfGraftError::BadXref(id))
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.doc.objects.get_mut(&id).ok_or(PdfGraftError::BadXref(id))
    }

    pub fn has_object(&self, id: ObjectId) -> bool {
        self.doc.objects.contains_key(&id)
    }

    pub fn dict(&self, id: ObjectId) -> Result<&Dictionary> {
        Ok(self.object(id)?.as_dict()?)
    }

    pub fn dict_mut(&mut self, id: ObjectId) -> Result<&mut Dictionary> {
        Ok(self.object_mut(id)?.as_dict_mut()?)
    }

    pub fn add_object<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        self.doc.add_object(object)
    }

    /// Allocate an id without storing anything under it yet.
    pub fn reserve_object_id(&mut self) -> ObjectId {
        self.doc.new_object_id()
    }

    pub fn put_object<T: Into<Object>>(&mut self, id: ObjectId, object: T) {
        self.doc.objects.insert(id, object.into());
    }

    pub fn delete_object(&mut self, id: ObjectId) -> Option<Object> {
        self.doc.objects.remove(&id)
    }

    /// Follow one level of indirection.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> Result<&'a Object> {
        match obj {
            Object::Reference(id) => self.object(*id),
            other => Ok(other),
        }
    }

    /// Resolve `obj` and view it as a dictionary, if it is one.
    pub fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(obj).ok()? {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// `dict[key]`, dereferenced.
    pub fn get_resolved<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        let obj = dict.get(key).ok()?;
        self.resolve(obj).ok()
    }

    pub fn catalog_id(&self) -> Result<ObjectId> {
        self.doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| PdfGraftError::MalformedPageTree("No Root reference in trailer".into()))
    }

    pub fn catalog(&self) -> Result<&Dictionary> {
        self.dict(self.catalog_id()?)
    }

    /// Root node of the page tree.
    pub fn pages_root_id(&self) -> Result<ObjectId> {
        self.catalog()?
            .get(b"Pages")
            .and_then(Object::as_reference)
            .map_err(|_| PdfGraftError::MalformedPageTree("Catalog has no Pages reference".into()))
    }

    /// Look `key` up on `node`, then on its ancestors.
    pub fn inherited_attr(&self, node: ObjectId, key: &[u8]) -> Result<Option<Object>> {
        let mut current = node;
        let mut seen = crate::cycle::CycleGuard::new();
        loop {
            if !seen.enter(current) {
                return Err(PdfGraftError::CircularDependency(current));
            }
            let dict = self.dict(current)?;
            if let Ok(value) = dict.get(key) {
                return Ok(Some(value.clone()));
            }
            match dict.get(b"Parent") {
                Ok(Object::Reference(parent)) => current = *parent,
                _ => return Ok(None),
            }
        }
    }

    /// Whether `id` is a `/Page` or `/Pages` node.
    pub fn is_page_tree_node(&self, id: ObjectId) -> bool {
        match self.doc.objects.get(&id) {
            Some(Object::Dictionary(d)) => {
                matches!(dict_type(d), Some(b"Page") | Some(b"Pages"))
            }
            _ => false,
        }
    }

    /// Display transform of a page, honouring inherited boxes and rotation.
    pub fn page_transform_for(&self, page: ObjectId) -> Result<Matrix> {
        let mediabox = self
            .inherited_attr(page, b"MediaBox")?
            .and_then(|o| self.resolve(&o).ok().and_then(Rect::from_object))
            .unwrap_or_else(Rect::letter);
        let cropbox = self
            .inherited_attr(page, b"CropBox")?
            .and_then(|o| self.resolve(&o).ok().and_then(Rect::from_object));
        let rotate = self
            .inherited_attr(page, b"Rotate")?
            .and_then(|o| self.resolve(&o).ok().and_then(|r| r.as_i64().ok()))
            .unwrap_or(0);
        let user_unit = self
            .dict(page)?
            .get(b"UserUnit")
            .ok()
            .and_then(geometry::number)
            .unwrap_or(1.0);
        Ok(geometry::page_transform(mediabox, cropbox, rotate, user_unit))
    }
}

/// `/Type` of a dictionary.
pub fn dict_type(dict: &Dictionary) -> Option<&[u8]> {
    dict.get(b"Type").and_then(Object::as_name).ok()
}

pub fn dict_subtype(dict: &Dictionary) -> Option<&[u8]> {
    dict.get(b"Subtype").and_then(Object::as_name).ok()
}
