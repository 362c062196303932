//! Graft map: copy objects between documents at most once.
//!
//! Keys pair the source document's identity with the source object id.
//! Object ids are only unique inside one document, so the identity is part
//! of every key, and a map refuses to serve any document pair other than the
//! one it was created for.

use crate::document::{DocumentId, PdfDocument};
use crate::error::{PdfGraftError, Result};
use lopdf::{Dictionary, Object, ObjectId};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug)]
pub struct GraftMap {
    src: DocumentId,
    dst: DocumentId,
    map: HashMap<(DocumentId, ObjectId), ObjectId>,
}

impl GraftMap {
    pub fn new(src: &PdfDocument, dst: &PdfDocument) -> Self {
        Self {
            src: src.id(),
            dst: dst.id(),
            map: HashMap::new(),
        }
    }

    pub fn source(&self) -> DocumentId {
        self.src
    }

    pub fn destination(&self) -> DocumentId {
        self.dst
    }

    pub fn check_pair(&self, src: &PdfDocument, dst: &PdfDocument) -> Result<()> {
        if src.is_same_document(dst) {
            return Err(PdfGraftError::SameDocument);
        }
        if src.id() != self.src || dst.id() != self.dst {
            return Err(PdfGraftError::GraftMapMismatch);
        }
        Ok(())
    }

    /// Destination id already assigned to `src_id`, if any.
    pub fn get(&self, src_id: ObjectId) -> Option<ObjectId> {
        self.map.get(&(self.src, src_id)).copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Destination id for source object `src_id`, copying it on first use.
    ///
    /// A failed call leaves the map and the destination as they were before it.
    pub fn get_or_graft(
        &mut self,
        src: &PdfDocument,
        dst: &mut PdfDocument,
        src_id: ObjectId,
    ) -> Result<ObjectId> {
        self.check_pair(src, dst)?;
        let mut journal = Vec::new();
        let result = self.graft_ref(src, dst, src_id, &mut journal);
        self.settle(dst, journal, result)
    }

    /// Copy `replacement` in place of source object `src_id`.
    ///
    /// Used when the caller has edited the object before copying it. Later
    /// references to `src_id` resolve to the edited copy.
    pub fn graft_replacement(
        &mut self,
        src: &PdfDocument,
        dst: &mut PdfDocument,
        src_id: ObjectId,
        replacement: &Object,
    ) -> Result<ObjectId> {
        self.check_pair(src, dst)?;
        if let Some(existing) = self.get(src_id) {
            return Ok(existing);
        }
        let mut journal = Vec::new();
        let result = self.graft_as(src, dst, src_id, replacement, &mut journal);
        self.settle(dst, journal, result)
    }

    /// Deep copy of a direct value, grafting every indirect reference inside it.
    pub fn graft_object(
        &mut self,
        src: &PdfDocument,
        dst: &mut PdfDocument,
        obj: &Object,
    ) -> Result<Object> {
        self.check_pair(src, dst)?;
        let mut journal = Vec::new();
        let result = self.copy_value(src, dst, obj, &mut journal);
        self.settle(dst, journal, result)
    }

    /// Undo every reservation in `journal` when `result` is an error.
    ///
    /// Objects grafted during a failed call may point at the object that
    /// failed, so none of them survive.
    fn settle<T>(
        &mut self,
        dst: &mut PdfDocument,
        journal: Vec<ObjectId>,
        result: Result<T>,
    ) -> Result<T> {
        if result.is_err() {
            for src_id in &journal {
                if let Some(dst_id) = self.map.remove(&(self.src, *src_id)) {
                    dst.delete_object(dst_id);
                }
            }
            debug!(rolled_back = journal.len(), "graft failed");
        }
        result
    }

    fn graft_ref(
        &mut self,
        src: &PdfDocument,
        dst: &mut PdfDocument,
        src_id: ObjectId,
        journal: &mut Vec<ObjectId>,
    ) -> Result<ObjectId> {
        if let Some(existing) = self.get(src_id) {
            return Ok(existing);
        }
        let object = src.object(src_id)?;
        self.graft_as(src, dst, src_id, object, journal)
    }

    fn graft_as(
        &mut self,
        src: &PdfDocument,
        dst: &mut PdfDocument,
        src_id: ObjectId,
        object: &Object,
        journal: &mut Vec<ObjectId>,
    ) -> Result<ObjectId> {
        // Reserve before descending so reference cycles resolve to this id
        let new_id = dst.reserve_object_id();
        self.map.insert((self.src, src_id), new_id);
        journal.push(src_id);
        let copied = self.copy_value(src, dst, object, journal)?;
        dst.put_object(new_id, copied);
        debug!(?src_id, ?new_id, "grafted object");
        Ok(new_id)
    }

    fn copy_value(
        &mut self,
        src: &PdfDocument,
        dst: &mut PdfDocument,
        obj: &Object,
        journal: &mut Vec<ObjectId>,
    ) -> Result<Object> {
        Ok(match obj {
            Object::Reference(id) => {
                if src.is_page_tree_node(*id) {
                    debug!(?id, "dropping reference to source page tree node");
                    Object::Null
                } else {
                    Object::Reference(self.graft_ref(src, dst, *id, journal)?)
                }
            }
            Object::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.copy_value(src, dst, item, journal)?);
                }
                Object::Array(out)
            }
            Object::Dictionary(dict) => {
                Object::Dictionary(self.copy_dict(src, dst, dict, journal)?)
            }
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.copy_dict(src, dst, &stream.dict, journal)?;
                Object::Stream(copy)
            }
            other => other.clone(),
        })
    }

    fn copy_dict(
        &mut self,
        src: &PdfDocument,
        dst: &mut PdfDocument,
        dict: &Dictionary,
        journal: &mut Vec<ObjectId>,
    ) -> Result<Dictionary> {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            out.set(key.clone(), self.copy_value(src, dst, value, journal)?);
        }
        Ok(out)
    }
}
