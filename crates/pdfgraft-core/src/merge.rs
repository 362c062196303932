//! PDF Merge algorithm
//!
//! Copies a page range of one document into another, page by page through
//! [`copy_page`], sharing one [`GraftMap`] so that objects reachable from
//! several copied pages land in the destination once.

use crate::document::PdfDocument;
use crate::error::{PdfGraftError, Result};
use crate::graft::GraftMap;
use crate::links::translate_links;
use crate::page_graft::{copy_page, Rotation};
use crate::report::{CopiedPage, MergeProgress, MergeReport, Warning, Warnings};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Parameters of one `insert_pdf` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertOptions {
    /// First source page; negative counts from the end.
    pub from_page: i64,
    /// Last source page, inclusive. May be lower than `from_page`.
    pub to_page: i64,
    /// Destination position of the first copied page, `-1` to append.
    pub start_at: i64,
    pub rotate: Rotation,
    pub copy_links: bool,
    pub copy_annots: bool,
    /// Emit a progress notification every N pages; `0` disables it.
    pub progress_every: usize,
}

impl Default for InsertOptions {
    fn default() -> Self {
        Self {
            from_page: 0,
            to_page: -1,
            start_at: -1,
            rotate: Rotation::NoChange,
            copy_links: true,
            copy_annots: true,
            progress_every: 0,
        }
    }
}

/// Source positions from `first` to `last` inclusive, in either direction.
fn range_positions(first: usize, last: usize) -> Vec<usize> {
    if first <= last {
        (first..=last).collect()
    } else {
        (last..=first).rev().collect()
    }
}

impl PdfDocument {
    /// Copy pages of `src` into this document.
    pub fn insert_pdf(&mut self, src: &PdfDocument, opts: &InsertOptions) -> Result<MergeReport> {
        self.insert_pdf_with(src, opts, None, None)
    }

    /// [`PdfDocument::insert_pdf`] with a caller-owned graft map and a
    /// progress callback.
    ///
    /// Reusing one map across calls with the same document pair keeps
    /// shared objects deduplicated across those calls.
    pub fn insert_pdf_with(
        &mut self,
        src: &PdfDocument,
        opts: &InsertOptions,
        graft_map: Option<&mut GraftMap>,
        mut progress: Option<&mut dyn FnMut(&MergeProgress)>,
    ) -> Result<MergeReport> {
        if src.is_same_document(self) {
            return Err(PdfGraftError::SameDocument);
        }
        let first = src.normalize_page(opts.from_page)?;
        let last = src.normalize_page(opts.to_page)?;
        let dst_count = self.page_count()?;
        let start = match opts.start_at {
            -1 => dst_count,
            s if s >= 0 && s as usize <= dst_count => s as usize,
            s => {
                return Err(PdfGraftError::BadPageNumber {
                    page: s,
                    count: dst_count,
                })
            }
        };
        let rotate = opts.rotate.validate()?;

        let mut local;
        let map = match graft_map {
            Some(map) => {
                map.check_pair(src, self)?;
                map
            }
            None => {
                local = GraftMap::new(src, self);
                &mut local
            }
        };

        let positions = range_positions(first, last);
        let total = positions.len();
        info!(first, last, start, total, "inserting pages");

        let mut report = MergeReport::default();
        let mut warnings = Warnings::new();
        let mut cursor = start;
        for (done, &sp) in positions.iter().enumerate() {
            match copy_page(
                src,
                sp,
                self,
                cursor,
                rotate,
                opts.copy_annots,
                map,
                &mut warnings,
            ) {
                Ok(object) => {
                    report.pages.push(CopiedPage {
                        src_page: sp,
                        dst_page: cursor,
                        object,
                    });
                    cursor += 1;
                }
                Err(e) if e.is_page_local() => {
                    warnings.push(Warning::PageSkipped {
                        page: sp,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }

            if opts.progress_every > 0 && (done + 1) % opts.progress_every == 0 {
                let event = MergeProgress {
                    done: done + 1,
                    total,
                    src_page: sp,
                    dst_page: cursor.saturating_sub(1),
                };
                info!(done = event.done, total, "merge progress");
                if let Some(callback) = progress.as_deref_mut() {
                    callback(&event);
                }
            }
        }

        if opts.copy_links && !report.pages.is_empty() {
            report.links_created = translate_links(src, self, &report.page_pairs())?;
            debug!(links = report.links_created, "links translated");
        }
        report.warnings = warnings.into_vec();
        info!(
            copied = report.pages.len(),
            graft_objects = map.len(),
            "insert finished"
        );
        Ok(report)
    }
}

/// Merge multiple PDFs into one
///
/// The first document is the base; the pages of every following document
/// are appended through [`PdfDocument::insert_pdf`]. Documents without
/// pages contribute nothing.
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>> {
    let mut inputs = documents.into_iter();
    let Some(first) = inputs.next() else {
        return Err(PdfGraftError::OperationError("No documents to merge".into()));
    };
    if inputs.len() == 0 {
        return Ok(first);
    }

    let mut dest = PdfDocument::load_mem(&first)
        .map_err(|e| PdfGraftError::ParseError(format!("Failed to load document 0: {}", e)))?;

    for (i, bytes) in inputs.enumerate() {
        let source = PdfDocument::load_mem(&bytes).map_err(|e| {
            PdfGraftError::ParseError(format!("Failed to load document {}: {}", i + 1, e))
        })?;
        if source.page_count()? == 0 {
            debug!(document = i + 1, "skipping empty document");
            continue;
        }
        let report = dest.insert_pdf(&source, &InsertOptions::default())?;
        debug!(document = i + 1, pages = report.pages.len(), "appended document");
    }

    dest.save_to_bytes()
}
