//! Page grafting between PDF object graphs
//!
//! This crate copies pages from one `lopdf` document into another together
//! with everything they reference, and edits page trees in place.
//!
//! - [`PdfDocument::insert_pdf`]: copy a page range, deduplicating shared
//!   objects and re-targeting links inside the range
//! - [`PdfDocument::move_page`] / [`PdfDocument::copy_page`] /
//!   [`PdfDocument::delete_pages`]: page tree edits that keep `/Count` exact
//! - [`merge_documents`] / [`split_document`]: whole-file helpers on bytes

pub mod command;
pub mod cycle;
pub mod document;
pub mod edit;
pub mod error;
pub mod geometry;
pub mod graft;
pub mod links;
pub mod merge;
pub mod outline;
pub mod page_graft;
pub mod page_tree;
pub mod report;
pub mod resources;
pub mod split;

#[cfg(test)]
pub(crate) mod test_support;

pub use command::{JobFile, PdfCommand, ProcessMetrics, ProcessResult};
pub use document::{DocumentId, PdfDocument};
pub use error::{PdfGraftError, Result};
pub use graft::GraftMap;
pub use links::{Link, LinkKind, RemoteDest};
pub use merge::{merge_documents, InsertOptions};
pub use outline::OutlineScan;
pub use page_graft::Rotation;
pub use report::{CopiedPage, DeleteReport, MergeProgress, MergeReport, Warning};
pub use resources::{FontInfo, FormInfo, ImageInfo, ResourceInventory};
pub use split::split_document;

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<usize> {
    PdfDocument::load_mem(bytes)?.page_count()
}

/// Parse page range string like "0-2, 4, 7-9" into sorted unique page numbers
pub fn parse_ranges(input: &str) -> Result<Vec<usize>> {
    use std::collections::BTreeSet;

    let mut pages = BTreeSet::new();

    for part in input.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start
                .trim()
                .parse()
                .map_err(|_| PdfGraftError::InvalidRange(format!("Invalid start: {}", start)))?;
            let end: usize = end
                .trim()
                .parse()
                .map_err(|_| PdfGraftError::InvalidRange(format!("Invalid end: {}", end)))?;

            if start > end {
                return Err(PdfGraftError::InvalidRange(format!(
                    "Start {} > end {}",
                    start, end
                )));
            }

            pages.extend(start..=end);
        } else {
            let page: usize = part
                .parse()
                .map_err(|_| PdfGraftError::InvalidRange(format!("Invalid page: {}", part)))?;
            pages.insert(page);
        }
    }

    Ok(pages.into_iter().collect())
}
