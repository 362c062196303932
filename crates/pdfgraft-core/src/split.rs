//! PDF Split algorithm
//!
//! Builds a new document from selected pages. Consecutive selections are
//! copied as one range; all ranges share a graft map, and links are
//! translated once over every selected page.

use crate::document::PdfDocument;
use crate::error::{PdfGraftError, Result};
use crate::graft::GraftMap;
use crate::links::translate_links;
use crate::merge::InsertOptions;
use tracing::debug;

/// Group `pages` into runs of ascending consecutive numbers, keeping order.
fn contiguous_runs(pages: &[usize]) -> Vec<(usize, usize)> {
    let mut runs: Vec<(usize, usize)> = Vec::new();
    for &page in pages {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == page => *end = page,
            _ => runs.push((page, page)),
        }
    }
    runs
}

/// Split a PDF, keeping only the specified pages (0-based) in the given order.
pub fn split_document(bytes: &[u8], pages: Vec<usize>) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(PdfGraftError::InvalidRange("No pages specified".into()));
    }

    let src = PdfDocument::load_mem(bytes)?;
    let page_count = src.page_count()?;
    if let Some(&page) = pages.iter().find(|&&p| p >= page_count) {
        return Err(PdfGraftError::InvalidRange(format!(
            "Page {} does not exist (document has {} pages)",
            page, page_count
        )));
    }

    let mut dst = PdfDocument::new();
    let mut map = GraftMap::new(&src, &dst);
    let mut pairs = Vec::with_capacity(pages.len());
    for (first, last) in contiguous_runs(&pages) {
        let opts = InsertOptions {
            from_page: first as i64,
            to_page: last as i64,
            copy_links: false,
            ..InsertOptions::default()
        };
        let report = dst.insert_pdf_with(&src, &opts, Some(&mut map), None)?;
        pairs.extend(report.page_pairs());
    }

    let links = translate_links(&src, &mut dst, &pairs)?;
    debug!(pages = pairs.len(), links, objects = map.len(), "split finished");

    dst.save_to_bytes()
}
