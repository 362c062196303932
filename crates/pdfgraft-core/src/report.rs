//! Non-fatal diagnostics and per-operation reports

use lopdf::ObjectId;
use serde::Serialize;
use std::fmt;

/// Something went wrong but the operation carried on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Warning {
    /// A traversal reached an object already on its path and truncated the branch.
    CircularDependency {
        object: ObjectId,
        context: &'static str,
    },
    /// A form field annotation was not copied.
    SkippedWidget { page: usize, annot: ObjectId },
    /// A page in a batch failed with a structural error and was left out.
    PageSkipped { page: usize, reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::CircularDependency { object, context } => write!(
                f,
                "circular reference in {} at {} {} R, branch truncated",
                context, object.0, object.1
            ),
            Warning::SkippedWidget { page, annot } => write!(
                f,
                "page {}: widget annotation {} {} R not copied",
                page, annot.0, annot.1
            ),
            Warning::PageSkipped { page, reason } => {
                write!(f, "page {} skipped: {}", page, reason)
            }
        }
    }
}

/// Collects warnings and logs each one as it arrives.
#[derive(Debug, Default, Clone)]
pub struct Warnings(Vec<Warning>);

impl Warnings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Warning) {
        tracing::warn!("{}", warning);
        self.0.push(warning);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Warning> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.0
    }
}

/// One page copied by a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CopiedPage {
    pub src_page: usize,
    pub dst_page: usize,
    pub object: ObjectId,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub pages: Vec<CopiedPage>,
    pub links_created: usize,
    pub warnings: Vec<Warning>,
}

impl MergeReport {
    /// Realized (source page, destination page) pairs in copy order.
    pub fn page_pairs(&self) -> Vec<(usize, usize)> {
        self.pages.iter().map(|p| (p.src_page, p.dst_page)).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeleteReport {
    /// Deleted page numbers, as numbered before the call.
    pub deleted: Vec<usize>,
    pub links_removed: usize,
    pub outline_items_neutralized: usize,
    /// Entries removed from `/Dests` and the `/Names /Dests` tree.
    pub named_dests_removed: usize,
    pub warnings: Vec<Warning>,
}

/// Progress notification emitted every `progress_every` pages of a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeProgress {
    pub done: usize,
    pub total: usize,
    pub src_page: usize,
    pub dst_page: usize,
}
