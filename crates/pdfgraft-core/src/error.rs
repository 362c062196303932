use lopdf::ObjectId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfGraftError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("Bad page number {page} (document has {count} pages)")]
    BadPageNumber { page: i64, count: usize },

    #[error("Source and destination must be different documents")]
    SameDocument,

    #[error("Bad xref {0:?}")]
    BadXref(ObjectId),

    #[error("Circular reference through object {0:?}")]
    CircularDependency(ObjectId),

    #[error("Malformed page tree: {0}")]
    MalformedPageTree(String),

    #[error("Graft map was created for a different document pair")]
    GraftMapMismatch,

    #[error("Invalid rotation {0}: must be a multiple of 90")]
    InvalidRotation(i64),

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Object store error: {0}")]
    Store(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfGraftError {
    /// Errors confined to the page being processed. Batch operations skip
    /// the page and carry on; everything else aborts the call.
    pub fn is_page_local(&self) -> bool {
        matches!(
            self,
            PdfGraftError::MalformedPageTree(_)
                | PdfGraftError::BadXref(_)
                | PdfGraftError::CircularDependency(_)
                | PdfGraftError::Store(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PdfGraftError>;
