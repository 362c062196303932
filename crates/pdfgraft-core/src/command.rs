use crate::document::PdfDocument;
use crate::error::{PdfGraftError, Result};
use crate::merge::InsertOptions;
use crate::report::Warning;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PdfCommand {
    InsertPdf {
        source: PathBuf,
        #[serde(default)]
        options: InsertOptions,
    },
    MovePage {
        page: i64,
        to: i64,
    },
    CopyPage {
        page: i64,
        to: i64,
    },
    DeletePages {
        pages: Vec<i64>,
    },
}

impl PdfCommand {
    /// Run the command against `doc`, returning its warnings.
    pub fn apply(&self, doc: &mut PdfDocument) -> Result<Vec<Warning>> {
        match self {
            PdfCommand::InsertPdf { source, options } => {
                let src = PdfDocument::load(source)?;
                Ok(doc.insert_pdf(&src, options)?.warnings)
            }
            PdfCommand::MovePage { page, to } => {
                doc.move_page(*page, *to)?;
                Ok(Vec::new())
            }
            PdfCommand::CopyPage { page, to } => {
                doc.copy_page(*page, *to)?;
                Ok(Vec::new())
            }
            PdfCommand::DeletePages { pages } => Ok(doc.delete_pages(pages)?.warnings),
        }
    }
}

/// A document, the commands to apply to it in order, and where to save it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobFile {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub commands: Vec<PdfCommand>,
}

impl JobFile {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PdfGraftError::SerializationError(e.to_string()))
    }

    /// Make relative paths relative to `base` instead of the working directory.
    pub fn resolve_paths(&mut self, base: &Path) {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        fix(&mut self.input);
        fix(&mut self.output);
        for cmd in &mut self.commands {
            if let PdfCommand::InsertPdf { source, .. } = cmd {
                fix(source);
            }
        }
    }

    /// Load, apply every command, save. Failures end up in the result.
    pub fn run(&self) -> ProcessResult {
        let start = Instant::now();
        match self.execute() {
            Ok((mut metrics, warnings)) => {
                metrics.processing_time_ms = start.elapsed().as_millis() as u64;
                ProcessResult {
                    success: true,
                    output: Some(self.output.display().to_string()),
                    error: None,
                    metrics: Some(metrics),
                    warnings,
                }
            }
            Err(e) => ProcessResult {
                success: false,
                output: None,
                error: Some(e.to_string()),
                metrics: None,
                warnings: Vec::new(),
            },
        }
    }

    fn execute(&self) -> Result<(ProcessMetrics, Vec<Warning>)> {
        let input = std::fs::read(&self.input)?;
        let mut doc = PdfDocument::load_mem(&input)?;
        let mut warnings = Vec::new();
        for (i, cmd) in self.commands.iter().enumerate() {
            info!(step = i, ?cmd, "applying command");
            warnings.extend(cmd.apply(&mut doc)?);
        }
        let page_count = doc.page_count()?;
        let bytes = doc.save_to_bytes()?;
        std::fs::write(&self.output, &bytes)?;
        Ok((
            ProcessMetrics {
                input_size_bytes: input.len(),
                output_size_bytes: bytes.len(),
                page_count,
                processing_time_ms: 0,
            },
            warnings,
        ))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    /// Path of the written PDF
    pub output: Option<String>,
    pub error: Option<String>,
    pub metrics: Option<ProcessMetrics>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: usize,
    pub processing_time_ms: u64,
}
