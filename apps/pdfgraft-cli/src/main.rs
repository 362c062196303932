//! pdfgraft command line
//!
//! Page numbers are 0-based; negative numbers count from the end.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use pdfgraft_core::{
    merge_documents, parse_ranges, split_document, InsertOptions, JobFile, PdfDocument, Rotation,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pdfgraft")]
#[command(version, about = "Copy, move and delete PDF pages across documents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Output {
    /// Where to write the result
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Copy pages of SOURCE into DEST
    #[command(allow_negative_numbers = true)]
    Insert {
        dest: PathBuf,
        source: PathBuf,
        #[arg(long, default_value_t = 0)]
        from: i64,
        #[arg(long, default_value_t = -1)]
        to: i64,
        /// Position of the first copied page, -1 appends
        #[arg(long, default_value_t = -1)]
        start_at: i64,
        /// Rotation for copied pages, a multiple of 90
        #[arg(long)]
        rotate: Option<i64>,
        #[arg(long)]
        no_links: bool,
        #[arg(long)]
        no_annots: bool,
        #[command(flatten)]
        out: Output,
    },
    /// Move PAGE before TO, or to the end with TO = -1
    #[command(name = "move", allow_negative_numbers = true)]
    MovePage {
        input: PathBuf,
        page: i64,
        to: i64,
        #[command(flatten)]
        out: Output,
    },
    /// Duplicate PAGE before TO, or at the end with TO = -1
    #[command(name = "copy", allow_negative_numbers = true)]
    CopyPage {
        input: PathBuf,
        page: i64,
        to: i64,
        #[command(flatten)]
        out: Output,
    },
    /// Delete pages, e.g. "0,2-4"
    Delete {
        input: PathBuf,
        pages: String,
        #[command(flatten)]
        out: Output,
    },
    /// Append whole documents one after another
    Merge {
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,
        #[command(flatten)]
        out: Output,
    },
    /// Keep only the listed pages, e.g. "0-2,5"
    Split {
        input: PathBuf,
        pages: String,
        #[command(flatten)]
        out: Output,
    },
    /// Print outline item ids as JSON
    Outline { input: PathBuf },
    /// Print the links of a page as JSON
    #[command(allow_negative_numbers = true)]
    Links { input: PathBuf, page: i64 },
    /// Print fonts, images and forms used by a page as JSON
    #[command(allow_negative_numbers = true)]
    Resources { input: PathBuf, page: i64 },
    /// Verify page tree counts
    Check { input: PathBuf },
    /// Apply a JSON job file
    Run { job: PathBuf },
}

fn load(path: &Path) -> Result<PdfDocument> {
    PdfDocument::load(path).with_context(|| format!("failed to load {}", path.display()))
}

fn save(doc: &mut PdfDocument, path: &Path) -> Result<()> {
    doc.save(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!("wrote {}", path.display());
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Insert {
            dest,
            source,
            from,
            to,
            start_at,
            rotate,
            no_links,
            no_annots,
            out,
        } => {
            let mut doc = load(&dest)?;
            let src = load(&source)?;
            let opts = InsertOptions {
                from_page: from,
                to_page: to,
                start_at,
                rotate: Rotation::from(rotate),
                copy_links: !no_links,
                copy_annots: !no_annots,
                progress_every: 50,
            };
            let report = doc.insert_pdf(&src, &opts)?;
            tracing::info!(
                pages = report.pages.len(),
                links = report.links_created,
                "inserted"
            );
            save(&mut doc, &out.output)
        }
        Command::MovePage {
            input,
            page,
            to,
            out,
        } => {
            let mut doc = load(&input)?;
            doc.move_page(page, to)?;
            save(&mut doc, &out.output)
        }
        Command::CopyPage {
            input,
            page,
            to,
            out,
        } => {
            let mut doc = load(&input)?;
            doc.copy_page(page, to)?;
            save(&mut doc, &out.output)
        }
        Command::Delete { input, pages, out } => {
            let mut doc = load(&input)?;
            let pages: Vec<i64> = parse_ranges(&pages)?.into_iter().map(|p| p as i64).collect();
            let report = doc.delete_pages(&pages)?;
            tracing::info!(
                deleted = report.deleted.len(),
                links = report.links_removed,
                "deleted"
            );
            save(&mut doc, &out.output)
        }
        Command::Merge { inputs, out } => {
            let mut files = Vec::with_capacity(inputs.len());
            for path in &inputs {
                files.push(
                    std::fs::read(path)
                        .with_context(|| format!("failed to read {}", path.display()))?,
                );
            }
            let merged = merge_documents(files)?;
            std::fs::write(&out.output, merged)
                .with_context(|| format!("failed to write {}", out.output.display()))?;
            Ok(())
        }
        Command::Split { input, pages, out } => {
            let bytes = std::fs::read(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let result = split_document(&bytes, parse_ranges(&pages)?)?;
            std::fs::write(&out.output, result)
                .with_context(|| format!("failed to write {}", out.output.display()))?;
            Ok(())
        }
        Command::Outline { input } => print_json(&load(&input)?.outline_xrefs()?),
        Command::Links { input, page } => print_json(&load(&input)?.page_links(page)?),
        Command::Resources { input, page } => print_json(&load(&input)?.page_resources(page)?),
        Command::Check { input } => {
            let pages = load(&input)?.validate_page_tree()?;
            println!("ok: {} pages", pages);
            Ok(())
        }
        Command::Run { job } => {
            let text = std::fs::read_to_string(&job)
                .with_context(|| format!("failed to read {}", job.display()))?;
            let mut job_file = JobFile::from_json(&text)?;
            if let Some(base) = job.parent() {
                job_file.resolve_paths(base);
            }
            let result = job_file.run();
            print_json(&result)?;
            if !result.success {
                bail!(result.error.unwrap_or_else(|| "job failed".into()));
            }
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Data goes to stdout, logs to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    run(cli.command)
}
