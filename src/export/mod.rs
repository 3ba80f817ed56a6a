//! Export of completed reports: one paginated PDF package, or one format's
//! raw markdown.
//!
//! Both exports work from a [`SessionSnapshot`] so they never hold the store
//! lock while sanitizing or rendering.

pub mod layout;
pub mod pdf;
pub mod sanitize;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::report::{ReportFormat, SessionSnapshot, StoreError};
use layout::Section;
use sanitize::SanitizeError;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Reports not completed yet: {}", join_formats(.pending))]
    NotReady { pending: Vec<ReportFormat> },

    #[error("No reports have been requested")]
    NothingRequested,

    #[error("Report {0} is not completed")]
    NotCompleted(ReportFormat),

    #[error("Cannot sanitize {format}: {source}")]
    Sanitize {
        format: ReportFormat,
        #[source]
        source: SanitizeError,
    },

    #[error("PDF render error: {0}")]
    Render(String),

    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Report store error: {0}")]
    Store(#[from] StoreError),
}

fn join_formats(formats: &[ReportFormat]) -> String {
    formats
        .iter()
        .map(ReportFormat::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Rendered report package.
#[derive(Debug, Clone)]
pub struct PdfExport {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub sections: Vec<ReportFormat>,
    pub pages: usize,
}

#[derive(Debug, Clone)]
pub struct MarkdownExport {
    pub filename: String,
    pub content: String,
}

pub fn pdf_filename(date: NaiveDate) -> String {
    format!("incident-reports-{}.pdf", date.format("%Y-%m-%d"))
}

pub fn markdown_filename(format: ReportFormat, date: NaiveDate) -> String {
    format!("incident-report-{}-{}.md", format.as_str(), date.format("%Y-%m-%d"))
}

/// Export every requested format as one PDF. Refuses unless at least one
/// format was requested and all requested formats are `completed`.
pub fn export_all(snapshot: &SessionSnapshot, date: NaiveDate) -> Result<PdfExport, ExportError> {
    if snapshot.requested.is_empty() {
        return Err(ExportError::NothingRequested);
    }
    let pending: Vec<ReportFormat> = snapshot
        .requested
        .iter()
        .copied()
        .filter(|f| !snapshot.entry(*f).is_completed())
        .collect();
    if !pending.is_empty() {
        return Err(ExportError::NotReady { pending });
    }

    let sections = snapshot
        .requested
        .iter()
        .map(|format| {
            let body = sanitize::sanitize(&snapshot.entry(*format).content).map_err(|source| {
                ExportError::Sanitize {
                    format: *format,
                    source,
                }
            })?;
            Ok(Section {
                label: format.label().to_string(),
                body,
            })
        })
        .collect::<Result<Vec<_>, ExportError>>()?;

    let document = layout::layout(&date.format("%B %d, %Y").to_string(), &sections);
    let bytes = pdf::render(&document)?;

    tracing::info!(
        sections = sections.len(),
        pages = document.pages.len(),
        bytes = bytes.len(),
        "Rendered report package"
    );

    Ok(PdfExport {
        filename: pdf_filename(date),
        bytes,
        sections: snapshot.requested.clone(),
        pages: document.pages.len(),
    })
}

/// Raw markdown of one completed format.
pub fn export_markdown(
    snapshot: &SessionSnapshot,
    format: ReportFormat,
    date: NaiveDate,
) -> Result<MarkdownExport, ExportError> {
    let entry = snapshot.entry(format);
    if !entry.is_completed() {
        return Err(ExportError::NotCompleted(format));
    }
    Ok(MarkdownExport {
        filename: markdown_filename(format, date),
        content: entry.content,
    })
}

/// Write an export into `dir`, creating it if needed.
pub fn write_to_dir(dir: &Path, filename: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    std::fs::write(&path, bytes)?;
    tracing::info!(path = %path.display(), "Export written");
    Ok(path)
}
