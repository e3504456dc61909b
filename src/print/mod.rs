use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::notify::ToastQueue;
use crate::render::RenderSurface;

pub const NOT_READY_MESSAGE: &str = "Result not ready!";

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("failed to write print document '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Receives the document to print. Only the surface content is passed, never
/// any host chrome.
pub trait PrintSink {
    fn print(&mut self, html: &str) -> Result<(), PrintError>;
}

#[derive(Clone, Debug)]
pub struct FilePrintSink {
    path: PathBuf,
}

impl FilePrintSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PrintSink for FilePrintSink {
    fn print(&mut self, html: &str) -> Result<(), PrintError> {
        std::fs::write(&self.path, html).map_err(|source| PrintError::Write {
            path: self.path.display().to_string(),
            source,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrintOutcome {
    Printed { bytes: usize },
    NotReady,
}

/// Prints the surface's current document. A missing document or an in-flight
/// fetch produces a warning toast and `NotReady` instead of an error.
pub fn print(
    surface: &RenderSurface,
    loading: bool,
    sink: &mut dyn PrintSink,
    toasts: &ToastQueue,
) -> Result<PrintOutcome, PrintError> {
    let doc = match surface.document() {
        Some(doc) if !loading => doc,
        _ => {
            warn!(loading, "print requested before result was ready");
            toasts.warn(NOT_READY_MESSAGE);
            return Ok(PrintOutcome::NotReady);
        }
    };
    let html = doc.to_html();
    sink.print(&html)?;
    info!(bytes = html.len(), "result sent to printer");
    Ok(PrintOutcome::Printed { bytes: html.len() })
}
