//! Export artifacts: markdown reports and JSON envelopes
//!
//! Every export creates a new file. When the target name is taken a numeric
//! suffix is appended instead of overwriting.

use crate::error::{DelveError, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Attempts at finding a free name before giving up
const MAX_SUFFIX: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub generated_at: String,
    pub export_format: String,
    pub agent_version: String,
}

/// JSON export wrapper around arbitrary research data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEnvelope<T> {
    pub metadata: ExportMetadata,
    pub research_data: T,
}

pub struct ResearchExporter {
    output_dir: PathBuf,
    agent_version: String,
}

impl ResearchExporter {
    /// Create an exporter, creating the output directory if needed
    pub fn new(output_dir: impl Into<PathBuf>, agent_version: impl Into<String>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir).map_err(|e| DelveError::Io {
            source: e,
            context: format!("Failed to create output directory: {}", output_dir.display()),
        })?;

        Ok(Self {
            output_dir,
            agent_version: agent_version.into(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `content` under a generated report header
    pub fn export_to_markdown(&self, content: &str, filename: Option<&str>) -> Result<PathBuf> {
        let now = Local::now();
        let filename = filename
            .map(str::to_string)
            .unwrap_or_else(|| format!("research_report_{}.md", now.format("%Y%m%d_%H%M%S")));

        let document = format!(
            "# Research Report\n\n**Generated on:** {}\n\n{}",
            now.format("%Y-%m-%d %H:%M:%S"),
            content
        );

        self.write_new(&filename, document.as_bytes())
    }

    /// Wrap `data` in an [`ExportEnvelope`] and write it as pretty JSON
    pub fn export_to_json<T: Serialize>(&self, data: &T, filename: Option<&str>) -> Result<PathBuf> {
        let now = Local::now();
        let filename = filename
            .map(str::to_string)
            .unwrap_or_else(|| format!("research_data_{}.json", now.format("%Y%m%d_%H%M%S")));

        let envelope = ExportEnvelope {
            metadata: ExportMetadata {
                generated_at: now.to_rfc3339(),
                export_format: "json".to_string(),
                agent_version: self.agent_version.clone(),
            },
            research_data: data,
        };

        let json = serde_json::to_string_pretty(&envelope).map_err(|e| DelveError::Json {
            source: e,
            context: "Failed to serialize export".to_string(),
        })?;

        self.write_new(&filename, json.as_bytes())
    }

    fn write_new(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        if filename.is_empty() || filename.contains(['/', '\\']) {
            return Err(DelveError::Export(format!(
                "Invalid export file name: '{}'",
                filename
            )));
        }

        let base = self.output_dir.join(filename);

        for attempt in 0..MAX_SUFFIX {
            let path = if attempt == 0 {
                base.clone()
            } else {
                suffixed(&base, attempt)
            };

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    write_or_discard(file, &path, bytes)?;
                    tracing::info!("Exported {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(DelveError::Io {
                        source: e,
                        context: format!("Failed to create export: {}", path.display()),
                    })
                }
            }
        }

        Err(DelveError::Export(format!(
            "No free file name for {}",
            base.display()
        )))
    }
}

/// Write `bytes` to a freshly created file, removing it again on failure
fn write_or_discard(mut file: impl Write, path: &Path, bytes: &[u8]) -> Result<()> {
    if let Err(e) = file.write_all(bytes).and_then(|_| file.flush()) {
        drop(file);
        if let Err(remove) = std::fs::remove_file(path) {
            tracing::warn!("Failed to remove partial export {}: {}", path.display(), remove);
        }
        return Err(DelveError::Io {
            source: e,
            context: format!("Failed to write export: {}", path.display()),
        });
    }
    Ok(())
}

fn suffixed(base: &Path, n: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    base.with_file_name(name)
}

/// File name for exporting a single answer: `research_<first 30 chars>.md`
pub fn answer_filename(query: &str) -> String {
    let head: String = query
        .trim()
        .chars()
        .take(30)
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    format!("research_{}.md", head)
}
