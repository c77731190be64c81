use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::prelude::*;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::value::Value;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FileError {
    #[error("File '{name}' is {size} bytes, larger than the {max_size} byte limit")]
    TooLarge { name: String, size: u64, max_size: u64 },
    #[error("Failed to read '{path}': {message}")]
    Read { path: String, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilePickerOptions {
    /// Comma separated MIME types (`image/*`, `application/pdf`) or extensions (`.csv`).
    pub accept: Option<String>,
    pub multiple: bool,
    /// Bytes.
    pub max_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Base64 encoded contents.
    pub data: String,
}

impl FileData {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self)
            .map(Value::from)
            .unwrap_or_default()
    }
}

/// Lets the user choose files. `Ok(None)` means the choice was cancelled.
#[automock]
#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick(&self, options: FilePickerOptions) -> Result<Option<Vec<FileData>>, FileError>;
}

pub fn mime_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        "json" => "application/json",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        _ => "application/octet-stream",
    }
}

/// Matches an `accept` list against a file name and MIME type.
pub fn accepts(accept: &str, name: &str, mime_type: &str) -> bool {
    let patterns: Vec<&str> = accept
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if patterns.is_empty() {
        return true;
    }
    let name = name.to_ascii_lowercase();
    let mime_type = mime_type.to_ascii_lowercase();
    patterns.iter().any(|pattern| {
        let pattern = pattern.to_ascii_lowercase();
        if pattern == "*" || pattern == "*/*" {
            true
        } else if pattern.starts_with('.') {
            name.ends_with(&pattern)
        } else if let Some(family) = pattern.strip_suffix("/*") {
            mime_type.split('/').next() == Some(family)
        } else {
            mime_type == pattern
        }
    })
}

/// Headless picker over files chosen up front, e.g. on the command line.
#[derive(Debug, Clone, Default)]
pub struct PathFilePicker {
    paths: Vec<PathBuf>,
}

impl PathFilePicker {
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl FilePicker for PathFilePicker {
    async fn pick(&self, options: FilePickerOptions) -> Result<Option<Vec<FileData>>, FileError> {
        let mut files = Vec::new();
        for path in &self.paths {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let mime_type = mime_type_for(path);
            if let Some(accept) = &options.accept {
                if !accepts(accept, &name, mime_type) {
                    debug!("Skipping '{}': not accepted by '{}'", name, accept);
                    continue;
                }
            }

            let read_error = |e: std::io::Error| FileError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            };
            let size = tokio::fs::metadata(path).await.map_err(read_error)?.len();
            if size > options.max_size {
                warn!("Rejecting '{}' ({} bytes)", name, size);
                return Err(FileError::TooLarge {
                    name,
                    size,
                    max_size: options.max_size,
                });
            }
            let bytes = tokio::fs::read(path).await.map_err(read_error)?;
            files.push(FileData {
                name,
                size,
                mime_type: mime_type.to_string(),
                data: BASE64_STANDARD.encode(&bytes),
            });
            if !options.multiple {
                break;
            }
        }
        Ok((!files.is_empty()).then_some(files))
    }
}
