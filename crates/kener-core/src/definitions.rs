//! Discovery and parsing of monitor definition files.
//!
//! A definitions folder holds files named `NN-<anything>.yml`. They are
//! applied in filename order, so the two-digit prefix sets the sequence.
//! Each file is a YAML mapping with a `monitors` list:
//!
//! ```yaml
//! monitors:
//!   - tag: api-health
//!     name: API health
//!     monitor_type: API
//!     type_data:
//!       url: https://example.com/health
//! ```

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

static DEFINITION_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}-.*\.yml$").expect("valid filename pattern"));

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("'{0}' does not exist or is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn is_definition_file(name: &str) -> bool {
    DEFINITION_FILE.is_match(name)
}

/// List the definition files in `folder`, sorted by filename.
///
/// An empty result is not an error; it is logged as a warning.
pub fn discover(folder: &Path) -> Result<Vec<PathBuf>, DefinitionError> {
    if !folder.is_dir() {
        error!(folder = %folder.display(), "Definitions folder does not exist or is not a directory");
        return Err(DefinitionError::NotADirectory(folder.to_path_buf()));
    }

    let io_err = |source: std::io::Error| DefinitionError::Io {
        path: folder.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if is_definition_file(name) && entry.path().is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if files.is_empty() {
        warn!(folder = %folder.display(), "No definition files found");
    } else {
        let names: Vec<_> = files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .collect();
        info!(count = files.len(), files = ?names, "Found definition files");
    }
    Ok(files)
}

/// Read the `monitors` list of one definition file.
///
/// Any problem with the file is logged and yields an empty list, so one bad
/// file never stops the others from being applied.
pub fn load_records(path: &Path) -> Vec<Value> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            error!(file = %path.display(), error = %e, "Failed to read definition file");
            return Vec::new();
        }
    };
    parse_records(&content, path)
}

fn parse_records(content: &str, path: &Path) -> Vec<Value> {
    let document: Value = match serde_yaml::from_str(content) {
        Ok(doc) => doc,
        Err(e) => {
            error!(file = %path.display(), error = %e, "Failed to parse YAML");
            return Vec::new();
        }
    };

    match document.get("monitors") {
        None => {
            warn!(file = %path.display(), "No 'monitors' key found");
            Vec::new()
        }
        Some(Value::Array(records)) => {
            debug!(file = %path.display(), count = records.len(), "Loaded monitor records");
            records.clone()
        }
        Some(_) => {
            error!(file = %path.display(), "'monitors' is not a list");
            Vec::new()
        }
    }
}
