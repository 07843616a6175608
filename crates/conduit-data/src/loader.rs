//! Format detection, file discovery and deserialization for definition files.
//!
//! Definitions and configs may be written in RON, TOML or JSON. The format is
//! picked from the file extension; a base name present in more than one
//! format is rejected rather than guessed.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

// ===========================================================================
// Errors
// ===========================================================================

/// Failures while locating or parsing a definition or config file.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The extension is not one of `ron`, `toml` or `json`.
    #[error("{file}: expected a .ron, .toml or .json file")]
    UnsupportedFormat { file: PathBuf },

    /// The same base name exists in two formats; neither is preferred.
    #[error("ambiguous data file: both {a} and {b} exist")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("no '{base_name}' data file in {dir}")]
    Missing { base_name: String, dir: PathBuf },

    #[error("{file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("reading data file: {0}")]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Text formats a data file may use, picked by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    Format::ALL
        .into_iter()
        .find(|f| f.extension() == ext)
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Find `{base_name}.{ron,toml,json}` in `dir`. `Ok(None)` if absent,
/// `ConflictingFormats` if more than one exists.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut candidates = Format::ALL
        .into_iter()
        .map(|f| dir.join(format!("{base_name}.{}", f.extension())))
        .filter(|p| p.is_file());
    let first = candidates.next();
    match (first, candidates.next()) {
        (Some(a), Some(b)) => Err(DataLoadError::ConflictingFormats { a, b }),
        (first, _) => Ok(first),
    }
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::Missing {
        base_name: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Parse `content` as `format`. `file` is only used in error messages.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    file: &Path,
) -> Result<T, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        file: file.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string())),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let text = std::fs::read_to_string(path)?;
    deserialize_str(&text, format, path)
}
