//! File-format helpers: accepted extensions, export naming and the
//! local-vs-remote routing predicate.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SpatialError, SpatialResult};

/// Sources at or above this size are sent to the remote converter.
pub const LOCAL_SIZE_LIMIT: u64 = 10 * 1024 * 1024;

/// Extensions accepted as conversion input (lowercase, no dot).
pub const SUPPORTED_INPUT_EXTENSIONS: [&str; 6] = ["aac", "flac", "m4a", "mp3", "ogg", "wav"];

/// Extensions the local renderer can write.
pub const SUPPORTED_OUTPUT_EXTENSIONS: [&str; 1] = ["wav"];

/// Container name for a requested export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Wav,
    Mp3,
    Mp4,
    Flac,
    Ogg,
}

impl ExportFormat {
    /// Map an extension (with or without the dot, any case). `m4a` exports
    /// as an mp4 container; anything unknown falls back to wav.
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "mp3" => ExportFormat::Mp3,
            "m4a" | "mp4" => ExportFormat::Mp4,
            "flac" => ExportFormat::Flac,
            "ogg" => ExportFormat::Ogg,
            _ => ExportFormat::Wav,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::from_extension(&extension_of(path.as_ref()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Mp4 => "mp4",
            ExportFormat::Flac => "flac",
            ExportFormat::Ogg => "ogg",
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Whether a source of `size_bytes` fits the local processing budget.
pub fn fits_local_budget(size_bytes: u64) -> bool {
    size_bytes < LOCAL_SIZE_LIMIT
}

/// Route to the in-process renderer only for small sources exported as WAV.
pub fn should_process_locally(size_bytes: u64, target: ExportFormat) -> bool {
    fits_local_budget(size_bytes) && target == ExportFormat::Wav
}

/// Check that `path` is an existing file with a supported audio extension.
pub fn validate_input_path(path: impl AsRef<Path>) -> SpatialResult<()> {
    let path = path.as_ref();
    let meta = std::fs::metadata(path).map_err(|e| {
        SpatialError::Io(io::Error::new(
            e.kind(),
            format!("input file not found: '{}'", path.display()),
        ))
    })?;
    if !meta.is_file() {
        return Err(SpatialError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("input path is not a file: '{}'", path.display()),
        )));
    }

    let ext = extension_of(path);
    if !SUPPORTED_INPUT_EXTENSIONS.contains(&ext.as_str()) {
        return Err(SpatialError::UnsupportedFormat(format!(
            "input '.{ext}'; supported: {}",
            SUPPORTED_INPUT_EXTENSIONS.map(|e| format!(".{e}")).join(", ")
        )));
    }
    Ok(())
}

/// Check that `path` ends in `.wav` and its parent directory exists.
pub fn validate_output_path(path: impl AsRef<Path>) -> SpatialResult<()> {
    let path = path.as_ref();
    let ext = extension_of(path);
    if !SUPPORTED_OUTPUT_EXTENSIONS.contains(&ext.as_str()) {
        return Err(SpatialError::UnsupportedFormat(format!(
            "output must be a .wav file, got '.{ext}'"
        )));
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return Ok(()),
    };
    if !parent.is_dir() {
        return Err(SpatialError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("output directory does not exist: '{}'", parent.display()),
        )));
    }
    Ok(())
}

/// `song.mp3` → `song_8d.wav`, keeping the directory.
pub fn output_path_for(input: impl AsRef<Path>) -> PathBuf {
    output_path_with(input, "_8d", ExportFormat::Wav)
}

pub fn output_path_with(input: impl AsRef<Path>, suffix: &str, format: ExportFormat) -> PathBuf {
    let input = input.as_ref();
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("output");
    let ext = match format {
        ExportFormat::Mp4 => "m4a",
        other => other.as_str(),
    };
    input.with_file_name(format!("{stem}{suffix}.{ext}"))
}
