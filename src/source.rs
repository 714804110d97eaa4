//! Score payload fetching and container extraction.
//!
//! Score documents arrive either as plain markup text or packaged inside a
//! ZIP container (the compressed interchange format). Format detection uses
//! the container magic bytes, so callers never need to know which one they
//! were handed.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::error::{EngineError, Result};
use crate::ports::ScoreSource;

/// Path of the container manifest naming the root document.
const CONTAINER_MANIFEST: &str = "META-INF/container.xml";

/// Fetches a score through a [`ScoreSource`] and extracts its markup text.
///
/// On any failure the engine state is untouched; the caller may retry with
/// the same reference.
pub fn fetch_document(source: &mut dyn ScoreSource, reference: &str) -> Result<String> {
    let bytes = source.fetch(reference)?;
    extract_document(&bytes)
}

/// Extracts the markup text from raw score bytes.
///
/// ZIP containers (magic bytes `PK\x03\x04`) are unpacked; anything else is
/// treated as plain UTF-8 markup.
///
/// # Errors
///
/// Returns [`EngineError::SourceUnavailable`] when the container cannot be
/// read, and [`EngineError::MalformedDocument`] when the payload is not
/// valid UTF-8.
pub fn extract_document(data: &[u8]) -> Result<String> {
    if data.len() >= 4 && &data[0..2] == b"PK" {
        return extract_zip(data);
    }

    String::from_utf8(data.to_vec())
        .map_err(|e| EngineError::MalformedDocument(format!("document is not UTF-8: {e}")))
}

/// Unpacks the score markup from a ZIP container.
///
/// The container manifest (`META-INF/container.xml`) names the root document
/// when present; otherwise the first markup entry outside `META-INF/` is
/// taken.
fn extract_zip(data: &[u8]) -> Result<String> {
    let cursor = Cursor::new(data);
    let mut archive = ZipArchive::new(cursor)
        .map_err(|e| EngineError::SourceUnavailable(format!("not a valid container: {e}")))?;

    let root_path = locate_root_document(&mut archive)?;

    let mut file = archive
        .by_name(&root_path)
        .map_err(|e| EngineError::SourceUnavailable(format!("cannot read '{root_path}': {e}")))?;

    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|e| EngineError::MalformedDocument(format!("document is not UTF-8: {e}")))?;
    Ok(text)
}

/// Resolves the container entry holding the score markup.
fn locate_root_document(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<String> {
    if let Ok(mut manifest) = archive.by_name(CONTAINER_MANIFEST) {
        let mut text = String::new();
        if manifest.read_to_string(&mut text).is_ok() {
            if let Some(path) = rootfile_full_path(&text) {
                return Ok(path);
            }
        }
        log::debug!("container manifest present but no rootfile path found");
    }

    let names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .collect();

    names
        .into_iter()
        .find(|name| {
            !name.starts_with("META-INF/")
                && (name.ends_with(".xml") || name.ends_with(".musicxml"))
        })
        .ok_or_else(|| {
            EngineError::SourceUnavailable("container holds no score document".to_string())
        })
}

/// Pulls the `full-path` attribute out of a container manifest.
///
/// The manifest is tiny and fixed-shape, so a targeted attribute scan is
/// enough; the real markup parser is reserved for the score itself.
fn rootfile_full_path(manifest: &str) -> Option<String> {
    let marker = "full-path=\"";
    let start = manifest.find(marker)? + marker.len();
    let rest = &manifest[start..];
    let end = rest.find('"')?;
    let path = &rest[..end];
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}
