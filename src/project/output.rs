//! Output naming and the compressed Live set writer.

use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::config::OutputConfig;
use crate::error::OutputError;
use crate::template::tree::Element;

/// Name used when sanitizing leaves nothing
pub const UNNAMED_FILE: &str = "unnamed_file";

/// Replace characters that are invalid in file names on common platforms
pub fn replace_unsafe_chars(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Make a file name safe, capped at `max_len` characters with the extension kept
pub fn sanitize_name(name: &str, max_len: usize) -> String {
    if name.is_empty() {
        return UNNAMED_FILE.to_string();
    }

    let mut safe = replace_unsafe_chars(name);

    if safe.chars().count() > max_len {
        let (stem, ext) = split_extension(&safe);
        let keep = max_len.saturating_sub(ext.chars().count());
        safe = stem.chars().take(keep).chain(ext.chars()).collect();
    }

    let safe = safe.trim();
    if safe.is_empty() {
        UNNAMED_FILE.to_string()
    } else {
        safe.to_string()
    }
}

/// Split `name.ext` into `("name", ".ext")`; a leading dot is not an extension
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(index) if index > 0 => name.split_at(index),
        _ => (name, ""),
    }
}

/// `<prefix>_<YYYYmmdd_HHMM>` in local time
pub fn default_project_name(prefix: &str) -> String {
    format!("{}_{}", prefix, Local::now().format("%Y%m%d_%H%M"))
}

/// Sanitized project file name carrying the Live set extension
pub fn project_file_name(project_name: Option<&str>, config: &OutputConfig) -> String {
    let name = match project_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => default_project_name(&config.default_name_prefix),
    };

    let extension = format!(".{}", config.extension.trim_start_matches('.'));
    let mut file_name = sanitize_name(&name, config.max_name_length);
    if !file_name.ends_with(&extension) {
        file_name.push_str(&extension);
    }
    file_name
}

/// Decide where the Live set is written
///
/// Without an output path the set goes into `<input_dir>/<subdirectory>/`. An
/// output path ending in the Live set extension names the file itself; any
/// other output path is a directory. Taken names get `_001`, `_002`, ...
pub fn resolve_output_path(
    input_dir: &Path,
    output: Option<&Path>,
    project_name: Option<&str>,
    config: &OutputConfig,
) -> Result<PathBuf, OutputError> {
    let file_name = project_file_name(project_name, config);
    let extension = format!(".{}", config.extension.trim_start_matches('.'));

    let target = match output {
        None => input_dir.join(&config.subdirectory).join(&file_name),
        Some(path) if path.to_string_lossy().ends_with(&extension) => path.to_path_buf(),
        Some(dir) => dir.join(&file_name),
    };

    find_free_path(target, config.max_collision_attempts)
}

/// First of `path`, `stem_001.ext`, ... `stem_<max>.ext` that does not exist yet
pub fn find_free_path(path: PathBuf, max_attempts: u32) -> Result<PathBuf, OutputError> {
    if !path.exists() {
        return Ok(path);
    }

    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = path
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    for counter in 1..=max_attempts {
        let candidate = parent.join(format!("{}_{:03}{}", stem, counter, suffix));
        if !candidate.exists() {
            debug!("{} exists, using {}", path.display(), candidate.display());
            return Ok(candidate);
        }
    }

    Err(OutputError::NameExhausted {
        path: path.display().to_string(),
        attempts: max_attempts,
    })
}

/// Write the document gzip-compressed to `path`, returning the file size
///
/// The data goes to a temporary file in the target directory first, which is
/// then moved into place without overwriting anything. A failure leaves no
/// file at `path`.
pub fn write_live_set(root: &Element, path: &Path) -> Result<u64, OutputError> {
    let failed = |reason: String| OutputError::WriteFailed {
        path: path.display().to_string(),
        reason,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| failed(e.to_string()))?;

    let mut temp = NamedTempFile::new_in(&parent).map_err(|e| failed(e.to_string()))?;
    {
        let mut encoder = GzEncoder::new(BufWriter::new(temp.as_file_mut()), Compression::default());
        encoder
            .write_all(root.to_document_string().as_bytes())
            .map_err(|e| failed(e.to_string()))?;
        encoder
            .finish()
            .and_then(|mut inner| inner.flush())
            .map_err(|e| failed(e.to_string()))?;
    }

    temp.persist_noclobber(path).map_err(|e| failed(e.error.to_string()))?;

    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    info!("✅ Live set written: {} ({} bytes)", path.display(), size);
    Ok(size)
}
