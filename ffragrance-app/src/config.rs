use anyhow::{Context, Result};
use ffragrance_core::Library;
use ffragrance_schemas::file_formats::{LibraryFile, LIBRARY_SCHEMA_VERSION};
use std::{fs, path::Path};
use tracing::{debug, info, warn};

/// Loads the library document at `path`. A missing file is an empty library,
/// so the first mutating command creates it.
pub fn load_library(path: &Path) -> Result<Library> {
    if !path.exists() {
        info!(path = %path.display(), "no library file yet, starting empty");
        return Ok(Library::new());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read library file: {:?}", path))?;
    let file: LibraryFile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse YAML from {:?}", path))?;

    if file.schema_version != LIBRARY_SCHEMA_VERSION {
        warn!(
            found = %file.schema_version,
            expected = LIBRARY_SCHEMA_VERSION,
            "library schema version differs, loading anyway"
        );
    }

    let library = Library::from_file(file)
        .with_context(|| format!("Library file {:?} is inconsistent", path))?;
    debug!(path = %path.display(), "library file read");
    Ok(library)
}

/// Writes the library as YAML. The document goes to a sibling temp file
/// first and is renamed over the target.
pub fn save_library(path: &Path, library: &Library) -> Result<()> {
    let content = serde_yaml::to_string(&library.to_file())
        .context("Failed to serialise library")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    let staging = path.with_extension("yaml.tmp");
    fs::write(&staging, content)
        .with_context(|| format!("Failed to write library file: {:?}", staging))?;
    fs::rename(&staging, path)
        .with_context(|| format!("Failed to replace library file: {:?}", path))?;

    debug!(path = %path.display(), "library saved");
    Ok(())
}
