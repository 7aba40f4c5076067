// ZIP extraction and input discovery

use std::fs::File;
use std::path::Path;

use tempfile::TempDir;

/// Directory entries never treated as inputs.
const IGNORED_DIRS: &[&str] = &["__MACOSX"];

/// A ZIP extracted into a temporary directory. The directory is removed on drop.
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
    files: Vec<String>,
}

impl ExtractedArchive {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Relative paths (`/`-separated) of every extracted file, sorted.
    pub fn files(&self) -> &[String] {
        &self.files
    }
}

/// Database file and source candidates found among extracted files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub database: Option<String>,
    pub sources: Vec<String>,
}

pub fn extract(zip_path: &Path) -> Result<ExtractedArchive, String> {
    let file = File::open(zip_path).map_err(|e| format!("Failed to open {}: {}", zip_path.display(), e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| format!("Not a valid ZIP archive: {}", e))?;

    let dir = tempfile::tempdir().map_err(|e| format!("Failed to create temp directory: {}", e))?;
    archive
        .extract(dir.path())
        .map_err(|e| format!("Failed to extract archive: {}", e))?;

    let files = walk(dir.path())?;
    log::debug!("extracted {} files to {}", files.len(), dir.path().display());
    Ok(ExtractedArchive { dir, files })
}

fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || IGNORED_DIRS.contains(&name)
}

/// Every regular file under `root`, as sorted relative paths.
pub fn walk(root: &Path) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    let mut pending = vec![String::new()];

    while let Some(rel) = pending.pop() {
        let dir = if rel.is_empty() { root.to_path_buf() } else { root.join(&rel) };
        let entries = std::fs::read_dir(&dir).map_err(|e| format!("Failed to list {}: {}", dir.display(), e))?;

        for entry in entries {
            let entry = entry.map_err(|e| format!("Failed to list {}: {}", dir.display(), e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_ignored(&name) {
                continue;
            }
            let child = if rel.is_empty() { name } else { format!("{}/{}", rel, name) };
            let file_type = entry.file_type().map_err(|e| format!("Failed to stat {}: {}", child, e))?;
            if file_type.is_dir() {
                pending.push(child);
            } else if file_type.is_file() {
                out.push(child);
            }
        }
    }

    out.sort();
    Ok(out)
}

/// Split files into the database (first name containing `marker`,
/// case-insensitive) and source candidates (everything without the marker).
pub fn discover(files: &[String], marker: &str) -> Discovery {
    let marker = marker.to_lowercase();
    let mut discovery = Discovery::default();

    for file in files {
        let name = glmatch_recon::filename::basename(file).to_lowercase();
        if !name.contains(&marker) {
            discovery.sources.push(file.clone());
        } else if discovery.database.is_none() {
            discovery.database = Some(file.clone());
        } else {
            log::debug!("ignoring extra database file {}", file);
        }
    }
    discovery
}
