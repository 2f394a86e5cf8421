use std::path::{Path, PathBuf};

use crate::error::Result;

/// How a discovered upload file lays out its documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// One document object, or an array of them.
    Json,
    /// One document object per line.
    JsonLines,
}

impl FileFormat {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(FileFormat::Json),
            "jsonl" | "ndjson" => Some(FileFormat::JsonLines),
            _ => None,
        }
    }
}

/// A discovered upload file.
#[derive(Debug, Clone)]
pub struct DiscoveredFile {
    /// Path relative to the walked root (or the file name for a single
    /// file).
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
    pub format: FileFormat,
}

/// Find document files under `root`.
///
/// `root` may be a directory, walked recursively, or a single file. Hidden
/// entries (names starting with `.`) are skipped, as are files whose
/// extension is not `.json`, `.jsonl` or `.ndjson`. Results are sorted by
/// relative path.
pub fn discover_files(root: &Path) -> Result<Vec<DiscoveredFile>> {
    let canonical_root = root.canonicalize()?;

    if canonical_root.is_file() {
        let format = FileFormat::from_path(&canonical_root).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "{} is not a .json, .jsonl or .ndjson file",
                    root.display()
                ),
            )
        })?;
        let relative_path = canonical_root
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| canonical_root.clone());
        return Ok(vec![DiscoveredFile {
            relative_path,
            absolute_path: canonical_root,
            format,
        }]);
    }

    let mut results = Vec::new();
    walk_dir(&canonical_root, &canonical_root, &mut results)?;
    results.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(results)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    results: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            walk_dir(root, &path, results)?;
        } else if file_type.is_symlink() {
            let Ok(resolved) = path.canonicalize() else {
                continue; // broken symlink
            };
            if resolved.is_file()
                && let Some(format) = FileFormat::from_path(&resolved)
            {
                results.push(discovered(root, &path, resolved, format));
            }
        } else if file_type.is_file()
            && let Some(format) = FileFormat::from_path(&path)
        {
            let absolute = path.canonicalize()?;
            results.push(discovered(root, &path, absolute, format));
        }
    }

    Ok(())
}

fn discovered(
    root: &Path,
    original_path: &Path,
    absolute_path: PathBuf,
    format: FileFormat,
) -> DiscoveredFile {
    let relative_path = original_path
        .strip_prefix(root)
        .unwrap_or(original_path)
        .to_path_buf();
    DiscoveredFile {
        relative_path,
        absolute_path,
        format,
    }
}
