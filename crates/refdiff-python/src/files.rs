//! Python file collection utilities.
//!
//! Provides revision file discovery for the model assembler.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;
use walkdir::WalkDir;

// ============================================================================
// Error Types
// ============================================================================

/// Error type for file operations.
#[derive(Debug, Error)]
pub enum FileError {
    /// Revision root not found.
    #[error("file not found: {path}")]
    NotFound { path: String },

    /// A file under the root could not be read.
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Result type for file operations.
pub type FileResult<T> = Result<T, FileError>;

/// Directory names never descended into.
const EXCLUDED_DIRS: &[&str] = &["__pycache__", "node_modules", "venv", "target"];

// ============================================================================
// File Collection
// ============================================================================

/// Collect Python files by walking a revision root.
///
/// Skips hidden directories (`.git`, `.venv`, `.tox`, ...) and the usual
/// build and environment directories. Returns `(relative_path, content)`
/// pairs sorted by path; paths always use `/` as separator.
///
/// # Example
///
/// ```ignore
/// let files = collect_python_files(Path::new("old/"))?;
/// for (path, content) in files {
///     println!("{}: {} bytes", path, content.len());
/// }
/// ```
pub fn collect_python_files(root: &Path) -> FileResult<Vec<(String, String)>> {
    if !root.is_dir() {
        return Err(FileError::NotFound {
            path: root.display().to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        // Filter on the root-relative path only; the root itself may live in
        // a hidden temp directory.
        let rel_path = match path.strip_prefix(root) {
            Ok(p) => p,
            Err(_) => continue,
        };

        if rel_path.components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            name.starts_with('.') || EXCLUDED_DIRS.contains(&name.as_ref())
        }) {
            continue;
        }

        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "py") {
            continue;
        }

        let rel_path_str = rel_path
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let content = fs::read_to_string(path).map_err(|source| FileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        files.push((rel_path_str, content));
    }

    // Sorted so model type ids are stable across runs.
    files.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(files)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn collects_sorted_relative_paths() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "pkg/b.py", "x = 1\n");
        write(temp.path(), "a.py", "y = 2\n");
        write(temp.path(), "pkg/__init__.py", "");

        let files = collect_python_files(temp.path()).unwrap();
        let paths: Vec<&str> = files.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["a.py", "pkg/__init__.py", "pkg/b.py"]);
        assert_eq!(files[0].1, "y = 2\n");
    }

    #[test]
    fn skips_excluded_directories_and_other_files() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "keep.py", "");
        write(temp.path(), ".git/hooks/x.py", "");
        write(temp.path(), ".venv/lib/site.py", "");
        write(temp.path(), "__pycache__/keep.py", "");
        write(temp.path(), "venv/lib/os.py", "");
        write(temp.path(), "notes.txt", "");

        let files = collect_python_files(temp.path()).unwrap();
        let paths: Vec<&str> = files.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["keep.py"]);
    }

    #[test]
    fn unreadable_file_reports_its_path() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("latin1.py"),
            [0x63, 0x61, 0x66, 0xe9, 0x0a],
        )
        .unwrap();

        let err = collect_python_files(temp.path()).unwrap_err();
        assert!(
            matches!(&err, FileError::Io { path, .. } if path.ends_with("latin1.py")),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn missing_root_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = collect_python_files(&temp.path().join("absent")).unwrap_err();
        assert!(matches!(err, FileError::NotFound { .. }));
    }
}
