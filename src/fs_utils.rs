//! Cross-platform filesystem utilities
//!
//! `atomic_rename` handles atomic file replacement (Windows requires an
//! explicit delete before renaming over an existing target).

use std::io;
use std::path::Path;

/// Cross-platform atomic rename that handles Windows file replacement.
///
/// On Unix, `fs::rename` atomically replaces the target if it exists.
/// On Windows, `fs::rename` fails if the target exists (needs `MOVEFILE_REPLACE_EXISTING`).
///
/// This function provides consistent behavior by deleting the target on Windows first.
///
/// # Errors
///
/// Returns an error if:
/// - The source file doesn't exist
/// - The target file exists and cannot be deleted (Windows only)
/// - The rename operation fails
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use scanrelay::fs_utils::atomic_rename;
///
/// // Write to temp file, then atomically replace target
/// std::fs::write("scanners.json.tmp", "[]")?;
/// atomic_rename(Path::new("scanners.json.tmp"), Path::new("scanners.json"))?;
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn atomic_rename(src: &Path, dst: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        // Windows requires explicit deletion before rename if target exists
        if dst.exists() {
            std::fs::remove_file(dst)?;
        }
    }
    std::fs::rename(src, dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_atomic_rename_creates_file() {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let src = temp_dir.path().join("source.txt");
        let dst = temp_dir.path().join("dest.txt");

        fs::write(&src, "test content").expect("Failed to write source");

        atomic_rename(&src, &dst).expect("Failed to rename");

        assert!(!src.exists(), "Source should not exist after rename");
        assert!(dst.exists(), "Dest should exist after rename");
        assert_eq!(
            fs::read_to_string(&dst).unwrap(),
            "test content",
            "Content should match"
        );
    }

    #[test]
    fn test_atomic_rename_replaces_existing() {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let src = temp_dir.path().join("new.txt");
        let dst = temp_dir.path().join("existing.txt");

        fs::write(&dst, "old content").expect("Failed to write dest");
        fs::write(&src, "new content").expect("Failed to write source");

        atomic_rename(&src, &dst).expect("Failed to rename over existing");

        assert!(!src.exists(), "Source should not exist after rename");
        assert_eq!(
            fs::read_to_string(&dst).unwrap(),
            "new content",
            "Content should be replaced"
        );
    }
}
