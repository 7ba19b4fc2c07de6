//! Teardown actions for staged source files and build directories.

use std::fs;
use std::io;
use std::path::PathBuf;

/// Filesystem action releasing the temporary resources of one run attempt.
///
/// The staging step records what it created here, and [`Cleanup::run`] is the
/// only interpreter. Running a cleanup twice, or after the path has already
/// disappeared, is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    /// Nothing to release.
    None,
    /// Delete a single staged script file.
    File(PathBuf),
    /// Delete a build directory and everything in it.
    Dir(PathBuf),
}

impl Cleanup {
    /// Releases the resource described by this action.
    pub fn run(&self) -> io::Result<()> {
        match self {
            Cleanup::None => Ok(()),
            Cleanup::File(path) => {
                if path.exists() {
                    fs::remove_file(path)
                } else {
                    Ok(())
                }
            }
            Cleanup::Dir(path) => {
                if path.exists() {
                    fs::remove_dir_all(path)
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_noop() {
        assert!(Cleanup::None.run().is_ok());
    }

    #[test]
    fn test_file_cleanup_removes_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (_, path) = file.keep().unwrap();
        assert!(path.exists());

        let cleanup = Cleanup::File(path.clone());
        cleanup.run().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_dir_cleanup_removes_contents() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.keep();
        fs::write(path.join("main.c"), "int main() { return 0; }").unwrap();

        let cleanup = Cleanup::Dir(path.clone());
        cleanup.run().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let (_, path) = file.keep().unwrap();

        let cleanup = Cleanup::File(path);
        cleanup.run().unwrap();
        // Second run finds nothing to delete and succeeds.
        cleanup.run().unwrap();
    }

    #[test]
    fn test_missing_path_is_ok() {
        let cleanup = Cleanup::Dir(PathBuf::from("/nonexistent/polyrun-test-dir"));
        assert!(cleanup.run().is_ok());
    }
}
