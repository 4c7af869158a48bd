//! Scoped in-place rewrites of files inside a repository checkout.
//!
//! A [`CheckoutGuard`] replaces a file with simulated content and puts the
//! original bytes back when dropped, so the checkout is restored on every
//! exit path, unwinding included.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Atomically replace `path` with `data` via a sibling temp file.
fn write_atomic(
    path: &Path,
    data: &[u8],
) -> Result<()>
{
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    // Preserve original permissions when the file exists
    let perms = fs::metadata(path).map(|m| m.permissions()).ok();

    let tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;

    let mut file = tmp.as_file();
    file.write_all(data)?;
    file.sync_all()?;

    if let Some(perms) = perms
    {
        fs::set_permissions(tmp.path(), perms).context("set temp permissions")?;
    }

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Holds a file in its simulated state until dropped.
#[derive(Debug)]
pub struct CheckoutGuard
{
    path: PathBuf,
    /// `None` when the file did not exist before the rewrite
    original: Option<Vec<u8>>,
    restored: bool,
}

impl CheckoutGuard
{
    /// Overwrite `path` with `content`, remembering what was there.
    pub fn rewrite(
        path: &Path,
        content: &str,
    ) -> Result<Self>
    {
        let original = match fs::read(path)
        {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };

        if original.is_none()
        {
            if let Some(parent) = path.parent()
            {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        write_atomic(path, content.as_bytes())?;
        debug!(path = %path.display(), "checkout file rewritten");
        Ok(Self { path: path.to_path_buf(), original, restored: false })
    }

    pub fn path(&self) -> &Path
    {
        &self.path
    }

    /// Put the original content back now and report failures.
    pub fn restore(mut self) -> Result<()>
    {
        self.restore_inner()
    }

    fn restore_inner(&mut self) -> Result<()>
    {
        if self.restored
        {
            return Ok(());
        }
        self.restored = true;

        match &self.original
        {
            Some(bytes) => write_atomic(&self.path, bytes),
            None => fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

impl Drop for CheckoutGuard
{
    fn drop(&mut self)
    {
        if let Err(e) = self.restore_inner()
        {
            warn!(path = %self.path.display(), error = %e, "failed to restore checkout file");
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::panic;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn drop_restores_original_bytes() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let file = tmp.path().join("Main.java");
        fs::write(&file, "class Main {}\n")?;

        {
            let guard = CheckoutGuard::rewrite(&file, "class Main { int x")?;
            assert_eq!(fs::read_to_string(guard.path())?, "class Main { int x");
        }
        assert_eq!(fs::read_to_string(&file)?, "class Main {}\n");
        Ok(())
    }

    #[test]
    fn new_file_is_removed_again() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let file = tmp.path().join("pkg/new.py");

        let guard = CheckoutGuard::rewrite(&file, "x = 1\n")?;
        assert!(file.exists());
        guard.restore()?;
        assert!(!file.exists());
        Ok(())
    }

    #[test]
    fn panics_still_restore() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let file = tmp.path().join("lib.rs");
        fs::write(&file, "fn a() {}\n")?;

        let target = file.clone();
        let outcome = panic::catch_unwind(move || {
            let _guard = CheckoutGuard::rewrite(&target, "fn a(").unwrap();
            panic!("request failed mid-way");
        });

        assert!(outcome.is_err());
        assert_eq!(fs::read_to_string(&file)?, "fn a() {}\n");
        Ok(())
    }
}
