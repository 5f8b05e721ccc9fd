use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Recursively copy `src` into `dst`, skipping any entry under `exclude`.
///
/// Returns the number of files copied. Symlinks are recreated on Unix and
/// followed elsewhere.
pub fn copy_dir(src: &Path, dst: &Path, exclude: &[PathBuf]) -> io::Result<u64> {
    let mut copied = 0;
    fs::create_dir_all(dst)?;

    let walker = WalkDir::new(src)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !exclude.iter().any(|x| e.path().starts_with(x)));

    for entry in walker {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(io::Error::other)?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
        copied += 1;
    }
    Ok(copied)
}

/// Recreate the link at `src` as `dst`, replacing whatever `dst` holds.
#[cfg(unix)]
pub(crate) fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let link = fs::read_link(src)?;
    if dst.symlink_metadata().is_ok() {
        fs::remove_file(dst)?;
    }
    std::os::unix::fs::symlink(link, dst)
}

#[cfg(not(unix))]
pub(crate) fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    fs::copy(src, dst).map(|_| ())
}

/// Replace `root` with fresh contents produced by `fill`, keeping a copy of
/// the previous contents at `backup` until the swap succeeds.
///
/// If `fill` fails, the partial `root` is removed and the backup is renamed
/// back in place. The returned error is always the fill error; a failed
/// rollback is reported through [`SwapError::rollback`].
pub fn swap_directory<F>(root: &Path, backup: &Path, fill: F) -> Result<(), SwapError>
where
    F: FnOnce(&Path) -> io::Result<()>,
{
    if backup.exists() {
        fs::remove_dir_all(backup).map_err(SwapError::prepare)?;
    }
    let had_root = root.exists();
    if had_root {
        copy_dir(root, backup, &[]).map_err(SwapError::prepare)?;
    }

    let swapped = (|| {
        if root.exists() {
            fs::remove_dir_all(root)?;
        }
        fill(root)
    })();

    match swapped {
        Ok(()) => {
            if had_root {
                if let Err(e) = fs::remove_dir_all(backup) {
                    tracing::warn!(
                        "Failed to remove temporary backup {}: {}",
                        backup.display(),
                        e
                    );
                }
            }
            Ok(())
        }
        Err(cause) => {
            let rollback = (|| {
                if root.exists() {
                    fs::remove_dir_all(root)?;
                }
                if had_root {
                    fs::rename(backup, root)?;
                }
                Ok::<(), io::Error>(())
            })();
            Err(SwapError {
                cause,
                rollback: rollback.err(),
            })
        }
    }
}

/// Failure of [`swap_directory`].
#[derive(Debug)]
pub struct SwapError {
    pub cause: io::Error,
    /// Set when restoring the backup also failed.
    pub rollback: Option<io::Error>,
}

impl SwapError {
    fn prepare(cause: io::Error) -> Self {
        Self {
            cause,
            rollback: None,
        }
    }
}

/// Write `contents` to `path` through a temporary file and rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
