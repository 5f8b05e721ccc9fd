use std::path::{Path, PathBuf};
use std::process::Stdio;

use venom_types::{Result, VenomError};

/// Thin async wrapper around the `git` CLI for one working tree.
#[derive(Debug, Clone)]
pub struct GitWorkspace {
    root: PathBuf,
    binary: String,
}

impl GitWorkspace {
    pub fn new(root: impl Into<PathBuf>, binary: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            binary: binary.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>> {
        let command = format!("git {}", args.join(" "));
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| VenomError::Git {
                command: command.clone(),
                message: format!("failed to spawn: {e}"),
            })?;

        if !output.status.success() {
            return Err(VenomError::Git {
                command,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Absolute path of the repository's top-level directory.
    pub async fn toplevel(&self) -> Result<PathBuf> {
        let out = self.run(&["rev-parse", "--show-toplevel"]).await?;
        Ok(PathBuf::from(String::from_utf8_lossy(&out).trim()))
    }

    /// Binary diff of the working tree and index against `HEAD`.
    pub async fn diff_head(&self) -> Result<Vec<u8>> {
        self.run(&["diff", "HEAD", "--binary"]).await
    }

    /// `git status --porcelain` output.
    pub async fn status_porcelain(&self) -> Result<String> {
        let out = self.run(&["status", "--porcelain"]).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Untracked, non-ignored files relative to the repository root.
    pub async fn untracked_files(&self) -> Result<Vec<PathBuf>> {
        let out = self
            .run(&["ls-files", "--others", "--exclude-standard", "--full-name", "-z"])
            .await?;
        Ok(split_nul_paths(&out))
    }

    /// Discard every change to tracked files.
    pub async fn reset_hard(&self) -> Result<()> {
        self.run(&["reset", "--hard", "HEAD"]).await.map(|_| ())
    }

    pub async fn apply(&self, patch: &Path) -> Result<()> {
        let patch = patch.to_string_lossy().into_owned();
        self.run(&["apply", "--binary", "--whitespace=nowarn", &patch])
            .await
            .map(|_| ())
    }
}

/// Split NUL-terminated `git -z` output into paths without re-encoding.
fn split_nul_paths(out: &[u8]) -> Vec<PathBuf> {
    out.split(|b| *b == 0)
        .filter(|s| !s.is_empty())
        .map(path_from_bytes)
        .collect()
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}
