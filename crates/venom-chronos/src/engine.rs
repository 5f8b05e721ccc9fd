use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use venom_types::{
    CHECKPOINT_ID_LEN, Checkpoint, EnvSnapshot, MAIN_TIMELINE, Result, SideEffect, VenomError,
};

use crate::config::ChronosConfig;
use crate::fsutil::{copy_dir, copy_symlink, swap_directory, write_atomic};
use crate::git::GitWorkspace;

pub const METADATA_FILE: &str = "checkpoint.json";
pub const DIFF_FILE: &str = "fs_diff.patch";
pub const STATUS_FILE: &str = "git_status.txt";
pub const ENV_FILE: &str = "env_config.json";
pub const MEMORY_DIR: &str = "memory_dump";
pub const UNTRACKED_DIR: &str = "untracked";

const MAX_TIMELINE_NAME_LEN: usize = 128;
const ID_ATTEMPTS: usize = 4;

/// Result of a successful checkpoint capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointReceipt {
    pub checkpoint: Checkpoint,
    pub memory_backup: SideEffect,
}

/// Durable checkpoint/restore over timelines.
///
/// Assumes a single writer per timelines directory.
pub struct ChronosEngine {
    config: ChronosConfig,
    git: GitWorkspace,
}

impl ChronosEngine {
    /// Create the engine and make sure the main timeline exists.
    ///
    /// The timelines directory must live outside the memory root, since a
    /// restore replaces the memory root wholesale.
    pub fn new(config: ChronosConfig) -> Result<Self> {
        let timelines = absolute(&config.timelines_dir);
        let memory = absolute(&config.memory_root);
        if timelines.starts_with(&memory) {
            return Err(VenomError::InvalidConfig(format!(
                "timelines dir {} is inside memory root {}",
                timelines.display(),
                memory.display()
            )));
        }
        fs::create_dir_all(config.timelines_dir.join(MAIN_TIMELINE))?;
        let git = GitWorkspace::new(&config.workspace_root, &config.git_binary);
        tracing::info!(
            "Chronos initialised at {} (workspace {}, memory {})",
            config.timelines_dir.display(),
            config.workspace_root.display(),
            config.memory_root.display()
        );
        Ok(Self { config, git })
    }

    pub fn config(&self) -> &ChronosConfig {
        &self.config
    }

    pub fn timeline_dir(&self, timeline: &str) -> PathBuf {
        self.config.timelines_dir.join(timeline)
    }

    pub async fn create_checkpoint(
        &self,
        name: &str,
        description: &str,
        timeline: &str,
    ) -> Result<String> {
        self.create_checkpoint_with_receipt(name, description, timeline)
            .await
            .map(|r| r.checkpoint.checkpoint_id)
    }

    /// Capture workspace, memory and environment into a new checkpoint.
    ///
    /// Any failure other than the memory dump removes the partially written
    /// checkpoint directory before the error is returned.
    pub async fn create_checkpoint_with_receipt(
        &self,
        name: &str,
        description: &str,
        timeline: &str,
    ) -> Result<CheckpointReceipt> {
        validate_timeline_name(timeline)?;
        let timeline_dir = self.timeline_dir(timeline);
        fs::create_dir_all(&timeline_dir)?;

        let (checkpoint, dir) = allocate_checkpoint(&timeline_dir, name, description)?;
        let id = checkpoint.checkpoint_id.clone();

        match self.capture(checkpoint, &dir, timeline).await {
            Ok(receipt) => {
                tracing::info!("Created checkpoint {} ('{}') on timeline {}", id, name, timeline);
                Ok(receipt)
            }
            Err(e) => {
                tracing::error!("Checkpoint {} on {} failed, cleaning up: {}", id, timeline, e);
                if let Err(cleanup) = fs::remove_dir_all(&dir) {
                    tracing::warn!("Failed to remove partial checkpoint {}: {}", dir.display(), cleanup);
                }
                Err(e)
            }
        }
    }

    async fn capture(
        &self,
        checkpoint: Checkpoint,
        dir: &Path,
        timeline: &str,
    ) -> Result<CheckpointReceipt> {
        let repo = GitWorkspace::new(self.git.toplevel().await?, &self.config.git_binary);

        let diff = repo.diff_head().await?;
        fs::write(dir.join(DIFF_FILE), &diff)?;
        let status = repo.status_porcelain().await?;
        fs::write(dir.join(STATUS_FILE), &status)?;

        let untracked = self.capture_untracked(&repo, &dir.join(UNTRACKED_DIR)).await?;

        let memory_backup = self.backup_memory(&dir.join(MEMORY_DIR));

        let env = EnvSnapshot::capture(&self.config.env_keys);
        fs::write(dir.join(ENV_FILE), serde_json::to_vec_pretty(&env)?)?;

        let checkpoint = checkpoint
            .with_metadata("timeline", timeline.into())
            .with_metadata(
                "workspace_root",
                self.config.workspace_root.display().to_string().into(),
            )
            .with_metadata(
                "memory_root",
                self.config.memory_root.display().to_string().into(),
            )
            .with_metadata("diff_sha256", sha256_hex(&diff).into())
            .with_metadata("untracked_files", untracked.into())
            .with_metadata("memory_backup", serde_json::to_value(&memory_backup)?);

        write_atomic(&dir.join(METADATA_FILE), &serde_json::to_vec_pretty(&checkpoint)?)?;

        Ok(CheckpointReceipt {
            checkpoint,
            memory_backup,
        })
    }

    async fn capture_untracked(&self, repo: &GitWorkspace, target: &Path) -> Result<u64> {
        let excluded = self.excluded_roots();
        let mut count = 0;
        for rel in repo.untracked_files().await? {
            let src = repo.root().join(&rel);
            if excluded.iter().any(|x| src.starts_with(x)) {
                continue;
            }
            let dst = target.join(&rel);
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            if fs::symlink_metadata(&src)?.file_type().is_symlink() {
                copy_symlink(&src, &dst)?;
            } else {
                fs::copy(&src, &dst)?;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Best-effort copy of the memory root.
    fn backup_memory(&self, target: &Path) -> SideEffect {
        let root = &self.config.memory_root;
        if !root.exists() {
            tracing::warn!("Memory root {} missing, checkpoint has no memory dump", root.display());
            return SideEffect::degraded("memory root missing");
        }
        let timelines = absolute(&self.config.timelines_dir);
        match copy_dir(root, target, &[timelines]) {
            Ok(files) => {
                tracing::debug!("Backed up {} memory files", files);
                SideEffect::Ok
            }
            Err(e) => {
                tracing::warn!("Memory backup failed, continuing without it: {}", e);
                let _ = fs::remove_dir_all(target);
                SideEffect::degraded(format!("memory backup failed: {e}"))
            }
        }
    }

    /// Restore a checkpoint. Returns `Ok(false)` when it does not exist.
    ///
    /// Uncommitted workspace changes are discarded. The environment snapshot
    /// is only reported; applying it requires a process restart.
    pub async fn restore_checkpoint(&self, checkpoint_id: &str, timeline: &str) -> Result<bool> {
        validate_timeline_name(timeline)?;
        let Some((checkpoint, dir)) = self.find_checkpoint(checkpoint_id, timeline)? else {
            tracing::warn!("Checkpoint {} not found on timeline {}", checkpoint_id, timeline);
            return Ok(false);
        };

        let patch = dir.join(DIFF_FILE);
        let diff = fs::read(&patch)?;
        verify_digest(&checkpoint, &diff)?;

        tracing::info!(
            "Restoring checkpoint {} ('{}') from timeline {}",
            checkpoint_id,
            checkpoint.name,
            timeline
        );

        self.restore_workspace(&dir, &patch, diff.is_empty()).await?;

        let dump = dir.join(MEMORY_DIR);
        if dump.is_dir() {
            self.restore_memory(&dump, checkpoint_id)?;
        } else {
            tracing::warn!("Checkpoint {} has no memory dump; memory left untouched", checkpoint_id);
        }

        match self.read_env(&dir) {
            Ok(env) => tracing::info!(
                "Environment snapshot from {} (not applied, restart to use): {:?}",
                env.timestamp,
                env.settings
            ),
            Err(e) => tracing::warn!("Environment snapshot unreadable: {}", e),
        }

        Ok(true)
    }

    async fn restore_workspace(&self, dir: &Path, patch: &Path, empty_patch: bool) -> Result<()> {
        let repo = GitWorkspace::new(self.git.toplevel().await?, &self.config.git_binary);

        let dirty = repo.status_porcelain().await?;
        // Untracked files survive a hard reset; only tracked changes are lost.
        let dirty: Vec<&str> = dirty.lines().filter(|l| !l.starts_with("??")).collect();
        if !dirty.is_empty() {
            tracing::warn!(
                "DISCARDING {} uncommitted change(s) in {} to restore checkpoint",
                dirty.len(),
                repo.root().display()
            );
        }

        repo.reset_hard().await?;
        if empty_patch {
            tracing::debug!("Empty workspace diff, nothing to apply");
        } else {
            repo.apply(patch).await?;
        }

        let untracked = dir.join(UNTRACKED_DIR);
        if untracked.is_dir() {
            copy_dir(&untracked, repo.root(), &[])?;
        }
        Ok(())
    }

    fn restore_memory(&self, dump: &Path, checkpoint_id: &str) -> Result<()> {
        let root = &self.config.memory_root;
        let backup = restore_backup_path(root, checkpoint_id);

        swap_directory(root, &backup, |r| copy_dir(dump, r, &[]).map(|_| ())).map_err(|e| {
            match &e.rollback {
                None => tracing::error!(
                    "Memory restore failed, previous memory rolled back: {}",
                    e.cause
                ),
                Some(rb) => tracing::error!(
                    "Memory restore failed and rollback failed ({}); previous memory kept at {}",
                    rb,
                    backup.display()
                ),
            }
            VenomError::RestoreFailed(format!("memory swap: {}", e.cause))
        })
    }

    /// Stored environment snapshot of a checkpoint.
    pub fn environment_snapshot(
        &self,
        checkpoint_id: &str,
        timeline: &str,
    ) -> Result<Option<EnvSnapshot>> {
        match self.find_checkpoint(checkpoint_id, timeline)? {
            Some((_, dir)) => self.read_env(&dir).map(Some),
            None => Ok(None),
        }
    }

    fn read_env(&self, dir: &Path) -> Result<EnvSnapshot> {
        let bytes = fs::read(dir.join(ENV_FILE))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn get_checkpoint(&self, checkpoint_id: &str, timeline: &str) -> Result<Option<Checkpoint>> {
        Ok(self.find_checkpoint(checkpoint_id, timeline)?.map(|(cp, _)| cp))
    }

    fn find_checkpoint(
        &self,
        checkpoint_id: &str,
        timeline: &str,
    ) -> Result<Option<(Checkpoint, PathBuf)>> {
        if !is_valid_checkpoint_id(checkpoint_id) || validate_timeline_name(timeline).is_err() {
            return Ok(None);
        }
        let dir = self.timeline_dir(timeline).join(checkpoint_id);
        let meta = dir.join(METADATA_FILE);
        if !meta.is_file() {
            return Ok(None);
        }
        let checkpoint: Checkpoint = serde_json::from_slice(&fs::read(&meta)?)?;
        Ok(Some((checkpoint, dir)))
    }

    /// Checkpoints of a timeline, newest first.
    pub fn list_checkpoints(&self, timeline: &str) -> Result<Vec<Checkpoint>> {
        if validate_timeline_name(timeline).is_err() {
            return Ok(Vec::new());
        }
        let timeline_dir = self.timeline_dir(timeline);
        let entries = match fs::read_dir(&timeline_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut found: Vec<(Checkpoint, DateTime<Utc>)> = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path();
            let checkpoint = match read_metadata(&path.join(METADATA_FILE)) {
                Ok(cp) => cp,
                Err(e) => {
                    tracing::warn!("Skipping unreadable checkpoint {}: {}", path.display(), e);
                    continue;
                }
            };
            let mtime: DateTime<Utc> = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH)
                .into();
            found.push((checkpoint, mtime));
        }

        found.sort_by_key(|(cp, mtime)| Reverse((cp.created_at().unwrap_or(*mtime), *mtime)));
        Ok(found.into_iter().map(|(cp, _)| cp).collect())
    }

    pub fn latest_checkpoint(&self, timeline: &str) -> Result<Option<Checkpoint>> {
        Ok(self.list_checkpoints(timeline)?.into_iter().next())
    }

    /// Remove a checkpoint directory. Returns `Ok(false)` when absent.
    pub fn delete_checkpoint(&self, checkpoint_id: &str, timeline: &str) -> Result<bool> {
        if !is_valid_checkpoint_id(checkpoint_id) || validate_timeline_name(timeline).is_err() {
            return Ok(false);
        }
        let dir = self.timeline_dir(timeline).join(checkpoint_id);
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        tracing::info!("Deleted checkpoint {} from timeline {}", checkpoint_id, timeline);
        Ok(true)
    }

    pub fn list_timelines(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.config.timelines_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Create an empty timeline. Returns `Ok(false)` if it already exists.
    pub fn create_timeline(&self, name: &str) -> Result<bool> {
        validate_timeline_name(name)?;
        match fs::create_dir(self.timeline_dir(name)) {
            Ok(()) => {
                tracing::info!("Created timeline {}", name);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a timeline and all of its checkpoints.
    pub fn delete_timeline(&self, name: &str) -> Result<bool> {
        validate_timeline_name(name)?;
        if name == MAIN_TIMELINE {
            return Err(VenomError::ProtectedTimeline(name.to_string()));
        }
        let dir = self.timeline_dir(name);
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        tracing::info!("Deleted timeline {}", name);
        Ok(true)
    }

    fn excluded_roots(&self) -> Vec<PathBuf> {
        vec![
            absolute(&self.config.timelines_dir),
            absolute(&self.config.memory_root),
        ]
    }
}

/// Timeline names must be usable as a single path component.
pub fn validate_timeline_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name.len() <= MAX_TIMELINE_NAME_LEN
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(VenomError::InvalidTimelineName(name.to_string()))
    }
}

fn is_valid_checkpoint_id(id: &str) -> bool {
    id.len() == CHECKPOINT_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric())
}

fn allocate_checkpoint(
    timeline_dir: &Path,
    name: &str,
    description: &str,
) -> Result<(Checkpoint, PathBuf)> {
    for _ in 0..ID_ATTEMPTS {
        let checkpoint = Checkpoint::new(name, description);
        let dir = timeline_dir.join(&checkpoint.checkpoint_id);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok((checkpoint, dir)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::warn!("Checkpoint id {} collided, regenerating", checkpoint.checkpoint_id);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(VenomError::Internal("could not allocate a unique checkpoint id".into()))
}

fn read_metadata(path: &Path) -> Result<Checkpoint> {
    Ok(serde_json::from_slice(&fs::read(path)?)?)
}

fn verify_digest(checkpoint: &Checkpoint, diff: &[u8]) -> Result<()> {
    let Some(expected) = checkpoint.metadata.get("diff_sha256").and_then(|v| v.as_str()) else {
        return Ok(());
    };
    let actual = sha256_hex(diff);
    if actual != expected {
        return Err(VenomError::Integrity(format!(
            "{} of checkpoint {} has digest {}, expected {}",
            DIFF_FILE, checkpoint.checkpoint_id, actual, expected
        )));
    }
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn restore_backup_path(root: &Path, checkpoint_id: &str) -> PathBuf {
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "memory".to_string());
    root.with_file_name(format!(".{name}.restore-{checkpoint_id}"))
}

fn absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
