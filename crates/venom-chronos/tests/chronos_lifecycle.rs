use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;
use venom_chronos::{ChronosConfig, ChronosEngine, DIFF_FILE, MEMORY_DIR};
use venom_types::{MAIN_TIMELINE, VenomError};

struct Fixture {
    _dir: TempDir,
    workspace: PathBuf,
    memory: PathBuf,
    engine: ChronosEngine,
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(["-c", "user.name=venom", "-c", "user.email=venom@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git must be installed");
    assert!(
        status.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&status.stderr)
    );
}

/// A committed workspace with `test.txt` = "base" and a memory directory.
fn fixture_with(timelines_in_workspace: bool) -> Fixture {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("workspace");
    fs::create_dir_all(&workspace).unwrap();
    git(&workspace, &["init", "-q"]);
    fs::write(workspace.join("test.txt"), "base").unwrap();
    git(&workspace, &["add", "test.txt"]);
    git(&workspace, &["commit", "-q", "-m", "init"]);

    let state = if timelines_in_workspace {
        workspace.join(".venom")
    } else {
        dir.path().join("state")
    };
    let memory = state.join("memory");
    fs::create_dir_all(memory.join("vectors")).unwrap();
    fs::write(memory.join("vectors/index.bin"), b"\x00\x01v1").unwrap();
    fs::write(memory.join("graph.json"), r#"{"nodes": 1}"#).unwrap();

    let engine = ChronosEngine::new(
        ChronosConfig::new(state.join("timelines"), &workspace, &memory)
            .with_env_keys(vec!["VENOM_TEST_SETTING".into()]),
    )
    .unwrap();

    Fixture {
        _dir: dir,
        workspace,
        memory,
        engine,
    }
}

fn fixture() -> Fixture {
    fixture_with(false)
}

fn read(p: &Path) -> String {
    fs::read_to_string(p).unwrap()
}

#[tokio::test]
async fn test_restore_brings_back_file_contents() {
    let fx = fixture();
    fs::write(fx.workspace.join("test.txt"), "v1").unwrap();

    let id = fx
        .engine
        .create_checkpoint("A", "before edit", MAIN_TIMELINE)
        .await
        .unwrap();

    fs::write(fx.workspace.join("test.txt"), "v2").unwrap();
    assert!(fx.engine.restore_checkpoint(&id, MAIN_TIMELINE).await.unwrap());
    assert_eq!(read(&fx.workspace.join("test.txt")), "v1");
}

#[tokio::test]
async fn test_round_trip_workspace_and_memory() {
    let fx = fixture();
    fs::write(fx.workspace.join("test.txt"), "checkpointed").unwrap();
    fs::write(fx.workspace.join("notes.md"), "untracked notes").unwrap();

    let receipt = fx
        .engine
        .create_checkpoint_with_receipt("full", "", MAIN_TIMELINE)
        .await
        .unwrap();
    assert!(receipt.memory_backup.is_ok());
    let id = receipt.checkpoint.checkpoint_id;

    fs::write(fx.workspace.join("test.txt"), "mutated").unwrap();
    fs::remove_file(fx.workspace.join("notes.md")).unwrap();
    fs::write(fx.memory.join("graph.json"), r#"{"nodes": 99}"#).unwrap();
    fs::write(fx.memory.join("stray.tmp"), "new").unwrap();
    fs::remove_dir_all(fx.memory.join("vectors")).unwrap();

    assert!(fx.engine.restore_checkpoint(&id, MAIN_TIMELINE).await.unwrap());

    assert_eq!(read(&fx.workspace.join("test.txt")), "checkpointed");
    assert_eq!(read(&fx.workspace.join("notes.md")), "untracked notes");
    assert_eq!(read(&fx.memory.join("graph.json")), r#"{"nodes": 1}"#);
    assert_eq!(
        fs::read(fx.memory.join("vectors/index.bin")).unwrap(),
        b"\x00\x01v1"
    );
    assert!(!fx.memory.join("stray.tmp").exists());
}

#[tokio::test]
async fn test_clean_workspace_restores_to_head() {
    let fx = fixture();
    let id = fx
        .engine
        .create_checkpoint("clean", "", MAIN_TIMELINE)
        .await
        .unwrap();
    let patch = fx.engine.timeline_dir(MAIN_TIMELINE).join(&id).join(DIFF_FILE);
    assert_eq!(fs::metadata(&patch).unwrap().len(), 0);

    fs::write(fx.workspace.join("test.txt"), "dirty").unwrap();
    assert!(fx.engine.restore_checkpoint(&id, MAIN_TIMELINE).await.unwrap());
    assert_eq!(read(&fx.workspace.join("test.txt")), "base");
}

#[tokio::test]
async fn test_timelines_are_isolated() {
    let fx = fixture();
    assert!(fx.engine.create_timeline("exp").unwrap());

    let main_id = fx
        .engine
        .create_checkpoint("on main", "", MAIN_TIMELINE)
        .await
        .unwrap();
    let exp_id = fx.engine.create_checkpoint("on exp", "", "exp").await.unwrap();

    let main = fx.engine.list_checkpoints(MAIN_TIMELINE).unwrap();
    let exp = fx.engine.list_checkpoints("exp").unwrap();
    assert_eq!(main.len(), 1);
    assert_eq!(exp.len(), 1);
    assert_eq!(main[0].checkpoint_id, main_id);
    assert_eq!(exp[0].checkpoint_id, exp_id);
    assert_ne!(main_id, exp_id);
    assert_eq!(exp[0].timeline(), Some("exp"));

    assert!(!fx.engine.restore_checkpoint(&exp_id, MAIN_TIMELINE).await.unwrap());
}

#[tokio::test]
async fn test_list_newest_first_for_sequential_creates() {
    let fx = fixture();
    let mut ids = Vec::new();
    for i in 0..4 {
        ids.push(
            fx.engine
                .create_checkpoint(&format!("cp{i}"), "", MAIN_TIMELINE)
                .await
                .unwrap(),
        );
    }
    let listed: Vec<String> = fx
        .engine
        .list_checkpoints(MAIN_TIMELINE)
        .unwrap()
        .into_iter()
        .map(|c| c.checkpoint_id)
        .collect();
    ids.reverse();
    assert_eq!(listed, ids);
    assert_eq!(
        fx.engine.latest_checkpoint(MAIN_TIMELINE).unwrap().unwrap().checkpoint_id,
        ids[0]
    );
}

#[tokio::test]
async fn test_missing_memory_root_degrades() {
    let fx = fixture();
    fs::remove_dir_all(&fx.memory).unwrap();

    let receipt = fx
        .engine
        .create_checkpoint_with_receipt("no memory", "", MAIN_TIMELINE)
        .await
        .unwrap();
    assert!(receipt.memory_backup.is_degraded());
    let dir = fx
        .engine
        .timeline_dir(MAIN_TIMELINE)
        .join(&receipt.checkpoint.checkpoint_id);
    assert!(!dir.join(MEMORY_DIR).exists());
    assert_eq!(
        receipt.checkpoint.metadata["memory_backup"]["status"],
        "degraded"
    );
}

#[tokio::test]
async fn test_tampered_patch_is_rejected() {
    let fx = fixture();
    fs::write(fx.workspace.join("test.txt"), "v1").unwrap();
    let id = fx
        .engine
        .create_checkpoint("tamper", "", MAIN_TIMELINE)
        .await
        .unwrap();

    let patch = fx.engine.timeline_dir(MAIN_TIMELINE).join(&id).join(DIFF_FILE);
    fs::write(&patch, "garbage").unwrap();
    fs::write(fx.workspace.join("test.txt"), "v2").unwrap();

    let result = fx.engine.restore_checkpoint(&id, MAIN_TIMELINE).await;
    assert!(matches!(result, Err(VenomError::Integrity(_))));
    // Nothing was touched.
    assert_eq!(read(&fx.workspace.join("test.txt")), "v2");
}

#[tokio::test]
async fn test_environment_snapshot_is_recorded() {
    let fx = fixture();
    let id = fx
        .engine
        .create_checkpoint("env", "", MAIN_TIMELINE)
        .await
        .unwrap();
    let env = fx
        .engine
        .environment_snapshot(&id, MAIN_TIMELINE)
        .unwrap()
        .unwrap();
    assert!(env.settings.contains_key("VENOM_TEST_SETTING"));
    assert!(fx.engine.environment_snapshot("00000000", MAIN_TIMELINE).unwrap().is_none());
}

#[tokio::test]
async fn test_state_inside_workspace_is_not_captured_as_untracked() {
    let fx = fixture_with(true);
    fs::write(fx.workspace.join("scratch.txt"), "mine").unwrap();

    let first = fx
        .engine
        .create_checkpoint_with_receipt("one", "", MAIN_TIMELINE)
        .await
        .unwrap();
    assert_eq!(first.checkpoint.metadata["untracked_files"], 1);

    // The first checkpoint now lives inside the workspace; it must not be
    // swept into the second one.
    let second = fx
        .engine
        .create_checkpoint_with_receipt("two", "", MAIN_TIMELINE)
        .await
        .unwrap();
    assert_eq!(second.checkpoint.metadata["untracked_files"], 1);

    fs::write(fx.workspace.join("scratch.txt"), "changed").unwrap();
    assert!(
        fx.engine
            .restore_checkpoint(&second.checkpoint.checkpoint_id, MAIN_TIMELINE)
            .await
            .unwrap()
    );
    assert_eq!(read(&fx.workspace.join("scratch.txt")), "mine");
    assert_eq!(fx.engine.list_checkpoints(MAIN_TIMELINE).unwrap().len(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn test_untracked_symlinks_survive_round_trip() {
    use std::os::unix::fs::symlink;

    let fx = fixture();
    let shared = fx.workspace.parent().unwrap().join("shared");
    fs::create_dir_all(&shared).unwrap();
    fs::write(shared.join("lib.py"), "pass").unwrap();
    symlink(&shared, fx.workspace.join("venv")).unwrap();
    symlink("/nonexistent/target", fx.workspace.join("dangling")).unwrap();

    let receipt = fx
        .engine
        .create_checkpoint_with_receipt("links", "", MAIN_TIMELINE)
        .await
        .unwrap();
    assert_eq!(receipt.checkpoint.metadata["untracked_files"], 2);

    fs::remove_file(fx.workspace.join("venv")).unwrap();
    fs::remove_file(fx.workspace.join("dangling")).unwrap();

    assert!(
        fx.engine
            .restore_checkpoint(&receipt.checkpoint.checkpoint_id, MAIN_TIMELINE)
            .await
            .unwrap()
    );
    assert_eq!(fs::read_link(fx.workspace.join("venv")).unwrap(), shared);
    assert_eq!(
        fs::read_link(fx.workspace.join("dangling")).unwrap(),
        PathBuf::from("/nonexistent/target")
    );
    assert_eq!(read(&fx.workspace.join("venv/lib.py")), "pass");
}

#[test]
fn test_timelines_inside_memory_root_is_rejected() {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("workspace");
    let memory = dir.path().join("memory");
    fs::create_dir_all(&memory).unwrap();

    let nested = ChronosEngine::new(ChronosConfig::new(memory.join("timelines"), &workspace, &memory));
    assert!(matches!(nested, Err(VenomError::InvalidConfig(_))));
    assert!(!memory.join("timelines").exists());

    let same = ChronosEngine::new(ChronosConfig::new(&memory, &workspace, &memory));
    assert!(matches!(same, Err(VenomError::InvalidConfig(_))));

    let sibling = ChronosEngine::new(ChronosConfig::new(
        dir.path().join("memory-timelines"),
        &workspace,
        &memory,
    ));
    assert!(sibling.is_ok());
}

#[cfg(unix)]
#[tokio::test]
async fn test_untracked_non_utf8_name_round_trips() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let fx = fixture();
    let name = fx.workspace.join(OsStr::from_bytes(b"caf\xe9.txt"));
    fs::write(&name, "latin-1").unwrap();

    let receipt = fx
        .engine
        .create_checkpoint_with_receipt("bytes", "", MAIN_TIMELINE)
        .await
        .unwrap();
    assert_eq!(receipt.checkpoint.metadata["untracked_files"], 1);

    fs::remove_file(&name).unwrap();
    assert!(
        fx.engine
            .restore_checkpoint(&receipt.checkpoint.checkpoint_id, MAIN_TIMELINE)
            .await
            .unwrap()
    );
    assert_eq!(read(&name), "latin-1");
}
