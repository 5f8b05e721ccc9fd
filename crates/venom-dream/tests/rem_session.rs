use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use venom_chronos::{ChronosConfig, ChronosEngine};
use venom_dream::{
    ChatAgent, DreamCollaborators, DreamConfig, DreamEngine, EntityProfile, GraphStats,
    InMemoryKnowledgeGraph, InMemoryLessonsStore, KnowledgeSource, RemReport, ScenarioWeaver,
    SessionStatus,
};
use venom_energy::{EnergyConfig, EnergyManager, StaticSampler};
use venom_types::{Difficulty, DreamState, MAIN_TIMELINE, Result, Scenario, VenomError};

/// Coder that answers with a fixed solution, can fail or stall on chosen
/// calls, and can raise a busy alert while answering.
#[derive(Default)]
struct Coder {
    calls: AtomicUsize,
    fail_on: Option<usize>,
    delay: Option<Duration>,
    alert_on: Option<usize>,
    energy: OnceLock<Arc<EnergyManager>>,
}

#[async_trait]
impl ChatAgent for Coder {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.alert_on == Some(n) {
            if let Some(energy) = self.energy.get() {
                energy.dispatch_alerts().await;
            }
        }
        if self.fail_on == Some(n) {
            return Err(VenomError::Agent("model overloaded".into()));
        }
        Ok(format!("Sure.\n```python\ndef solve():\n    return {n}\n```\n"))
    }

    fn name(&self) -> &str {
        "coder"
    }
}

struct Reviewer;

#[async_trait]
impl ChatAgent for Reviewer {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok("PASS: yes\nREASON: all cases hold".into())
    }

    fn name(&self) -> &str {
        "reviewer"
    }
}

/// Titles scenarios after the fragment's concept; refuses "broken" ones.
struct Weaver;

#[async_trait]
impl ScenarioWeaver for Weaver {
    async fn weave(
        &self,
        fragment: &str,
        difficulty: Option<Difficulty>,
        libraries: &[String],
    ) -> Result<Scenario> {
        let title = fragment.lines().next().unwrap_or_default().to_string();
        if title.contains("broken") {
            return Err(VenomError::Agent("unparseable scenario".into()));
        }
        Ok(Scenario::new(title, "Implement solve()")
            .with_test_cases(vec!["solve() returns an int".into()])
            .with_difficulty(difficulty.unwrap_or_default())
            .with_libraries(libraries.to_vec()))
    }
}

struct OfflineKnowledge;

#[async_trait]
impl KnowledgeSource for OfflineKnowledge {
    async fn stats(&self) -> Result<GraphStats> {
        Err(VenomError::Knowledge("graph offline".into()))
    }

    async fn top_entities(&self, _limit: usize) -> Result<Vec<EntityProfile>> {
        Ok(Vec::new())
    }
}

struct Fixture {
    _dir: TempDir,
    dreams: PathBuf,
    chronos: Arc<ChronosEngine>,
    energy: Arc<EnergyManager>,
    lessons: Arc<InMemoryLessonsStore>,
}

fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(["-c", "user.name=venom", "-c", "user.email=venom@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git must be installed");
    assert!(out.status.success(), "git {:?} failed", args);
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let workspace = dir.path().join("workspace");
    fs::create_dir_all(&workspace).unwrap();
    git(&workspace, &["init", "-q"]);
    fs::write(workspace.join("main.py"), "print('hi')\n").unwrap();
    git(&workspace, &["add", "main.py"]);
    git(&workspace, &["commit", "-q", "-m", "init"]);

    let state = dir.path().join("state");
    let memory = state.join("memory");
    fs::create_dir_all(&memory).unwrap();
    fs::write(memory.join("graph.json"), "{}").unwrap();

    let chronos = ChronosEngine::new(ChronosConfig::new(
        state.join("timelines"),
        &workspace,
        &memory,
    ))
    .unwrap();
    let energy = EnergyManager::with_sampler(
        EnergyConfig::default(),
        Arc::new(StaticSampler::new(5.0, 20.0)),
    );

    Fixture {
        dreams: state.join("dreams"),
        _dir: dir,
        chronos: Arc::new(chronos),
        energy: Arc::new(energy),
        lessons: Arc::new(InMemoryLessonsStore::new()),
    }
}

fn graph(concepts: &[&str]) -> InMemoryKnowledgeGraph {
    let graph = InMemoryKnowledgeGraph::new();
    for name in concepts {
        graph.add_entity(*name, "concept", format!("About {name}"));
    }
    graph
}

impl Fixture {
    fn config(&self) -> DreamConfig {
        DreamConfig::default()
            .with_dreams_dir(&self.dreams)
            .with_lower_priority(false)
    }

    fn engine(
        &self,
        config: DreamConfig,
        knowledge: Arc<dyn KnowledgeSource>,
        coder: Arc<Coder>,
    ) -> DreamEngine {
        DreamEngine::new(
            config,
            DreamCollaborators {
                knowledge,
                weaver: Arc::new(Weaver),
                coder,
                reviewer: Arc::new(Reviewer),
                lessons: self.lessons.clone(),
            },
            self.energy.clone(),
            self.chronos.clone(),
        )
    }

    fn timelines(&self) -> Vec<String> {
        self.chronos.list_timelines().unwrap()
    }
}

#[tokio::test]
async fn test_completed_session_keeps_safety_checkpoint() {
    let fx = fixture();
    let engine = fx.engine(
        fx.config(),
        Arc::new(graph(&["btree", "heap", "trie"])),
        Arc::new(Coder::default()),
    );

    let report = engine.enter_rem_phase(Some(2), Some(Difficulty::Easy)).await;
    let session = report.session().expect("session report");

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.dreams_attempted, 2);
    assert_eq!(session.dreams_successful, 2);
    assert_eq!(session.success_rate, 1.0);
    assert_eq!(session.scenarios.len(), 2);
    assert!(session.safety.is_ok());
    assert!(session.restore_hint.is_none());
    assert_eq!(engine.state(), DreamState::Idle);
    assert!(engine.current_session().is_none());

    let timeline = format!("dream_{}", &session.session_id[..8]);
    assert!(fx.timelines().contains(&timeline));
    let checkpoints = fx.chronos.list_checkpoints(&timeline).unwrap();
    assert_eq!(checkpoints.len(), 1);
    assert!(checkpoints[0].name.starts_with("pre_dream_"));

    assert_eq!(fx.lessons.by_tag("easy").await.len(), 2);
    let stats = engine.get_statistics();
    assert_eq!(stats.total_dreams, 2);
    assert_eq!(stats.artifact_files, 2);
    let sidecars = fs::read_dir(&fx.dreams)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .map(|e| e.path().extension().is_some_and(|x| x == "json"))
                .unwrap_or(false)
        })
        .count();
    assert_eq!(sidecars, 2);
}

#[tokio::test]
async fn test_empty_knowledge_leaves_no_timeline() {
    let fx = fixture();
    let engine = fx.engine(
        fx.config(),
        Arc::new(InMemoryKnowledgeGraph::new()),
        Arc::new(Coder::default()),
    );

    let report = engine.enter_rem_phase(None, None).await;

    assert_eq!(report, RemReport::NoKnowledge);
    assert_eq!(
        report.to_value(),
        serde_json::json!({"status": "no_knowledge", "dreams_attempted": 0, "dreams_successful": 0})
    );
    assert_eq!(fx.timelines(), vec![MAIN_TIMELINE.to_string()]);
    assert_eq!(engine.state(), DreamState::Idle);
}

#[tokio::test]
async fn test_concurrent_sessions_only_one_runs() {
    let fx = fixture();
    let coder = Arc::new(Coder {
        delay: Some(Duration::from_millis(100)),
        ..Default::default()
    });
    let engine = fx.engine(fx.config(), Arc::new(graph(&["lru"])), coder);

    let (a, b) = tokio::join!(
        engine.enter_rem_phase(Some(1), None),
        engine.enter_rem_phase(Some(1), None)
    );

    let rejected = [&a, &b].iter().filter(|r| r.is_not_idle()).count();
    assert_eq!(rejected, 1);
    let rejected = if a.is_not_idle() { &a } else { &b };
    assert_eq!(rejected.to_value()["error"], "Dream engine not idle");
    assert_eq!(engine.state(), DreamState::Idle);
    assert_eq!(engine.get_statistics().total_dreams, 1);
}

#[tokio::test]
async fn test_busy_alert_stops_before_next_scenario() {
    let fx = fixture();
    let coder = Arc::new(Coder {
        alert_on: Some(2),
        ..Default::default()
    });
    let _ = coder.energy.set(fx.energy.clone());
    let engine = fx.engine(
        fx.config(),
        Arc::new(graph(&["a", "b", "c", "d"])),
        coder.clone(),
    );
    engine.attach_to(&fx.energy);

    let report = engine.enter_rem_phase(Some(3), None).await;
    let session = report.session().expect("session report");

    assert_eq!(session.status, SessionStatus::Interrupted);
    assert_eq!(session.dreams_attempted, 2);
    // The in-flight attempt still finishes and is kept.
    assert_eq!(session.dreams_successful, 2);
    assert_eq!(coder.calls.load(Ordering::SeqCst), 2);
    assert_eq!(engine.state(), DreamState::Idle);
    assert_eq!(report.to_value()["status"], "interrupted");
}

#[tokio::test]
async fn test_wake_up_while_idle_is_noop() {
    let fx = fixture();
    let engine = fx.engine(
        fx.config(),
        Arc::new(graph(&["a"])),
        Arc::new(Coder::default()),
    );
    engine.attach_to(&fx.energy);

    assert_eq!(fx.energy.dispatch_alerts().await, 1);
    assert!(!engine.handle_wake_up());
    assert_eq!(engine.state(), DreamState::Idle);
}

#[tokio::test]
async fn test_failed_scenario_does_not_abort_session() {
    let fx = fixture();
    let coder = Arc::new(Coder {
        fail_on: Some(1),
        ..Default::default()
    });
    let engine = fx.engine(fx.config(), Arc::new(graph(&["x", "y"])), coder);

    let report = engine.enter_rem_phase(Some(2), None).await;
    let session = report.session().expect("session report");

    assert_eq!(session.dreams_attempted, 2);
    assert_eq!(session.dreams_successful, 1);
    assert!(!session.attempts[0].success);
    assert!(session.attempts[0]
        .reason
        .as_deref()
        .is_some_and(|r| r.contains("model overloaded")));

    // 50% is at the threshold, so the safety checkpoint is recommended.
    let hint = session.restore_hint.as_ref().expect("restore hint");
    assert_eq!(hint.timeline, format!("dream_{}", &session.session_id[..8]));
    assert!(fx
        .chronos
        .get_checkpoint(&hint.checkpoint_id, &hint.timeline)
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_weaving_failures_are_skipped() {
    let fx = fixture();
    let engine = fx.engine(
        fx.config(),
        Arc::new(graph(&["broken-one", "fine"])),
        Arc::new(Coder::default()),
    );

    let report = engine.enter_rem_phase(Some(2), None).await;
    let session = report.session().expect("session report");

    assert_eq!(session.dreams_attempted, 1);
    assert!(session.scenarios[0].contains("fine"));
}

#[tokio::test]
async fn test_agent_timeout_fails_attempt() {
    let fx = fixture();
    let coder = Arc::new(Coder {
        delay: Some(Duration::from_millis(500)),
        ..Default::default()
    });
    let engine = fx.engine(
        fx.config()
            .with_agent_timeout(Some(Duration::from_millis(50))),
        Arc::new(graph(&["slow"])),
        coder,
    );

    let report = engine.enter_rem_phase(Some(1), None).await;
    let attempt = &report.session().expect("session report").attempts[0];

    assert!(!attempt.success);
    assert!(attempt.reason.as_deref().is_some_and(|r| r.contains("Timed out")));
    assert!(fx.lessons.is_empty().await);
}

#[tokio::test]
async fn test_knowledge_error_reports_failure_and_resets() {
    let fx = fixture();
    let engine = fx.engine(
        fx.config(),
        Arc::new(OfflineKnowledge),
        Arc::new(Coder::default()),
    );

    let report = engine.enter_rem_phase(None, None).await;

    assert!(matches!(report, RemReport::Failed { .. }));
    assert_eq!(report.to_value()["status"], "error");
    assert_eq!(engine.state(), DreamState::Idle);
    assert_eq!(fx.timelines(), vec![MAIN_TIMELINE.to_string()]);
}

#[tokio::test]
async fn test_non_strict_mode_skips_review() {
    let fx = fixture();
    let engine = fx.engine(
        fx.config().with_strict_validation(false),
        Arc::new(graph(&["queue"])),
        Arc::new(Coder::default()),
    );

    let report = engine.enter_rem_phase(Some(1), None).await;
    assert_eq!(report.session().expect("session report").dreams_successful, 1);

    let lesson = &fx.lessons.by_tag("dream").await[0];
    assert_eq!(lesson.metadata["validated"], false);
}

#[tokio::test]
async fn test_unwritable_dreams_dir_degrades_artifact_but_keeps_lesson() {
    let fx = fixture();
    fs::write(&fx.dreams, "not a directory").unwrap();
    let engine = fx.engine(fx.config(), Arc::new(graph(&["cache"])), Arc::new(Coder::default()));

    let report = engine.enter_rem_phase(Some(1), None).await;
    let session = report.session().expect("session report");

    assert_eq!(session.status, SessionStatus::Completed);
    assert_eq!(session.dreams_successful, 1);
    let attempt = &session.attempts[0];
    assert!(attempt.success);
    assert!(attempt.artifact.is_degraded());
    assert!(attempt.lesson_id.is_some());
    assert_eq!(fx.lessons.len().await, 1);
    assert_eq!(engine.get_statistics().artifact_files, 0);
    assert_eq!(fs::read_to_string(&fx.dreams).unwrap(), "not a directory");
}
