use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use uuid::Uuid;

use venom_chronos::ChronosEngine;
use venom_energy::{AlertCallback, EnergyManager};
use venom_types::{
    Difficulty, DreamEvent, DreamState, Lesson, Result, Scenario, SideEffect, VenomError,
    short_id,
};

use crate::config::DreamConfig;
use crate::extract::{Verdict, extract_code};
use crate::fragments::gather_fragments;
use crate::report::{
    DreamAttempt, DreamStatistics, RemReport, RestoreHint, SessionReport, SessionStatus,
    success_rate,
};
use crate::traits::{ChatAgent, KnowledgeSource, LessonsStore, ScenarioWeaver};

/// External agents and stores a dream engine works with.
#[derive(Clone)]
pub struct DreamCollaborators {
    pub knowledge: Arc<dyn KnowledgeSource>,
    pub weaver: Arc<dyn ScenarioWeaver>,
    pub coder: Arc<dyn ChatAgent>,
    pub reviewer: Arc<dyn ChatAgent>,
    pub lessons: Arc<dyn LessonsStore>,
}

/// Cloneable wake-up trigger for a dream engine.
///
/// Firing it moves an in-flight session to `Interrupted`; the dream loop
/// notices before starting its next scenario.
#[derive(Clone)]
pub struct InterruptHandle {
    state: Arc<Mutex<DreamState>>,
}

impl InterruptHandle {
    /// Returns `true` if a session was interrupted by this call.
    pub fn fire(&self) -> bool {
        let mut state = lock(&self.state);
        match *state {
            DreamState::Dreaming | DreamState::Validating | DreamState::Saving => {
                *state = DreamState::Interrupted;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl AlertCallback for InterruptHandle {
    async fn on_alert(&self) -> Result<()> {
        if self.fire() {
            tracing::info!("System busy, interrupting REM session");
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct SessionContext {
    session_id: String,
    timeline: String,
    checkpoint_id: Option<String>,
}

/// Runs REM sessions: knowledge fragments become scenarios, the coder
/// attempts them, and successes are kept as synthetic lessons.
pub struct DreamEngine {
    config: DreamConfig,
    collaborators: DreamCollaborators,
    energy: Arc<EnergyManager>,
    chronos: Arc<ChronosEngine>,
    state: Arc<Mutex<DreamState>>,
    session_lock: tokio::sync::Mutex<()>,
    session: Mutex<Option<SessionContext>>,
    total_dreams: AtomicU64,
    successful_dreams: AtomicU64,
}

/// Puts the engine back to `Idle` however the session ends.
struct SessionReset<'a>(&'a DreamEngine);

impl Drop for SessionReset<'_> {
    fn drop(&mut self) {
        self.0.end_session();
    }
}

impl DreamEngine {
    pub fn new(
        config: DreamConfig,
        collaborators: DreamCollaborators,
        energy: Arc<EnergyManager>,
        chronos: Arc<ChronosEngine>,
    ) -> Self {
        Self {
            config,
            collaborators,
            energy,
            chronos,
            state: Arc::new(Mutex::new(DreamState::Idle)),
            session_lock: tokio::sync::Mutex::new(()),
            session: Mutex::new(None),
            total_dreams: AtomicU64::new(0),
            successful_dreams: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &DreamConfig {
        &self.config
    }

    pub fn state(&self) -> DreamState {
        *lock(&self.state)
    }

    /// Id of the session in flight, if any.
    pub fn current_session(&self) -> Option<String> {
        lock(&self.session).as_ref().map(|s| s.session_id.clone())
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            state: self.state.clone(),
        }
    }

    /// Wake-up handler: interrupt the running session, if there is one.
    pub fn handle_wake_up(&self) -> bool {
        self.interrupt_handle().fire()
    }

    /// Interrupt sessions whenever `energy` reports the system busy.
    pub fn attach_to(&self, energy: &EnergyManager) {
        energy.register_alert_callback(Arc::new(self.interrupt_handle()));
    }

    fn apply(&self, event: DreamEvent) -> Result<DreamState> {
        let mut state = lock(&self.state);
        let next = state.transition(event)?;
        *state = next;
        Ok(next)
    }

    fn end_session(&self) {
        *lock(&self.state) = DreamState::Idle;
        if let Some(ctx) = lock(&self.session).take() {
            tracing::debug!("Cleared REM session {}", ctx.session_id);
        }
    }

    /// Run one REM session. Never fails: every outcome is a report.
    pub async fn enter_rem_phase(
        &self,
        max_scenarios: Option<usize>,
        difficulty: Option<Difficulty>,
    ) -> RemReport {
        let Ok(_session_lock) = self.session_lock.try_lock() else {
            return RemReport::not_idle(self.state());
        };
        let current = self.state();
        if current.is_active() {
            return RemReport::not_idle(current);
        }
        if let Err(e) = self.apply(DreamEvent::StartSession) {
            tracing::error!("Cannot start REM session: {}", e);
            return RemReport::not_idle(current);
        }
        let _reset = SessionReset(self);

        let session_id = Uuid::new_v4().to_string();
        let short = session_id[..8].to_string();
        let timeline = format!("dream_{short}");
        *lock(&self.session) = Some(SessionContext {
            session_id: session_id.clone(),
            timeline: timeline.clone(),
            checkpoint_id: None,
        });
        tracing::info!("Entering REM phase (session {})", session_id);

        let started = Instant::now();
        match self
            .run_session(&session_id, &timeline, started, max_scenarios, difficulty)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("REM session {} failed: {}", session_id, e);
                self.discard_timeline(&timeline);
                RemReport::Failed {
                    session_id,
                    error: e.to_string(),
                }
            }
        }
    }

    async fn run_session(
        &self,
        session_id: &str,
        timeline: &str,
        started: Instant,
        max_scenarios: Option<usize>,
        difficulty: Option<Difficulty>,
    ) -> Result<RemReport> {
        let short = &session_id[..8];
        let (checkpoint_id, safety) = self.take_safety_checkpoint(timeline, short).await;

        if self.config.lower_priority && !self.energy.set_low_priority(None) {
            tracing::debug!("Could not lower process priority for REM session");
        }

        let count = max_scenarios.unwrap_or(self.config.max_scenarios);
        let fragments = gather_fragments(
            self.collaborators.knowledge.as_ref(),
            count,
            self.config.candidate_pool_factor,
        )
        .await?;
        if fragments.is_empty() {
            self.discard_timeline(timeline);
            return Ok(RemReport::NoKnowledge);
        }

        let scenarios = self.weave_scenarios(&fragments, difficulty).await;

        let mut attempts = Vec::with_capacity(scenarios.len());
        for scenario in &scenarios {
            if self.state() == DreamState::Interrupted {
                tracing::info!(
                    "REM session {} interrupted after {} scenario(s)",
                    session_id,
                    attempts.len()
                );
                break;
            }
            let attempt = match self.dream_scenario(scenario, session_id).await {
                Ok(a) => a,
                Err(e) => {
                    tracing::warn!("Dream '{}' failed: {}", scenario.title, e);
                    DreamAttempt::failed(&scenario.title, short_id(), e.to_string())
                }
            };
            self.record(&attempt);
            if let Err(e) = self.apply(DreamEvent::AttemptFinished) {
                tracing::warn!("Unexpected dream state after attempt: {}", e);
            }
            attempts.push(attempt);
        }

        let status = if self.state() == DreamState::Interrupted {
            SessionStatus::Interrupted
        } else {
            SessionStatus::Completed
        };

        let checkpoint_id = if attempts.is_empty() {
            self.discard_timeline(timeline);
            None
        } else {
            checkpoint_id
        };

        let dreams_attempted = attempts.len();
        let dreams_successful = attempts.iter().filter(|a| a.success).count();
        let rate = success_rate(dreams_successful as u64, dreams_attempted as u64);
        let restore_hint = checkpoint_id
            .filter(|_| rate <= self.config.low_success_threshold)
            .map(|checkpoint_id| RestoreHint {
                checkpoint_id,
                timeline: timeline.to_string(),
            });
        if let Some(hint) = &restore_hint {
            tracing::warn!(
                "Low dream success rate ({:.0}%), consider restoring checkpoint {} on {}",
                rate * 100.0,
                hint.checkpoint_id,
                hint.timeline
            );
        }

        tracing::info!(
            "REM session {} {:?}: {}/{} dreams successful",
            session_id,
            status,
            dreams_successful,
            dreams_attempted
        );

        Ok(RemReport::Session(SessionReport {
            session_id: session_id.to_string(),
            status,
            duration_seconds: started.elapsed().as_secs_f64(),
            dreams_attempted,
            dreams_successful,
            scenarios: attempts.iter().map(|a| a.scenario.clone()).collect(),
            success_rate: rate,
            restore_hint,
            attempts,
            safety,
        }))
    }

    /// Snapshot the workspace on the session's own timeline. Failure leaves
    /// the session unprotected but running.
    async fn take_safety_checkpoint(
        &self,
        timeline: &str,
        short: &str,
    ) -> (Option<String>, SideEffect) {
        let name = format!("pre_dream_{short}");
        match self
            .chronos
            .create_checkpoint(&name, "Safety checkpoint before REM session", timeline)
            .await
        {
            Ok(id) => {
                if let Some(ctx) = lock(&self.session).as_mut() {
                    ctx.checkpoint_id = Some(id.clone());
                }
                (Some(id), SideEffect::Ok)
            }
            Err(e) => {
                tracing::warn!(
                    "Safety checkpoint failed, dreaming without protection: {}",
                    e
                );
                self.discard_timeline(timeline);
                (None, SideEffect::degraded(e.to_string()))
            }
        }
    }

    fn discard_timeline(&self, timeline: &str) {
        match self.chronos.delete_timeline(timeline) {
            Ok(true) => tracing::debug!("Removed dream timeline {}", timeline),
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to remove dream timeline {}: {}", timeline, e),
        }
        if let Some(ctx) = lock(&self.session).as_mut() {
            if ctx.timeline == timeline {
                ctx.checkpoint_id = None;
            }
        }
    }

    async fn weave_scenarios(
        &self,
        fragments: &[String],
        difficulty: Option<Difficulty>,
    ) -> Vec<Scenario> {
        let mut scenarios = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let woven = self
                .bounded(self.collaborators.weaver.weave(
                    fragment,
                    difficulty,
                    &self.config.default_libraries,
                ))
                .await;
            match woven {
                Ok(s) => scenarios.push(s),
                Err(e) => tracing::warn!("Scenario generation failed: {}", e),
            }
        }
        scenarios
    }

    fn record(&self, attempt: &DreamAttempt) {
        self.total_dreams.fetch_add(1, Ordering::Relaxed);
        if attempt.success {
            self.successful_dreams.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Generate, optionally validate, then persist one scenario.
    pub async fn dream_scenario(&self, scenario: &Scenario, session_id: &str) -> Result<DreamAttempt> {
        let attempt_id = short_id();
        tracing::debug!("Dreaming '{}' (attempt {})", scenario.title, attempt_id);

        let response = self
            .ask(self.collaborators.coder.as_ref(), &self.coder_prompt(scenario))
            .await?;
        let languages = [
            self.config.target_language.as_str(),
            self.config.artifact_extension.as_str(),
        ];
        let Some(code) = extract_code(&response, &languages) else {
            return Ok(DreamAttempt::failed(
                &scenario.title,
                attempt_id,
                "No code generated",
            ));
        };

        if self.config.strict_validation {
            self.apply(DreamEvent::StartValidation)?;
            let review = self
                .ask(
                    self.collaborators.reviewer.as_ref(),
                    &self.review_prompt(scenario, &code),
                )
                .await?;
            let verdict = Verdict::parse(&review);
            if !verdict.passed {
                tracing::info!("Dream '{}' rejected: {}", scenario.title, verdict.reason);
                return Ok(DreamAttempt {
                    code: Some(code),
                    ..DreamAttempt::failed(&scenario.title, attempt_id, verdict.reason)
                });
            }
            self.apply(DreamEvent::ValidationPassed)?;
        } else {
            self.apply(DreamEvent::BeginSaving)?;
        }

        let lesson = self.synthetic_lesson(scenario, &code, &attempt_id, session_id);
        let lesson_id = self
            .collaborators
            .lessons
            .add(lesson)
            .await
            .map_err(|e| VenomError::Lessons(e.to_string()))?;
        let artifact = self
            .write_artifacts(scenario, &code, &attempt_id, lesson_id)
            .await;

        tracing::info!("Dream '{}' saved as lesson {}", scenario.title, lesson_id);
        Ok(DreamAttempt {
            success: true,
            scenario: scenario.title.clone(),
            attempt_id,
            code: Some(code),
            reason: None,
            lesson_id: Some(lesson_id),
            artifact,
        })
    }

    async fn ask(&self, agent: &dyn ChatAgent, prompt: &str) -> Result<String> {
        self.bounded(agent.complete(prompt)).await.map_err(|e| match e {
            VenomError::Timeout(_) | VenomError::Agent(_) => e,
            other => VenomError::Agent(format!("{}: {}", agent.name(), other)),
        })
    }

    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match self.config.agent_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| VenomError::Timeout(limit))?,
            None => call.await,
        }
    }

    fn coder_prompt(&self, scenario: &Scenario) -> String {
        let lang = &self.config.target_language;
        format!(
            "Solve the following {lang} programming task.\n\n\
             Task: {}\n{}\n\n{}\n\n\
             Test cases:\n{}\n\n\
             Reply with the complete solution in a single ```{lang} code block.",
            scenario.title,
            scenario.description,
            scenario.task_prompt,
            bullet_list(&scenario.test_cases),
        )
    }

    fn review_prompt(&self, scenario: &Scenario, code: &str) -> String {
        let lang = &self.config.target_language;
        format!(
            "Review this {lang} solution strictly against the test cases.\n\n\
             Task: {}\n{}\n\n\
             Code:\n```{lang}\n{code}\n```\n\n\
             Test cases:\n{}\n\n\
             Answer in exactly this format:\n\
             PASS: yes|no\n\
             REASON: <one sentence>",
            scenario.title,
            scenario.task_prompt,
            bullet_list(&scenario.test_cases),
        )
    }

    fn synthetic_lesson(
        &self,
        scenario: &Scenario,
        code: &str,
        attempt_id: &str,
        session_id: &str,
    ) -> Lesson {
        let mut tags = vec![
            "synthetic".to_string(),
            "dream".to_string(),
            scenario.difficulty.as_str().to_string(),
        ];
        tags.extend(scenario.libraries.iter().cloned());

        let result = if self.config.strict_validation {
            "Solution passed review"
        } else {
            "Solution generated without review"
        };

        Lesson::new(
            format!("{}\n{}", scenario.title, scenario.task_prompt),
            code,
            result,
        )
        .with_feedback(format!("Synthetic dream {attempt_id}"))
        .with_tags(tags)
        .with_metadata(serde_json::json!({
            "source": "dream",
            "session_id": session_id,
            "attempt_id": attempt_id,
            "scenario": scenario.title,
            "difficulty": scenario.difficulty,
            "libraries": scenario.libraries,
            "validated": self.config.strict_validation,
        }))
    }

    /// Code file plus JSON sidecar. The lesson is already stored, so a
    /// failure here only degrades the attempt.
    async fn write_artifacts(
        &self,
        scenario: &Scenario,
        code: &str,
        attempt_id: &str,
        lesson_id: Uuid,
    ) -> SideEffect {
        let dir = &self.config.dreams_dir;
        let stem = format!("dream_{attempt_id}");
        let code_path = dir.join(format!("{stem}.{}", self.config.artifact_extension));
        let meta_path = dir.join(format!("{stem}.json"));

        let meta = serde_json::json!({
            "attempt_id": attempt_id,
            "lesson_id": lesson_id,
            "scenario": scenario,
            "language": self.config.target_language,
            "created_at": chrono::Utc::now().to_rfc3339(),
        });

        let written: std::io::Result<()> = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&code_path, code).await?;
            let body = serde_json::to_vec_pretty(&meta)?;
            tokio::fs::write(&meta_path, body).await
        }
        .await;

        match written {
            Ok(()) => SideEffect::Ok,
            Err(e) => {
                tracing::warn!(
                    "Failed to write dream artifacts to {}: {}",
                    dir.display(),
                    e
                );
                SideEffect::degraded(e.to_string())
            }
        }
    }

    pub fn get_statistics(&self) -> DreamStatistics {
        let total = self.total_dreams.load(Ordering::Relaxed);
        let successful = self.successful_dreams.load(Ordering::Relaxed);
        DreamStatistics {
            total_dreams: total,
            successful_dreams: successful,
            success_rate: success_rate(successful, total),
            artifact_files: count_artifacts(&self.config.dreams_dir, &self.config.artifact_extension),
            state: self.state(),
        }
    }
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none given)".to_string();
    }
    items
        .iter()
        .map(|i| format!("- {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn count_artifacts(dir: &Path, extension: &str) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let path = e.path();
            path.extension().is_some_and(|ext| ext == extension)
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("dream_"))
        })
        .count()
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
