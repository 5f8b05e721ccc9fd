use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use venom_types::{Lesson, Result, VenomError};

use crate::traits::LessonsStore;

/// In-memory lessons store with id and tag indexes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLessonsStore {
    lessons: Arc<RwLock<Vec<Lesson>>>,
    index_by_id: Arc<DashMap<Uuid, usize>>,
    index_by_tag: Arc<DashMap<String, Vec<usize>>>,
}

impl InMemoryLessonsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, id: Uuid) -> Option<Lesson> {
        let lessons = self.lessons.read().await;
        self.index_by_id
            .get(&id)
            .and_then(|idx| lessons.get(*idx).cloned())
    }

    pub async fn by_tag(&self, tag: &str) -> Vec<Lesson> {
        let lessons = self.lessons.read().await;
        self.index_by_tag
            .get(tag)
            .map(|indices| {
                indices
                    .iter()
                    .filter_map(|i| lessons.get(*i).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn all(&self) -> Vec<Lesson> {
        self.lessons.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.lessons.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.lessons.read().await.is_empty()
    }
}

#[async_trait]
impl LessonsStore for InMemoryLessonsStore {
    async fn add(&self, lesson: Lesson) -> Result<Uuid> {
        let mut lessons = self.lessons.write().await;
        let idx = lessons.len();
        let id = lesson.id;

        self.index_by_id.insert(id, idx);
        for tag in &lesson.tags {
            self.index_by_tag.entry(tag.clone()).or_default().push(idx);
        }

        lessons.push(lesson);
        Ok(id)
    }
}

/// Append-only lessons file, one JSON object per line.
#[derive(Debug)]
pub struct JsonlLessonsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlLessonsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every lesson back. A missing file is an empty store; a corrupt
    /// line is skipped with a warning.
    pub async fn load_all(&self) -> Result<Vec<Lesson>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lessons = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Lesson>(line) {
                Ok(lesson) => lessons.push(lesson),
                Err(e) => tracing::warn!(
                    "Skipping corrupt lesson at {}:{}: {}",
                    self.path.display(),
                    n + 1,
                    e
                ),
            }
        }
        Ok(lessons)
    }
}

#[async_trait]
impl LessonsStore for JsonlLessonsStore {
    async fn add(&self, lesson: Lesson) -> Result<Uuid> {
        let mut line = serde_json::to_string(&lesson)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| VenomError::Lessons(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!("Lesson {} appended to {}", lesson.id, self.path.display());
        Ok(lesson.id)
    }
}
