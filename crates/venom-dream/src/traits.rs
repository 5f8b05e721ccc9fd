use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use venom_types::{Difficulty, Lesson, Result, Scenario};

/// Aggregate size of a knowledge graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
}

/// One entity with its connectivity, as seen by the dream engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityProfile {
    pub name: String,
    pub kind: String,
    pub description: String,
    pub degree: usize,
    pub neighbors: Vec<String>,
}

/// Knowledge graph that seeds dream scenarios.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    async fn stats(&self) -> Result<GraphStats>;

    /// Up to `limit` entities, most connected first.
    async fn top_entities(&self, limit: usize) -> Result<Vec<EntityProfile>>;
}

/// Turns a knowledge fragment into a coding scenario.
#[async_trait]
pub trait ScenarioWeaver: Send + Sync {
    async fn weave(
        &self,
        fragment: &str,
        difficulty: Option<Difficulty>,
        libraries: &[String],
    ) -> Result<Scenario>;
}

/// Free-text prompt in, free-text response out.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    fn name(&self) -> &str;
}

/// Durable store for lessons.
#[async_trait]
pub trait LessonsStore: Send + Sync {
    async fn add(&self, lesson: Lesson) -> Result<Uuid>;
}
