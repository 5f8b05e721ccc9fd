use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use venom_types::Result;

use crate::traits::{EntityProfile, GraphStats, KnowledgeSource};

#[derive(Debug, Clone)]
struct EntityNode {
    kind: String,
    description: String,
}

/// Undirected entity graph held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKnowledgeGraph {
    entities: Arc<DashMap<String, EntityNode>>,
    adjacency: Arc<DashMap<String, BTreeSet<String>>>,
}

impl InMemoryKnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity.
    pub fn add_entity(
        &self,
        name: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) {
        let name = name.into();
        self.adjacency.entry(name.clone()).or_default();
        self.entities.insert(
            name,
            EntityNode {
                kind: kind.into(),
                description: description.into(),
            },
        );
    }

    /// Connect two entities, creating bare nodes for unknown names.
    /// Self-loops are ignored. Returns `false` if the edge already existed.
    pub fn add_relation(&self, a: &str, b: &str) -> bool {
        if a == b {
            return false;
        }
        for name in [a, b] {
            if !self.entities.contains_key(name) {
                self.add_entity(name, "concept", "");
            }
        }
        let inserted = self
            .adjacency
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.adjacency
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
        inserted
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn profile(&self, name: &str) -> Option<EntityProfile> {
        let node = self.entities.get(name)?;
        let neighbors: Vec<String> = self
            .adjacency
            .get(name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        Some(EntityProfile {
            name: name.to_string(),
            kind: node.kind.clone(),
            description: node.description.clone(),
            degree: neighbors.len(),
            neighbors,
        })
    }
}

#[async_trait]
impl KnowledgeSource for InMemoryKnowledgeGraph {
    async fn stats(&self) -> Result<GraphStats> {
        let endpoints: usize = self.adjacency.iter().map(|e| e.value().len()).sum();
        Ok(GraphStats {
            node_count: self.entities.len(),
            edge_count: endpoints / 2,
        })
    }

    async fn top_entities(&self, limit: usize) -> Result<Vec<EntityProfile>> {
        let names: Vec<String> = self.entities.iter().map(|e| e.key().clone()).collect();
        let mut profiles: Vec<EntityProfile> =
            names.iter().filter_map(|n| self.profile(n)).collect();
        profiles.sort_by(|a, b| b.degree.cmp(&a.degree).then_with(|| a.name.cmp(&b.name)));
        profiles.truncate(limit);
        Ok(profiles)
    }
}
