use rand::seq::SliceRandom;

use venom_types::{Result, VenomError};

use crate::traits::{EntityProfile, KnowledgeSource};

const MAX_NEIGHBORS: usize = 5;

/// Render one entity as a text fragment for the scenario weaver.
pub fn render_fragment(entity: &EntityProfile) -> String {
    let mut text = format!("Concept: {} ({})", entity.name, entity.kind);
    if !entity.description.is_empty() {
        text.push_str(&format!("\nDescription: {}", entity.description));
    }
    if !entity.neighbors.is_empty() {
        let shown: Vec<&str> = entity
            .neighbors
            .iter()
            .take(MAX_NEIGHBORS)
            .map(String::as_str)
            .collect();
        text.push_str(&format!("\nConnected to: {}", shown.join(", ")));
    }
    text
}

/// Pick up to `count` fragments: rank by degree, keep the top
/// `count * pool_factor`, then sample uniformly among them.
///
/// An empty graph yields no fragments.
pub async fn gather_fragments(
    source: &dyn KnowledgeSource,
    count: usize,
    pool_factor: usize,
) -> Result<Vec<String>> {
    if count == 0 {
        return Ok(Vec::new());
    }

    let stats = source
        .stats()
        .await
        .map_err(|e| VenomError::Knowledge(e.to_string()))?;
    if stats.node_count == 0 {
        tracing::info!("Knowledge graph is empty, nothing to dream about");
        return Ok(Vec::new());
    }

    let pool = count.saturating_mul(pool_factor.max(1));
    let candidates = source
        .top_entities(pool)
        .await
        .map_err(|e| VenomError::Knowledge(e.to_string()))?;

    let chosen: Vec<&EntityProfile> = {
        let mut rng = rand::thread_rng();
        candidates.choose_multiple(&mut rng, count).collect()
    };

    tracing::debug!(
        "Sampled {} of {} candidate entities",
        chosen.len(),
        candidates.len()
    );
    Ok(chosen.into_iter().map(render_fragment).collect())
}
