use std::collections::HashMap;

use rand::Rng;
use uuid::Uuid;

/// Ranked-candidate accumulator for craft selection.
///
/// Entries are UUID-keyed scores in insertion order. Scores only ever
/// accumulate; nothing is removed except by replacing the whole picker.
#[derive(Debug, Default)]
pub struct EntityScorePicker {
    order: Vec<Uuid>,
    scores: HashMap<Uuid, f64>,
}

impl EntityScorePicker {
    pub fn new() -> EntityScorePicker {
        EntityScorePicker::default()
    }

    /// Insert a candidate with an initial score, or add to its score if it
    /// was already inserted. Insertion order is set by the first add.
    pub fn add(&mut self, id: Uuid, score: f64) {
        if let Some(existing) = self.scores.get_mut(&id) {
            *existing += score;
        } else {
            self.order.push(id);
            self.scores.insert(id, score);
        }
    }

    /// Adjust a candidate's score additively (inserting at 0 + delta if the
    /// candidate was never added).
    pub fn score(&mut self, id: Uuid, delta: f64) {
        self.add(id, delta);
    }

    pub fn get(&self, id: Uuid) -> Option<f64> {
        self.scores.get(&id).copied()
    }

    /// The highest-scored candidate; ties go to the earliest insertion.
    pub fn top(&self) -> Option<Uuid> {
        let mut best: Option<(Uuid, f64)> = None;
        for &id in &self.order {
            let score = self.scores[&id];
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((id, score)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// A uniformly random candidate among those tied at the maximum score.
    /// This is the only point where craft selection consults randomness.
    pub fn top_among_ties(&self, rng: &mut impl Rng) -> Option<Uuid> {
        let top = self.top()?;
        let top_score = self.scores[&top];
        let ties: Vec<Uuid> = self
            .order
            .iter()
            .copied()
            .filter(|id| self.scores[id] == top_score)
            .collect();
        if ties.len() == 1 {
            return Some(top);
        }
        Some(ties[rng.gen_range(0..ties.len())])
    }

    /// The top `n` candidates by descending score, stable on ties.
    pub fn scored(&self, n: usize) -> Vec<Uuid> {
        let mut ranked: Vec<(Uuid, f64)> = self
            .order
            .iter()
            .map(|&id| (id, self.scores[&id]))
            .collect();
        // Stable sort keeps insertion order among equal scores
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.into_iter().take(n).map(|(id, _)| id).collect()
    }

    /// All candidates by descending score, stable on ties.
    pub fn all_scored(&self) -> Vec<Uuid> {
        self.scored(self.order.len())
    }

    /// All candidates in insertion order.
    pub fn all(&self) -> &[Uuid] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
