use crate::index::{score, tokenize};
use crate::model::Record;
use crate::store::{ItemStore, StorageBackend};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub record: Record,
    pub score: f64,
}

/// Keyword search over every record still in the store.
///
/// Candidates are records sharing at least one token with the query. They are
/// ranked by [`crate::index::score`], ties broken by recency then id.
pub fn run<B: StorageBackend>(store: &ItemStore<B>, query: &str) -> Vec<SearchHit> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return Vec::new();
    }
    let now = store.now();
    let mut hits: Vec<SearchHit> = store
        .index()
        .candidates(&tokens)
        .iter()
        .filter_map(|id| store.get(id))
        .map(|record| SearchHit {
            score: score(record, &tokens, now),
            record: record.clone(),
        })
        .collect();
    hits.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.record.updated.cmp(&a.record.updated))
            .then_with(|| a.record.id.cmp(&b.record.id))
    });
    hits
}
