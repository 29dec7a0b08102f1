//! # Search Index
//!
//! An inverted index from lower-cased token to the ids of records containing
//! it. Tokens come from the title, body and tags of a record, in that order.
//!
//! ## Tokenization
//!
//! 1. Lower-case the text.
//! 2. Every non-alphanumeric char becomes a separator.
//! 3. Split on whitespace and keep the first [`MAX_TOKENS`] tokens.
//!
//! No stemming, no stop words: `"Ship-v1!"` yields `["ship", "v1"]`.
//!
//! ## Maintenance
//!
//! [`SearchIndex::reindex`] scans every bucket to drop the id before inserting
//! the fresh token set, so a record's old tokens can never linger. The scan is
//! linear in the number of buckets, which is fine for hundreds to a few
//! thousand records. Buckets that empty out are removed.
//!
//! ## Ranking
//!
//! Candidates are the union of every bucket hit by a query token. Each is
//! scored by [`score`]: exact tag matches plus an exponential recency decay
//! with a 7-day scale.

use crate::model::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const MAX_TOKENS: usize = 64;
const RECENCY_SCALE_DAYS: f64 = 7.0;
const MS_PER_DAY: f64 = 86_400_000.0;

pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .take(MAX_TOKENS)
        .map(str::to_string)
        .collect()
}

/// Tokens for a record: title, body and tags concatenated, then capped.
pub fn record_tokens(record: &Record) -> Vec<String> {
    let text = format!(
        "{} {} {}",
        record.title,
        record.utterance,
        record.tags.join(" ")
    );
    tokenize(&text)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchIndex {
    buckets: BTreeMap<String, BTreeSet<String>>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace everything indexed for `id` with `tokens`.
    pub fn reindex<I>(&mut self, id: &str, tokens: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.remove(id);
        for token in tokens {
            self.buckets.entry(token).or_default().insert(id.to_string());
        }
    }

    /// Drop `id` from every bucket, deleting buckets that become empty.
    pub fn remove(&mut self, id: &str) {
        self.buckets.retain(|_, ids| {
            ids.remove(id);
            !ids.is_empty()
        });
    }

    /// Ids matching any of the tokens.
    pub fn candidates(&self, tokens: &[String]) -> BTreeSet<String> {
        tokens
            .iter()
            .filter_map(|t| self.buckets.get(t))
            .flat_map(|ids| ids.iter().cloned())
            .collect()
    }

    pub fn bucket(&self, token: &str) -> Option<&BTreeSet<String>> {
        self.buckets.get(token)
    }

    /// True if any bucket still lists `id`.
    pub fn references(&self, id: &str) -> bool {
        self.buckets.values().any(|ids| ids.contains(id))
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Tag-exact matches plus `exp(-days_since_update / 7)`.
pub fn score(record: &Record, query_tokens: &[String], now: DateTime<Utc>) -> f64 {
    let tag_hits = record
        .tags
        .iter()
        .filter(|tag| {
            let tag = tag.to_lowercase();
            query_tokens.iter().any(|q| *q == tag)
        })
        .count() as f64;
    let age_ms = (now - record.updated).num_milliseconds().max(0) as f64;
    tag_hits + (-(age_ms / MS_PER_DAY) / RECENCY_SCALE_DAYS).exp()
}
