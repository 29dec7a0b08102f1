//! # Schema Clamp: bounded ingestion
//!
//! Everything that enters the store passes through [`Limits`] first. Oversized
//! input is truncated, never rejected: ingestion must not fail because a model
//! produced a 40k-char note or fifty tags. The cost is silent data loss at the
//! boundary, which is accepted.
//!
//! ## Rules
//!
//! | Field | Rule |
//! |-------|------|
//! | title | trim, cut to `max_title_len` chars, placeholder when empty |
//! | free text | cut to `max_text_len` chars |
//! | tags | trim, cut to `max_tag_len`, drop empty, first occurrence wins, keep `max_tags` |
//! | metadata | primitives only; arrays and objects are dropped |
//! | artifacts | per-field clamps, at most `max_artifacts` per owner |
//!
//! All clamps are idempotent: clamping a clamped value returns it unchanged.

use crate::model::Drive;
use serde_json::Value;
use std::collections::BTreeMap;

pub const PLACEHOLDER_TITLE: &str = "Untitled";
pub const PLACEHOLDER_ARTIFACT_NAME: &str = "artifact";
pub const DEFAULT_ARTIFACT_KIND: &str = "text/plain";
const MAX_KIND_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_title_len: usize,
    pub max_text_len: usize,
    pub max_tags: usize,
    pub max_tag_len: usize,
    pub max_artifacts: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_title_len: 256,
            max_text_len: 20_000,
            max_tags: 16,
            max_tag_len: 48,
            max_artifacts: 12,
        }
    }
}

/// Input for creating a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDraft {
    pub title: String,
    pub utterance: String,
    pub tags: Vec<String>,
    pub drive: Drive,
    pub meta: BTreeMap<String, Value>,
}

impl RecordDraft {
    pub fn new(title: impl Into<String>, utterance: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            utterance: utterance.into(),
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn in_drive(mut self, drive: Drive) -> Self {
        self.drive = drive;
        self
    }
}

/// Input for attaching an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactDraft {
    pub name: String,
    pub text: String,
    pub kind: String,
}

impl ArtifactDraft {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            kind: DEFAULT_ARTIFACT_KIND.to_string(),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => s[..cut].to_string(),
        None => s.to_string(),
    }
}

/// Trim, cut to `max` chars, and trim again so a cut never leaves trailing blanks.
fn clamp_line(s: &str, max: usize) -> String {
    truncate_chars(s.trim(), max).trim_end().to_string()
}

impl Limits {
    pub fn clamp_title(&self, title: &str) -> String {
        let clamped = clamp_line(title, self.max_title_len);
        if clamped.is_empty() {
            truncate_chars(PLACEHOLDER_TITLE, self.max_title_len)
        } else {
            clamped
        }
    }

    pub fn clamp_text(&self, text: &str) -> String {
        truncate_chars(text, self.max_text_len)
    }

    pub fn clamp_tags<I, S>(&self, tags: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for tag in tags {
            if out.len() >= self.max_tags {
                break;
            }
            let tag = clamp_line(tag.as_ref(), self.max_tag_len);
            if tag.is_empty() || out.contains(&tag) {
                continue;
            }
            out.push(tag);
        }
        out
    }

    /// Keep primitive values only. Strings are clamped as free text.
    pub fn clamp_meta<'a, I>(&self, meta: I) -> BTreeMap<String, Value>
    where
        I: IntoIterator<Item = (&'a String, &'a Value)>,
    {
        meta.into_iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
                    Value::String(s) => Value::String(self.clamp_text(s)),
                    Value::Array(_) | Value::Object(_) => return None,
                };
                Some((clamp_line(key, self.max_tag_len), value))
            })
            .filter(|(key, _)| !key.is_empty())
            .collect()
    }

    pub fn clamp_draft(&self, draft: RecordDraft) -> RecordDraft {
        RecordDraft {
            title: self.clamp_title(&draft.title),
            utterance: self.clamp_text(&draft.utterance),
            tags: self.clamp_tags(&draft.tags),
            drive: draft.drive,
            meta: self.clamp_meta(&draft.meta),
        }
    }

    /// Tolerant ingestion from loosely-typed JSON. Wrong types fall back to defaults.
    pub fn draft_from_value(&self, raw: &Value) -> RecordDraft {
        let text = |key: &str| raw.get(key).and_then(Value::as_str).unwrap_or("");
        let tags: Vec<&str> = raw
            .get("tags")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let drive = raw
            .get("drive")
            .and_then(Value::as_str)
            .and_then(|d| d.parse::<Drive>().ok())
            .unwrap_or_default();
        let meta = raw
            .get("meta")
            .and_then(Value::as_object)
            .map(|m| self.clamp_meta(m))
            .unwrap_or_default();

        RecordDraft {
            title: self.clamp_title(text("title")),
            utterance: self.clamp_text(text("utterance")),
            tags: self.clamp_tags(tags),
            drive,
            meta,
        }
    }

    pub fn clamp_artifact(&self, draft: ArtifactDraft) -> ArtifactDraft {
        let name = clamp_line(&draft.name, self.max_title_len);
        let kind = clamp_line(&draft.kind, MAX_KIND_LEN);
        ArtifactDraft {
            name: if name.is_empty() {
                truncate_chars(PLACEHOLDER_ARTIFACT_NAME, self.max_title_len)
            } else {
                name
            },
            text: self.clamp_text(&draft.text),
            kind: if kind.is_empty() {
                DEFAULT_ARTIFACT_KIND.to_string()
            } else {
                kind
            },
        }
    }

    /// Clamp a batch, keeping only as many as fit next to `already_stored`.
    pub fn clamp_artifacts(
        &self,
        drafts: Vec<ArtifactDraft>,
        already_stored: usize,
    ) -> Vec<ArtifactDraft> {
        let room = self.max_artifacts.saturating_sub(already_stored);
        drafts
            .into_iter()
            .take(room)
            .map(|d| self.clamp_artifact(d))
            .collect()
    }

    pub fn artifacts_from_value(&self, raw: &Value) -> Vec<ArtifactDraft> {
        raw.as_array()
            .map(|items| {
                items
                    .iter()
                    .filter(|item| item.is_object())
                    .map(|item| {
                        let text = |key: &str| {
                            item.get(key)
                                .and_then(Value::as_str)
                                .unwrap_or("")
                                .to_string()
                        };
                        ArtifactDraft {
                            name: text("name"),
                            text: text("text"),
                            kind: text("type"),
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
