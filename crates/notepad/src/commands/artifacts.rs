use crate::clamp::ArtifactDraft;
use crate::error::Result;
use crate::model::{Artifact, JournalOp};
use crate::store::{ItemStore, StorageBackend};
use uuid::Uuid;

/// Attach artifacts to `owner_id`.
///
/// Each artifact is clamped, and the batch is cut so the owner never holds
/// more than `max_artifacts`. Extra drafts are dropped without error. Returns
/// what was actually stored.
pub fn attach<B: StorageBackend>(
    store: &mut ItemStore<B>,
    owner_id: &str,
    drafts: Vec<ArtifactDraft>,
) -> Result<Vec<Artifact>> {
    store.begin()?;
    store.require(owner_id)?;

    let offered = drafts.len();
    let existing = store.artifacts_of(owner_id).len();
    let kept = store.limits().clamp_artifacts(drafts, existing);
    let now = store.now();

    let artifacts: Vec<Artifact> = kept
        .into_iter()
        .map(|draft| Artifact {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: draft.name,
            text: draft.text,
            kind: draft.kind,
            created: now,
        })
        .collect();

    store.insert_artifacts(artifacts.clone());
    store.journal(
        JournalOp::Artifact,
        owner_id,
        Some(format!("stored {} of {}", artifacts.len(), offered)),
    );
    store.persist()?;
    Ok(artifacts)
}

/// Artifacts owned by `owner_id`, oldest first.
pub fn list<B: StorageBackend>(store: &ItemStore<B>, owner_id: &str) -> Vec<Artifact> {
    store.artifacts_of(owner_id).into_iter().cloned().collect()
}
