use crate::error::Result;
use crate::model::{JournalOp, Outcome, Record};
use crate::store::{ItemStore, StorageBackend};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutcomeInput {
    pub success: bool,
    pub notes: Option<String>,
    pub cost: Option<f64>,
}

/// Record how a task turned out. Replaces any earlier outcome.
pub fn run<B: StorageBackend>(
    store: &mut ItemStore<B>,
    id: &str,
    input: OutcomeInput,
) -> Result<Record> {
    store.begin()?;
    let limits = *store.limits();
    let notes = input.notes.as_deref().map(|n| limits.clamp_text(n));
    // NaN and infinities do not survive JSON.
    let cost = input.cost.filter(|c| c.is_finite());

    let record = store.modify(id, |record, now| {
        record.outcome = Some(Outcome {
            success: input.success,
            notes,
            cost,
            at: now,
        });
        Ok(())
    })?;

    let label = if input.success { "success" } else { "failure" };
    store.journal(JournalOp::Outcome, id, Some(label.to_string()));
    store.persist()?;
    Ok(record)
}
