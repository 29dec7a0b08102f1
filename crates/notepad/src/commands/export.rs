use crate::error::{NotepadError, Result};
use crate::store::{ItemStore, StorageBackend, StoreState};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

/// A copy of the full store state.
pub fn state<B: StorageBackend>(store: &ItemStore<B>) -> StoreState {
    store.state().clone()
}

/// Write a `.tar.gz` holding `state.json`, one text file per record under
/// `records/` and one per artifact under `artifacts/`.
pub fn write_archive<B: StorageBackend, W: Write>(store: &ItemStore<B>, writer: W) -> Result<()> {
    let enc = GzEncoder::new(writer, Compression::default());
    let mut tar = tar::Builder::new(enc);

    let state_json = serde_json::to_string_pretty(store.state())?;
    append(&mut tar, "notepad/state.json", &state_json)?;

    for record in store.records() {
        let mut content = format!("{}\n\n{}", record.title, record.utterance);
        if !record.tags.is_empty() {
            content.push_str(&format!("\n\ntags: {}", record.tags.join(", ")));
        }
        append(
            &mut tar,
            &format!("notepad/records/{}.txt", record.id),
            &content,
        )?;
        for artifact in store.artifacts_of(&record.id) {
            append(
                &mut tar,
                &format!("notepad/artifacts/{}.txt", artifact.id),
                &format!("{}\n\n{}", artifact.name, artifact.text),
            )?;
        }
    }

    tar.into_inner()
        .and_then(|enc| enc.finish())
        .map_err(NotepadError::Io)?;
    Ok(())
}

fn append<W: Write>(tar: &mut tar::Builder<W>, name: &str, content: &str) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    tar.append_data(&mut header, name, content.as_bytes())
        .map_err(NotepadError::Io)
}
