use std::path::Path;

use anyhow::{Context, Result};
use fieldsignal_common::Checkpoint;

/// Reads the checkpoint file at `path`, or an empty `Checkpoint` if it does
/// not exist yet — resume starts fresh when no checkpoint is present.
pub fn load(path: &Path) -> Result<Checkpoint> {
    if !path.exists() {
        return Ok(Checkpoint::default());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading checkpoint {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing checkpoint {}", path.display()))
}

/// Writes `checkpoint` to `path` via write-temp-then-rename, so a crash or
/// kill mid-write never leaves a half-written checkpoint on disk.
pub fn save(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).context("creating checkpoint temp file")?;
    serde_json::to_writer_pretty(&mut tmp, checkpoint).context("serializing checkpoint")?;
    tmp.persist(path).with_context(|| format!("persisting checkpoint to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fieldsignal_common::FailedEntity;
    use uuid::Uuid;

    #[test]
    fn load_of_missing_file_is_an_empty_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        let checkpoint = load(&path).unwrap();
        assert_eq!(checkpoint.last_processed_index, 0);
        assert!(checkpoint.processed_entity_ids.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        let entity_id = Uuid::new_v4();
        let mut checkpoint = Checkpoint {
            last_processed_index: 3,
            processed_entity_ids: vec![entity_id],
            timestamp: Some(Utc::now()),
            ..Checkpoint::default()
        };
        checkpoint.failed_entities.push(FailedEntity { entity_id: Uuid::new_v4(), reason: "timeout".to_string() });

        save(&path, &checkpoint).unwrap();
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.last_processed_index, 3);
        assert_eq!(reloaded.processed_entity_ids, vec![entity_id]);
        assert_eq!(reloaded.failed_entities.len(), 1);
    }

    #[test]
    fn save_overwrites_previous_contents_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");
        save(&path, &Checkpoint { last_processed_index: 1, ..Checkpoint::default() }).unwrap();
        save(&path, &Checkpoint { last_processed_index: 2, ..Checkpoint::default() }).unwrap();
        assert_eq!(load(&path).unwrap().last_processed_index, 2);
    }
}
