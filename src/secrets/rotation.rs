//! Secret rotation with retained history.
//!
//! Superseded values are kept under `<key>.__history.<n>`, where slot 1 is
//! the most recently replaced value. Rotation is a sequence of independent
//! backend calls and is not atomic: a failure part way through can leave the
//! history partially shifted.

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, info};

use super::backends::SecretBackend;
use super::error::SecretsError;
use crate::errors::{Error, Result};

const HISTORY_MARKER: &str = ".__history.";

/// Largest retention count accepted from configuration or the command line.
pub const MAX_HISTORY_KEEP: usize = 100;

/// Key of history slot `slot` for `key`.
pub fn history_key(key: &str, slot: usize) -> String {
    format!("{}{}{}", key, HISTORY_MARKER, slot)
}

/// Slot number if `candidate` is a history key of `key`.
fn history_slot(key: &str, candidate: &str) -> Option<usize> {
    candidate
        .strip_prefix(key)?
        .strip_prefix(HISTORY_MARKER)?
        .parse()
        .ok()
        .filter(|slot| *slot >= 1)
}

/// What a rotation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
    /// Whether a previous value was moved into slot 1
    pub archived: bool,
    /// History slots removed because they exceed the retention count
    pub pruned: Vec<usize>,
}

/// One retained previous value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub slot: usize,
    pub value: String,
}

async fn get_optional(backend: &dyn SecretBackend, key: &str) -> Result<Option<String>> {
    match backend.get(key).await {
        Ok(value) => Ok(Some(value)),
        Err(SecretsError::NotFound { .. }) => Ok(None),
        Err(e) => Err(Error::rotation(key, e)),
    }
}

async fn delete_if_present(backend: &dyn SecretBackend, key: &str) -> Result<bool> {
    match backend.delete(key).await {
        Ok(()) => Ok(true),
        Err(SecretsError::NotFound { .. }) => Ok(false),
        Err(e) => Err(Error::rotation(key, e)),
    }
}

/// Replace `key` with `new_value`, keeping at most `keep` previous values.
///
/// With `keep == 0` nothing is archived and any existing history is removed.
pub async fn rotate(
    backend: &dyn SecretBackend,
    key: &str,
    new_value: &str,
    keep: usize,
) -> Result<RotationOutcome> {
    let current = get_optional(backend, key).await?;
    let archived = current.is_some() && keep > 0;

    if let Some(current) = current.filter(|_| keep > 0) {
        // Only slots up to one past the highest occupied one can change
        let top = existing_slots(backend, key).await?.last().copied().unwrap_or(0);
        for slot in (2..=keep.min(top.saturating_add(1))).rev() {
            let target = history_key(key, slot);
            match get_optional(backend, &history_key(key, slot - 1)).await? {
                Some(previous) => {
                    backend.set(&target, &previous).await.map_err(|e| Error::rotation(&target, e))?
                }
                None => {
                    delete_if_present(backend, &target).await?;
                }
            }
        }
        let first = history_key(key, 1);
        backend.set(&first, &current).await.map_err(|e| Error::rotation(&first, e))?;
    }

    backend.set(key, new_value).await.map_err(|e| Error::rotation(key, e))?;

    let pruned = prune(backend, key, keep).await?;
    info!(key = %key, archived, keep, pruned = pruned.len(), "Rotated secret");
    Ok(RotationOutcome { archived, pruned })
}

/// Occupied history slots of `key`, ascending.
async fn existing_slots(backend: &dyn SecretBackend, key: &str) -> Result<Vec<usize>> {
    let listed = backend.list().await.map_err(|e| Error::rotation(key, e))?;
    let mut slots: Vec<usize> =
        listed.iter().filter_map(|candidate| history_slot(key, candidate)).collect();
    slots.sort_unstable();
    Ok(slots)
}

/// Delete history slots above `keep`.
async fn prune(backend: &dyn SecretBackend, key: &str, keep: usize) -> Result<Vec<usize>> {
    let mut slots: Vec<usize> =
        existing_slots(backend, key).await?.into_iter().filter(|slot| *slot > keep).collect();
    // Backends that do not list history still get the first excess slot removed
    let next = keep.saturating_add(1);
    if next > keep && !slots.contains(&next) {
        slots.push(next);
        slots.sort_unstable();
    }

    let mut pruned = Vec::new();
    for slot in slots {
        if delete_if_present(backend, &history_key(key, slot)).await? {
            debug!(key = %key, slot, "Pruned history slot");
            pruned.push(slot);
        }
    }
    Ok(pruned)
}

/// Retained history for `key`, slot 1 first.
pub async fn history(backend: &dyn SecretBackend, key: &str) -> Result<Vec<HistoryEntry>> {
    let slots = existing_slots(backend, key).await?;
    let mut entries = Vec::with_capacity(slots.len());
    for slot in slots {
        if let Some(value) = get_optional(backend, &history_key(key, slot)).await? {
            entries.push(HistoryEntry { slot, value });
        }
    }
    Ok(entries)
}

/// Random alphanumeric secret of `len` characters.
pub fn generate_secret(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}
