// src/core/persistence/snapshot.rs

//! Loads and saves cache snapshots in the versioned entity format.

use crate::config::PersistenceConfig;
use crate::core::errors::CdnError;
use crate::core::state::ServerState;
use crate::core::storage::CacheStore;
use crate::core::storage::codec::{decode_snapshot, encode_snapshot};
use bytes::Bytes;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, error, info, warn};

/// Loads the snapshot file into the cache store at startup.
pub struct SnapshotLoader {
    config: PersistenceConfig,
}

impl SnapshotLoader {
    pub fn new(config: PersistenceConfig) -> Self {
        Self { config }
    }

    /// Loads the configured snapshot into the store.
    ///
    /// A missing or empty file starts an empty cache. A corrupt file logs a
    /// warning and starts empty as well; the cache is reconstructible from
    /// the origin, so a bad snapshot is never fatal. Entities already stale
    /// past the sweep grace are not worth revalidating and are skipped.
    pub async fn load_into(&self, state: &Arc<ServerState>) -> Result<(), CdnError> {
        let path = &self.config.snapshot_path;
        info!("Attempting to load cache snapshot from disk at {path}");
        let metadata = match fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Snapshot file not found at {path}. Starting with an empty cache.");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if !metadata.is_file() || metadata.len() == 0 {
            info!("Snapshot file at {path} is empty or not a file. Starting fresh.");
            return Ok(());
        }

        let bytes = Bytes::from(fs::read(path).await?);
        info!(
            "Snapshot file found ({} bytes). Starting parsing...",
            bytes.len()
        );
        let entities = match decode_snapshot(&bytes) {
            Ok(entities) => entities,
            Err(e) => {
                warn!(
                    "Could not decode snapshot at {path}: {e}. Starting with an empty cache."
                );
                return Ok(());
            }
        };

        let cutoff = SystemTime::now() - state.config.cache.sweep_grace;
        let mut loaded = 0usize;
        let mut skipped = 0usize;
        for entity in entities {
            if entity.expires < cutoff {
                skipped += 1;
                continue;
            }
            state.store.put(entity).await?;
            loaded += 1;
        }
        if skipped > 0 {
            debug!("Skipped {skipped} long-stale entities while loading the snapshot.");
        }
        info!("Successfully loaded {loaded} cache entities from snapshot {path}");
        Ok(())
    }
}

/// Saves all live entities to a snapshot file at the given path.
///
/// The image is written to a temporary sibling and renamed into place, so a
/// crash mid-save leaves the previous snapshot intact.
pub async fn save(store: &Arc<dyn CacheStore>, path: &str) -> Result<(), CdnError> {
    let entities = store.dump().await;
    let bytes = encode_snapshot(&entities);

    let temp_path = format!("{}.tmp.{}", path, rand::random::<u32>());
    fs::write(&temp_path, &bytes).await?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        if let Err(remove_err) = fs::remove_file(&temp_path).await {
            error!("Additionally failed to remove temporary snapshot file '{temp_path}': {remove_err}");
        }
        return Err(e.into());
    }

    debug!(
        "Snapshot with {} entities ({} bytes) saved to {path}",
        entities.len(),
        bytes.len()
    );
    Ok(())
}
