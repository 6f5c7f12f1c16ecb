//! Derivation of independent random streams per spawn task.

use sha2::{Digest, Sha256};
use stage_spawner_core::{StageId, TaskId};

const RNG_STREAM_TASK: &str = "spawn-task";

/// Derives the seed of a task's stream from the global seed and its identity.
pub(crate) fn derive_task_seed(global_seed: u64, stage: StageId, task: TaskId) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(global_seed.to_le_bytes());
    hasher.update(RNG_STREAM_TASK.as_bytes());
    hasher.update(stage.get().to_le_bytes());
    hasher.update(task.get().to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[0..8]);
    u64::from_le_bytes(bytes)
}
