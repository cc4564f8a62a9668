//! In-memory chunk tracking map (§4.3, §5).
//!
//! Encapsulated behind a mutex so handlers never hold the lock across chunk
//! file I/O — only the tracking structure itself is guarded, per §5's
//! "the lock protects the tracking structure only" requirement.

use std::collections::HashMap;
use std::sync::Mutex;

use referral_core::domain::{ChunkStatus, TrackedChunk, TrackedFile};
use referral_core::error::{ReferralError, ReferralResult};

#[derive(Default)]
pub struct ChunkTrackingService {
    // referralId -> filename -> TrackedFile
    inner: Mutex<HashMap<i64, HashMap<String, TrackedFile>>>,
}

impl ChunkTrackingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers tracking for a referral's files. Rejects a file that is
    /// already being tracked (concurrent `chunkBegin` for the same file).
    pub fn begin(
        &self,
        referral_id: i64,
        files: Vec<(String, Vec<(String, u64)>)>,
    ) -> ReferralResult<()> {
        let mut guard = self.inner.lock().unwrap();
        let entry = guard.entry(referral_id).or_default();
        for (name, _) in &files {
            if entry.contains_key(name) {
                return Err(ReferralError::AlreadyTracking(name.clone()));
            }
        }
        for (name, chunks) in files {
            entry.insert(
                name.clone(),
                TrackedFile {
                    name,
                    chunks: chunks
                        .into_iter()
                        .map(|(checksum, size_kb)| TrackedChunk {
                            checksum,
                            size_kb,
                            status: ChunkStatus::Incomplete,
                        })
                        .collect(),
                },
            );
        }
        Ok(())
    }

    /// Checks the computed checksum against the tracked chunk without
    /// mutating anything — call before writing the chunk body to disk, per
    /// §4.3's "tee into a hash and a buffer, compare, *then* write" order.
    pub fn validate_chunk(
        &self,
        referral_id: i64,
        filename: &str,
        chunk_index: usize,
        checksum: &str,
    ) -> ReferralResult<()> {
        let guard = self.inner.lock().unwrap();
        let tracked_file = guard
            .get(&referral_id)
            .and_then(|files| files.get(filename))
            .ok_or(ReferralError::NotTracking(referral_id))?;
        let chunk = tracked_file
            .chunks
            .get(chunk_index)
            .ok_or(ReferralError::ChunkIndexOutOfBounds)?;
        if chunk.status == ChunkStatus::Complete {
            return Err(ReferralError::ChunkAlreadyComplete);
        }
        if chunk.checksum != checksum {
            return Err(ReferralError::ChecksumMismatch);
        }
        Ok(())
    }

    /// Flips a chunk to Complete once its body is durably written to disk.
    pub fn mark_chunk_complete(
        &self,
        referral_id: i64,
        filename: &str,
        chunk_index: usize,
    ) -> ReferralResult<()> {
        let mut guard = self.inner.lock().unwrap();
        let tracked_file = guard
            .get_mut(&referral_id)
            .and_then(|files| files.get_mut(filename))
            .ok_or(ReferralError::NotTracking(referral_id))?;
        let chunk = tracked_file
            .chunks
            .get_mut(chunk_index)
            .ok_or(ReferralError::ChunkIndexOutOfBounds)?;
        chunk.status = ChunkStatus::Complete;
        Ok(())
    }

    /// A snapshot of the tracked files whose chunks are all Complete, without
    /// holding the lock while the caller assembles/hashes them.
    pub fn complete_files_snapshot(&self, referral_id: i64) -> Vec<TrackedFile> {
        let guard = self.inner.lock().unwrap();
        guard
            .get(&referral_id)
            .map(|files| {
                files
                    .values()
                    .filter(|f| f.all_complete())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn tracked_file_count(&self, referral_id: i64) -> usize {
        let guard = self.inner.lock().unwrap();
        guard.get(&referral_id).map(|f| f.len()).unwrap_or(0)
    }

    /// Drops all tracking for a referral once every file is persisted
    /// UploadComplete — tracking is ephemeral, the sqlite rows are canonical.
    pub fn drop_referral(&self, referral_id: i64) {
        self.inner.lock().unwrap().remove(&referral_id);
    }
}
