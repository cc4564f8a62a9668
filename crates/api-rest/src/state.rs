use std::path::PathBuf;
use std::sync::Arc;

use referral_core::db::CoordinatorRepository;

use crate::chunk_tracking::ChunkTrackingService;

#[derive(Clone)]
pub struct AppState {
    pub repo: CoordinatorRepository,
    pub tracking: Arc<ChunkTrackingService>,
    pub chunk_dir: PathBuf,
    pub payload_dir: PathBuf,
}

impl AppState {
    pub fn new(repo: CoordinatorRepository, chunk_dir: PathBuf, payload_dir: PathBuf) -> Self {
        Self {
            repo,
            tracking: Arc::new(ChunkTrackingService::new()),
            chunk_dir,
            payload_dir,
        }
    }
}
