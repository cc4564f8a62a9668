//! Single sequential poll loop (§4.5, §5).
//!
//! No `tickerPaused` flag: `tokio::time::interval` already can't fire the
//! next tick until this one's future resolves, which is exactly the
//! single-threaded-cooperative guarantee §5 asks for. Within a tick, the
//! download sub-flow still fans out one task per file and joins them.

use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::join_all;
use referral_core::crypto::{decrypt_file, encrypt_file, generate_payload_key, sha256_hex};
use referral_core::db::NodeRepository;
use referral_core::domain::referral::ReferralStatus;
use referral_core::error::{ReferralError, ReferralResult};
use referral_wire::{
    ChunkBeginRequest, ChunkFileSpec, ChunkSpec, FileManifestEntry, ReferralDto,
    UploadInitiateRequest,
};

use crate::client::Requester;

/// Files at or below this size travel as a single chunk; larger files are
/// split on this boundary (open design decision — not specified upstream).
pub const CHUNK_SIZE_BYTES: usize = 1024 * 1024;

pub struct PollingEngine<R: Requester> {
    requester: R,
    repo: NodeRepository,
    upload_dir: PathBuf,
    origin_payload_dir: PathBuf,
    dest_payload_dir: PathBuf,
    result_dir: PathBuf,
    chunk_size: usize,
}

impl<R: Requester> PollingEngine<R> {
    pub fn new(
        requester: R,
        repo: NodeRepository,
        upload_dir: PathBuf,
        origin_payload_dir: PathBuf,
        dest_payload_dir: PathBuf,
        result_dir: PathBuf,
    ) -> Self {
        Self {
            requester,
            repo,
            upload_dir,
            origin_payload_dir,
            dest_payload_dir,
            result_dir,
            chunk_size: CHUNK_SIZE_BYTES,
        }
    }

    /// One sweep of `/incoming` and `/outgoing` at startup, pre-marking every
    /// referral already in a terminal-for-notification state as notified so
    /// a restart doesn't re-fire a mail that already went out (§4.5).
    pub async fn warm_up_notifications(&self) -> ReferralResult<()> {
        for referral in self.requester.list_incoming().await? {
            let kind = match status_of(&referral) {
                ReferralStatus::Consented => Some("consent"),
                ReferralStatus::Complete => Some("complete"),
                _ => None,
            };
            if let Some(kind) = kind {
                self.repo.mark_notified_once(referral.id, kind)?;
            }
        }
        for referral in self.requester.list_outgoing().await? {
            let kind = match status_of(&referral) {
                ReferralStatus::Complete => Some("complete"),
                ReferralStatus::NotGranted => Some("not-granted"),
                _ => None,
            };
            if let Some(kind) = kind {
                self.repo.mark_notified_once(referral.id, kind)?;
            }
        }
        Ok(())
    }

    pub async fn run_forever(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.tick().await {
                tracing::error!(error = %err, "poll tick failed");
            }
        }
    }

    async fn tick(&self) -> ReferralResult<()> {
        let hospitals = self.requester.list_hospitals().await.unwrap_or_default();
        self.incoming_phase(&hospitals).await?;
        self.outgoing_phase(&hospitals).await?;
        Ok(())
    }

    async fn incoming_phase(&self, hospitals: &[referral_wire::HospitalDto]) -> ReferralResult<()> {
        for referral in self.requester.list_incoming().await? {
            match status_of(&referral) {
                ReferralStatus::Consented => self.notify_once(
                    referral.id,
                    "consent",
                    "grant request pending",
                    &referral.origin,
                    hospitals,
                )?,
                ReferralStatus::Complete => self.notify_once(
                    referral.id,
                    "complete",
                    "complete",
                    &referral.origin,
                    hospitals,
                )?,
                ReferralStatus::UploadComplete => self.download_subflow(&referral).await?,
                _ => {}
            }
        }
        Ok(())
    }

    async fn outgoing_phase(&self, hospitals: &[referral_wire::HospitalDto]) -> ReferralResult<()> {
        for referral in self.requester.list_outgoing().await? {
            match status_of(&referral) {
                ReferralStatus::Granted => {
                    let dir = self.origin_payload_dir.join(referral.id.to_string());
                    if !dir.exists() {
                        self.encrypt_and_initiate(&referral).await?;
                    }
                }
                ReferralStatus::UploadIncomplete => {
                    self.push_chunks_and_complete(&referral).await?;
                }
                ReferralStatus::Complete => self.notify_once(
                    referral.id,
                    "complete",
                    "complete",
                    &referral.destination,
                    hospitals,
                )?,
                ReferralStatus::NotGranted => self.notify_once(
                    referral.id,
                    "not-granted",
                    "not granted",
                    &referral.destination,
                    hospitals,
                )?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Fires (at most once per referral/kind) a log line standing in for the
    /// out-of-scope email hook (§1, §4.5), naming the counterpart hospital
    /// resolved from the directory (§11).
    fn notify_once(
        &self,
        referral_id: i64,
        kind: &str,
        label: &str,
        counterpart_hospital_id: &str,
        hospitals: &[referral_wire::HospitalDto],
    ) -> ReferralResult<()> {
        if self.repo.mark_notified_once(referral_id, kind)? {
            let counterpart = hospitals
                .iter()
                .find(|h| h.hospital_id == counterpart_hospital_id)
                .map(|h| h.name.as_str())
                .unwrap_or(counterpart_hospital_id);
            tracing::info!(referral_id, label, counterpart, "notification fired");
        }
        Ok(())
    }

    async fn encrypt_and_initiate(&self, referral: &ReferralDto) -> ReferralResult<()> {
        let files_dir = self.upload_dir.join(referral.id.to_string()).join("files");
        let out_dir = self.origin_payload_dir.join(referral.id.to_string());
        tokio::fs::create_dir_all(&out_dir).await?;

        let key = generate_payload_key();
        let mut manifest = Vec::new();
        let mut entries = tokio::fs::read_dir(&files_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let plaintext = tokio::fs::read(entry.path()).await?;
            let ciphertext = encrypt_file(&plaintext, &key)?;
            let checksum = sha256_hex(&ciphertext);
            tokio::fs::write(out_dir.join(&name), &ciphertext).await?;
            manifest.push(FileManifestEntry { name, checksum });
        }

        self.requester
            .initiate_upload(
                referral.id,
                UploadInitiateRequest {
                    payload_key: key,
                    files: manifest,
                },
            )
            .await
    }

    async fn push_chunks_and_complete(&self, referral: &ReferralDto) -> ReferralResult<()> {
        let out_dir = self.origin_payload_dir.join(referral.id.to_string());
        let mut entries = tokio::fs::read_dir(&out_dir).await?;
        let mut chunk_files = Vec::new();
        let mut per_file_chunks: Vec<(String, Vec<Vec<u8>>)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let bytes = tokio::fs::read(entry.path()).await?;
            let chunks = split_into_chunks(&bytes, self.chunk_size);
            let specs = chunks
                .iter()
                .map(|c| ChunkSpec {
                    checksum: sha256_hex(c),
                    size_kb: (c.len() as u64).div_ceil(1024),
                })
                .collect();
            chunk_files.push(ChunkFileSpec {
                name: name.clone(),
                chunks: specs,
            });
            per_file_chunks.push((name, chunks));
        }

        self.requester
            .chunk_begin(referral.id, ChunkBeginRequest { chunk_files })
            .await?;

        for (name, chunks) in per_file_chunks {
            for (index, chunk) in chunks.into_iter().enumerate() {
                self.requester
                    .upload_chunk(referral.id, &name, index, chunk)
                    .await?;
            }
        }

        self.requester.complete_upload(referral.id).await?;
        Ok(())
    }

    async fn download_subflow(&self, referral: &ReferralDto) -> ReferralResult<()> {
        let manifest = self.requester.download_list(referral.id).await?;
        let dest_dir = self.dest_payload_dir.join(referral.id.to_string());
        // Backed by the persisted node_files table, not just a directory
        // listing, so this survives a node restart mid-download (§11).
        let mut already_complete = true;
        for f in &manifest.files {
            if !self.repo.is_file_downloaded(referral.id, &f.name)? && !dest_dir.join(&f.name).exists() {
                already_complete = false;
                break;
            }
        }
        if already_complete {
            self.requester.mark_complete(referral.id).await?;
            return Ok(());
        }

        tokio::fs::create_dir_all(&dest_dir).await?;
        let result_dir = self.result_dir.join(referral.id.to_string());
        tokio::fs::create_dir_all(&result_dir).await?;

        let downloads = manifest.files.iter().map(|file| {
            let name = file.name.clone();
            let referral_id = referral.id;
            let payload_key = manifest.payload_key.clone();
            let dest_dir = dest_dir.clone();
            let result_dir = result_dir.clone();
            async move {
                let ciphertext = self.requester.download_file(referral_id, &name).await?;
                tokio::fs::write(dest_dir.join(&name), &ciphertext).await?;
                match decrypt_file(&ciphertext, &payload_key) {
                    Ok(plaintext) => {
                        tokio::fs::write(result_dir.join(&name), plaintext).await?;
                        self.repo.mark_file_downloaded(
                            referral_id,
                            &name,
                            &sha256_hex(&ciphertext),
                        )?;
                        Ok(())
                    }
                    Err(_) => {
                        // Discarded, per §4.4 — retried on the next tick.
                        let _ = tokio::fs::remove_file(dest_dir.join(&name)).await;
                        Err(ReferralError::DecryptionFailed)
                    }
                }
            }
        });

        let results = join_all(downloads).await;
        for result in results {
            result?;
        }

        self.requester.mark_complete(referral.id).await
    }
}

fn status_of(referral: &ReferralDto) -> ReferralStatus {
    ReferralStatus::parse(&referral.status).unwrap_or(ReferralStatus::Created)
}

fn split_into_chunks(bytes: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    if bytes.is_empty() {
        return vec![Vec::new()];
    }
    bytes.chunks(chunk_size).map(|c| c.to_vec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use referral_wire::HospitalDto;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn split_into_chunks_respects_boundary() {
        let bytes = vec![0u8; 2500];
        let chunks = split_into_chunks(&bytes, 1024);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1024);
        assert_eq!(chunks[2].len(), 452);
    }

    #[test]
    fn small_file_is_a_single_chunk() {
        let bytes = vec![1u8; 10];
        let chunks = split_into_chunks(&bytes, CHUNK_SIZE_BYTES);
        assert_eq!(chunks.len(), 1);
    }

    /// In-memory double standing in for the coordinator, mirroring the
    /// original client's own mock HTTP requester for polling-engine tests.
    #[derive(Default)]
    struct MockRequester {
        incoming: Vec<ReferralDto>,
        outgoing: Vec<ReferralDto>,
        download_manifest: Option<referral_wire::DownloadListResponse>,
        complete_calls: StdMutex<Vec<i64>>,
    }

    fn referral_dto(id: i64, origin: &str, destination: &str, status: &str) -> ReferralDto {
        ReferralDto {
            id,
            origin: origin.into(),
            destination: destination.into(),
            department: "cardiology".into(),
            reason: "checkup".into(),
            citizen_id: "c".into(),
            prefix: "mr".into(),
            first_name: "a".into(),
            last_name: "b".into(),
            birth_date: "2006-02-01".into(),
            address: String::new(),
            gender: "male".into(),
            telephone: "0000000000".into(),
            email: "b@a.b".into(),
            status: status.into(),
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    impl Requester for MockRequester {
        async fn list_incoming(&self) -> ReferralResult<Vec<ReferralDto>> {
            Ok(self.incoming.clone())
        }
        async fn list_outgoing(&self) -> ReferralResult<Vec<ReferralDto>> {
            Ok(self.outgoing.clone())
        }
        async fn list_hospitals(&self) -> ReferralResult<Vec<HospitalDto>> {
            Ok(vec![HospitalDto {
                hospital_id: "2222".into(),
                name: "Second Private Hospital".into(),
            }])
        }
        async fn get_referral(&self, _id: i64) -> ReferralResult<ReferralDto> {
            unimplemented!()
        }
        async fn create_referral(&self, _body: serde_json::Value) -> ReferralResult<i64> {
            unimplemented!()
        }
        async fn grant(&self, _id: i64, _granted: bool) -> ReferralResult<()> {
            unimplemented!()
        }
        async fn initiate_upload(
            &self,
            _id: i64,
            _body: UploadInitiateRequest,
        ) -> ReferralResult<()> {
            unimplemented!()
        }
        async fn chunk_begin(&self, _id: i64, _body: ChunkBeginRequest) -> ReferralResult<()> {
            unimplemented!()
        }
        async fn upload_chunk(
            &self,
            _id: i64,
            _filename: &str,
            _chunk_index: usize,
            _bytes: Vec<u8>,
        ) -> ReferralResult<()> {
            unimplemented!()
        }
        async fn complete_upload(&self, _id: i64) -> ReferralResult<bool> {
            unimplemented!()
        }
        async fn download_list(
            &self,
            _id: i64,
        ) -> ReferralResult<referral_wire::DownloadListResponse> {
            Ok(self.download_manifest.clone().unwrap_or(referral_wire::DownloadListResponse {
                files: vec![],
                payload_key: String::new(),
            }))
        }
        async fn download_file(&self, _id: i64, _filename: &str) -> ReferralResult<Vec<u8>> {
            unimplemented!()
        }
        async fn mark_complete(&self, id: i64) -> ReferralResult<()> {
            self.complete_calls.lock().unwrap().push(id);
            Ok(())
        }
    }

    fn engine(requester: MockRequester) -> PollingEngine<MockRequester> {
        let repo = NodeRepository::open_in_memory().unwrap();
        let dir = tempfile::tempdir().unwrap().into_path();
        PollingEngine::new(
            requester,
            repo,
            dir.join("upload"),
            dir.join("origin"),
            dir.join("dest"),
            dir.join("result"),
        )
    }

    #[tokio::test]
    async fn warm_up_marks_already_terminal_referrals_as_notified() {
        let requester = MockRequester {
            incoming: vec![referral_dto(1, "1111", "2222", "Consented")],
            outgoing: vec![referral_dto(2, "1111", "2222", "NotGranted")],
            ..Default::default()
        };
        let engine = engine(requester);
        engine.warm_up_notifications().await.unwrap();

        assert!(!engine.repo.mark_notified_once(1, "consent").unwrap());
        assert!(!engine.repo.mark_notified_once(2, "not-granted").unwrap());
    }

    #[tokio::test]
    async fn complete_notification_fires_once_per_referral() {
        let requester = MockRequester {
            incoming: vec![referral_dto(1, "1111", "2222", "Complete")],
            ..Default::default()
        };
        let engine = engine(requester);
        let hospitals = engine.requester.list_hospitals().await.unwrap();
        engine.incoming_phase(&hospitals).await.unwrap();
        engine.incoming_phase(&hospitals).await.unwrap();

        assert!(!engine.repo.mark_notified_once(1, "complete").unwrap());
    }

    #[tokio::test]
    async fn upload_complete_download_subflow_marks_complete_when_already_downloaded() {
        // An empty manifest is trivially "already complete" (every manifest
        // filename is vacuously present), so the subflow should go straight
        // to `mark_complete` without touching the download path.
        let requester = MockRequester {
            download_manifest: Some(referral_wire::DownloadListResponse {
                files: vec![],
                payload_key: String::new(),
            }),
            ..Default::default()
        };
        let engine = engine(requester);
        let referral = referral_dto(7, "1111", "2222", "UploadComplete");
        tokio::fs::create_dir_all(engine.dest_payload_dir.join("7"))
            .await
            .unwrap();

        engine.download_subflow(&referral).await.unwrap();
        assert_eq!(*engine.requester.complete_calls.lock().unwrap(), vec![7]);
    }
}
