//! Coordinator client (§4.5, §5's "Node HTTP calls inherit the underlying
//! client default" timeout note).
//!
//! `Requester` is the seam the polling engine and frontend talk through;
//! `ReqwestRequester` is the mTLS-backed production implementation and
//! `MockRequester` is the in-memory test double used by polling engine tests.

use referral_core::error::{ReferralError, ReferralResult};
use referral_wire::{
    ChunkBeginRequest, CreateReferralResponse, DownloadListResponse, GrantRequest, HospitalDto,
    ReferralDto, ReferralListResponse, UploadInitiateRequest,
};

#[allow(async_fn_in_trait)]
pub trait Requester: Send + Sync {
    async fn list_incoming(&self) -> ReferralResult<Vec<ReferralDto>>;
    async fn list_outgoing(&self) -> ReferralResult<Vec<ReferralDto>>;
    async fn list_hospitals(&self) -> ReferralResult<Vec<HospitalDto>>;
    async fn get_referral(&self, id: i64) -> ReferralResult<ReferralDto>;
    async fn create_referral(&self, body: serde_json::Value) -> ReferralResult<i64>;
    async fn grant(&self, id: i64, granted: bool) -> ReferralResult<()>;
    async fn initiate_upload(&self, id: i64, body: UploadInitiateRequest) -> ReferralResult<()>;
    async fn chunk_begin(&self, id: i64, body: ChunkBeginRequest) -> ReferralResult<()>;
    async fn upload_chunk(
        &self,
        id: i64,
        filename: &str,
        chunk_index: usize,
        bytes: Vec<u8>,
    ) -> ReferralResult<()>;
    /// `Ok(true)` on 200 complete, `Ok(false)` on 202 incomplete-files.
    async fn complete_upload(&self, id: i64) -> ReferralResult<bool>;
    async fn download_list(&self, id: i64) -> ReferralResult<DownloadListResponse>;
    async fn download_file(&self, id: i64, filename: &str) -> ReferralResult<Vec<u8>>;
    async fn mark_complete(&self, id: i64) -> ReferralResult<()>;
}

#[derive(Clone)]
pub struct ReqwestRequester {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestRequester {
    pub fn new(
        base_url: String,
        cert_pem: &[u8],
        key_pem: &[u8],
        ca_pem: &[u8],
    ) -> ReferralResult<Self> {
        let mut identity_pem = Vec::with_capacity(cert_pem.len() + key_pem.len());
        identity_pem.extend_from_slice(cert_pem);
        identity_pem.extend_from_slice(key_pem);
        let identity = reqwest::Identity::from_pem(&identity_pem)
            .map_err(|e| ReferralError::Validation(format!("invalid client identity: {e}")))?;
        let ca = reqwest::Certificate::from_pem(ca_pem)
            .map_err(|e| ReferralError::Validation(format!("invalid CA certificate: {e}")))?;
        let client = reqwest::Client::builder()
            .identity(identity)
            .add_root_certificate(ca)
            .use_rustls_tls()
            .build()
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> ReferralResult<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReferralError::Request(format!("{status}: {body}")));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))
    }
}

impl Requester for ReqwestRequester {
    async fn list_incoming(&self) -> ReferralResult<Vec<ReferralDto>> {
        let resp = self
            .client
            .get(self.url("/incoming"))
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        Ok(Self::decode::<ReferralListResponse>(resp).await?.referrals)
    }

    async fn list_outgoing(&self) -> ReferralResult<Vec<ReferralDto>> {
        let resp = self
            .client
            .get(self.url("/outgoing"))
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        Ok(Self::decode::<ReferralListResponse>(resp).await?.referrals)
    }

    async fn get_referral(&self, id: i64) -> ReferralResult<ReferralDto> {
        let resp = self
            .client
            .get(self.url(&format!("/{id}")))
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        Self::decode(resp).await
    }

    async fn list_hospitals(&self) -> ReferralResult<Vec<HospitalDto>> {
        let resp = self
            .client
            .get(self.url("/hospitals"))
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        Self::decode(resp).await
    }

    async fn create_referral(&self, body: serde_json::Value) -> ReferralResult<i64> {
        let resp = self
            .client
            .post(self.url("/"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        Ok(Self::decode::<CreateReferralResponse>(resp).await?.id)
    }

    async fn grant(&self, id: i64, granted: bool) -> ReferralResult<()> {
        let resp = self
            .client
            .post(self.url(&format!("/{id}/grant")))
            .json(&GrantRequest { granted })
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ReferralError::Request(resp.status().to_string()));
        }
        Ok(())
    }

    async fn initiate_upload(&self, id: i64, body: UploadInitiateRequest) -> ReferralResult<()> {
        let resp = self
            .client
            .post(self.url(&format!("/{id}/upload")))
            .json(&body)
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ReferralError::Request(resp.status().to_string()));
        }
        Ok(())
    }

    async fn chunk_begin(&self, id: i64, body: ChunkBeginRequest) -> ReferralResult<()> {
        let resp = self
            .client
            .post(self.url(&format!("/{id}/upload/begin")))
            .json(&body)
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ReferralError::Request(resp.status().to_string()));
        }
        Ok(())
    }

    async fn upload_chunk(
        &self,
        id: i64,
        filename: &str,
        chunk_index: usize,
        bytes: Vec<u8>,
    ) -> ReferralResult<()> {
        let resp = self
            .client
            .post(self.url(&format!("/{id}/upload/file/{filename}/{chunk_index}")))
            .body(bytes)
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ReferralError::Request(resp.status().to_string()));
        }
        Ok(())
    }

    async fn complete_upload(&self, id: i64) -> ReferralResult<bool> {
        let resp = self
            .client
            .post(self.url(&format!("/{id}/upload/complete")))
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        match resp.status().as_u16() {
            200 => Ok(true),
            202 => Ok(false),
            other => Err(ReferralError::Request(format!("unexpected status {other}"))),
        }
    }

    async fn download_list(&self, id: i64) -> ReferralResult<DownloadListResponse> {
        let resp = self
            .client
            .get(self.url(&format!("/{id}/download")))
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        Self::decode(resp).await
    }

    async fn download_file(&self, id: i64, filename: &str) -> ReferralResult<Vec<u8>> {
        let resp = self
            .client
            .get(self.url(&format!("/{id}/download/{filename}")))
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ReferralError::Request(resp.status().to_string()));
        }
        resp.bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| ReferralError::Request(e.to_string()))
    }

    async fn mark_complete(&self, id: i64) -> ReferralResult<()> {
        let resp = self
            .client
            .post(self.url(&format!("/{id}/complete")))
            .send()
            .await
            .map_err(|e| ReferralError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ReferralError::Request(resp.status().to_string()));
        }
        Ok(())
    }
}
