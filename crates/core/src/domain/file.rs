//! Per-referral file rows (§3). `upload_status` is monotonic: once
//! `UploadComplete`, `checksum` is frozen and never rewritten.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileUploadStatus {
    UploadIncomplete,
    UploadComplete,
}

impl FileUploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileUploadStatus::UploadIncomplete => "UploadIncomplete",
            FileUploadStatus::UploadComplete => "UploadComplete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UploadIncomplete" => Some(FileUploadStatus::UploadIncomplete),
            "UploadComplete" => Some(FileUploadStatus::UploadComplete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReferralFile {
    pub id: i64,
    pub referral_id: i64,
    pub name: String,
    pub checksum: String,
    pub upload_status: FileUploadStatus,
    pub parent_path: String,
}
