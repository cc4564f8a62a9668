pub mod chunk;
pub mod file;
pub mod hospital;
pub mod patient_account;
pub mod receipt;
pub mod referral;

pub use chunk::{ChunkStatus, TrackedChunk, TrackedFile};
pub use file::{FileUploadStatus, ReferralFile};
pub use hospital::Hospital;
pub use patient_account::PatientAccount;
pub use receipt::ReferralReceipt;
pub use referral::{PatientFields, Referral, ReferralStatus};
