pub mod download;
pub mod hospitals;
pub mod patient;
pub mod referral;
pub mod upload;
