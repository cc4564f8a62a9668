//! Node-local doctor/referral assignment (§3, §11). Purely local bookkeeping
//! on the hospital node — the coordinator has no concept of a receipt.

#[derive(Debug, Clone)]
pub struct ReferralReceipt {
    pub referral_id: i64,
    pub doctor_id: String,
}
