//! Coordinator/node-shared error type.
//!
//! One enum covers both processes because the failure taxonomy is the same
//! one named in the error-handling design: validation, identity,
//! authorization, not-found, state, integrity, partial-completion and
//! transport/IO. Each variant carries what `IntoResponse` (on the coordinator)
//! or the retry logic (on the node) needs to act on it.

#[derive(Debug, thiserror::Error)]
pub enum ReferralError {
    #[error("{0}")]
    Validation(String),

    #[error("Certificate Error")]
    Identity,

    #[error("Unknown hospital")]
    UnknownHospital,

    #[error("{0}")]
    Authorization(String),

    #[error("referral '{0}' not found")]
    NotFound(i64),

    #[error("referral is in state {0}")]
    IllegalState(String),

    #[error("Checksum mismatch")]
    ChecksumMismatch,

    #[error("file '{0}' does not exist in referral")]
    UnknownFile(String),

    #[error("file '{0}' has already been uploaded")]
    AlreadyUploaded(String),

    #[error("file '{0}' is uploading")]
    AlreadyTracking(String),

    #[error("referral '{0}' is not accepting chunks")]
    NotAcceptingChunks(i64),

    #[error("chunk index is out of bounds")]
    ChunkIndexOutOfBounds,

    #[error("chunk is already complete")]
    ChunkAlreadyComplete,

    #[error("Not tracking referral '{0}'")]
    NotTracking(i64),

    #[error("Incomplete files")]
    IncompleteFiles,

    #[error("invalid PayloadKey: {0}")]
    InvalidPayloadKey(String),

    #[error("GCM authentication failed")]
    DecryptionFailed,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("request error: {0}")]
    Request(String),
}

pub type ReferralResult<T> = std::result::Result<T, ReferralError>;

impl ReferralError {
    /// HTTP status the coordinator reports for this error kind.
    pub fn status_code(&self) -> u16 {
        use ReferralError::*;
        match self {
            NotFound(_) => 404,
            IncompleteFiles => 202,
            Database(_) | Io(_) | Request(_) => 500,
            Validation(_)
            | Identity
            | UnknownHospital
            | Authorization(_)
            | IllegalState(_)
            | ChecksumMismatch
            | UnknownFile(_)
            | AlreadyUploaded(_)
            | AlreadyTracking(_)
            | NotAcceptingChunks(_)
            | ChunkIndexOutOfBounds
            | ChunkAlreadyComplete
            | NotTracking(_)
            | InvalidPayloadKey(_)
            | DecryptionFailed => 400,
        }
    }
}
