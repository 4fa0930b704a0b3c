//! Error types for the CMP engines.
//!
//! Every fault carries a stable kind plus free-text context; layers add
//! their own context to the text when rethrowing so the final message reads
//! outermost-first, the way the original error-queue pattern accumulated
//! error data.

use thiserror::Error;

use crate::status::PkiStatus;
use crate::types::BodyType;

/// Result type alias using [`CmpError`].
pub type Result<T> = std::result::Result<T, CmpError>;

/// Errors that can occur while driving or answering CMP transactions.
#[derive(Debug, Error)]
pub enum CmpError {
    /// A required input was not provided by the caller.
    #[error("missing required argument: {0}")]
    NullArgument(String),

    /// Caller-provided inputs are inconsistent.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// The header's sender is not a directory name.
    #[error("sender GeneralName type not supported")]
    SenderGeneralNameTypeNotSupported,

    /// The response's transactionID differs from the session's.
    #[error("transactionID unmatched")]
    TransactionIdUnmatched,

    /// The response's recipNonce is absent or does not echo the request's
    /// senderNonce.
    #[error("nonces do not match")]
    NoncesDoNotMatch,

    /// Protection verification failed, or an unprotected message was not
    /// covered by any exception.
    #[error("error validating protection: {0}")]
    ErrorValidatingProtection(String),

    /// No response message was obtained from the peer.
    #[error("failed to receive PKIMessage: {0}")]
    FailedToReceivePkiMessage(String),

    /// The request could not be handed to the transfer seam.
    #[error("error transferring out: {0}")]
    ErrorTransferringOut(String),

    /// A message failed to encode or decode.
    #[error("error decoding message: {0}")]
    ErrorDecodingMessage(String),

    /// DER-level codec fault.
    #[error("DER error: {0}")]
    Der(#[from] der::Error),

    /// The response body type is not valid for the current exchange.
    #[error("unexpected PKIBody: expected {expected}, got {got}")]
    UnexpectedPkiBody {
        /// Body type the exchange was waiting for.
        expected: BodyType,
        /// Body type actually received.
        got: BodyType,
    },

    /// The peer answered with an ERROR body or an otherwise unusable body.
    #[error("PKIBody error: {0}")]
    PkiBodyError(String),

    /// A cert response message carried no CertResponse entry.
    #[error("CertResponse not found")]
    CertResponseNotFound,

    /// A message that must carry a PKIStatusInfo carried none.
    #[error("PKIStatusInfo not found")]
    PkiStatusInfoNotFound,

    /// A revocation response carried no CertId echo.
    #[error("CertId not found")]
    CertIdNotFound,

    /// A message carried a certReqId other than the one of this session.
    #[error("bad request id: {0}")]
    BadRequestId(u32),

    /// A confirmation or poll referenced an unknown certReqId.
    #[error("unexpected request id: expected {expected}, got {got}")]
    UnexpectedRequestId {
        /// The session's certReqId.
        expected: u32,
        /// The id actually received.
        got: u32,
    },

    /// The certConf hash does not match the issued certificate.
    #[error("wrong cert hash")]
    WrongCertHash,

    /// The responder's policy refused the revocation target.
    #[error("request not accepted: {0}")]
    RequestNotAccepted(String),

    /// A status value that is defined but not valid at this point.
    #[error("unexpected PKIStatus: {}", .0.as_str())]
    UnexpectedPkiStatus(PkiStatus),

    /// A status value outside the contract of the current exchange.
    #[error("unknown PKIStatus")]
    UnknownPkiStatus,

    /// A PKIStatusInfo could not be interpreted.
    #[error("error parsing PKIStatus: {0}")]
    ErrorParsingPkiStatus(String),

    /// A request or response message could not be built.
    #[error("error creating {kind} message: {detail}")]
    MessageBuild {
        /// Wire name of the body being built, e.g. `"IR"`.
        kind: &'static str,
        /// What went wrong.
        detail: String,
    },

    /// The polling budget was exhausted before a final response arrived.
    #[error("total timeout exceeded")]
    TotalTimeoutExceeded,

    /// A granted cert response carried no certificate.
    #[error("certificate not found: {0}")]
    CertificateNotFound(String),

    /// The certificate was returned in a form this context cannot unwrap.
    #[error("unknown certificate type: {0}")]
    UnknownCertType(String),
}

impl CmpError {
    /// Create a missing-argument error.
    pub fn null_argument(what: impl Into<String>) -> Self {
        Self::NullArgument(what.into())
    }

    /// Create an invalid-arguments error.
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArgs(msg.into())
    }

    /// Create a protection validation error.
    pub fn protection(msg: impl Into<String>) -> Self {
        Self::ErrorValidatingProtection(msg.into())
    }

    /// Create a transfer error.
    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::ErrorTransferringOut(msg.into())
    }

    /// Create an encode/decode error.
    pub fn decoding(msg: impl Into<String>) -> Self {
        Self::ErrorDecodingMessage(msg.into())
    }

    /// Create a builder error for the given body kind.
    pub fn build(kind: &'static str, detail: impl Into<String>) -> Self {
        Self::MessageBuild {
            kind,
            detail: detail.into(),
        }
    }

    /// Create an error for a peer-reported or unusable body.
    pub fn body_error(msg: impl Into<String>) -> Self {
        Self::PkiBodyError(msg.into())
    }

    /// Returns true if this fault ends the session without a protocol-level
    /// answer from the peer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::FailedToReceivePkiMessage(_)
                | Self::ErrorTransferringOut(_)
                | Self::ErrorDecodingMessage(_)
        )
    }
}
