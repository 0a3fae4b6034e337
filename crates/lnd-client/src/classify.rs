//! RPC failure classification.
//!
//! Every call into the daemon passes through this module on failure. A
//! [`tonic::Status`] is sorted into a [`ClassifiedError`] by its code and,
//! for `Unknown`, by its message. Each class carries a [`Policy`]:
//!
//! | Class | Policy |
//! |---|---|
//! | `Unimplemented` | re-raise (RPC surface inactive, wallet probably locked) |
//! | `WalletLocked` | re-raise |
//! | `Unavailable` | suppress |
//! | `Unknown` (any other message) | suppress |
//! | `NotFound` | suppress |
//! | `PermissionDenied` | suppress |
//! | `Other` | re-raise unchanged |
//! | `Unexpected` (non-RPC) | suppress |
//!
//! Suppression is only honoured under [`ErrorHandling::Suppress`]. With
//! [`ErrorHandling::Surface`] every failure reaches the caller as a typed
//! error and the policy only decides how loudly it is logged.

use thiserror::Error;
use tonic::{Code, Status};

/// Message LND returns on the full RPC surface while the wallet is locked.
pub const WALLET_LOCKED_MESSAGE: &str = "wallet locked, unlock it to enable full RPC access";

/// What happens to a failure once it has been logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// The caller sees the error.
    Reraise,
    /// The call ends with no value and no error.
    Suppress,
}

/// How a [`LightningService`](crate::LightningService) treats suppressible failures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorHandling {
    /// Apply each class's [`Policy`]: suppressed failures are logged and
    /// swallowed.
    #[default]
    Suppress,
    /// Deliver every failure to the caller as `Err`.
    Surface,
}

impl ErrorHandling {
    /// Returns `true` if `err` must be handed to the caller in this mode.
    #[must_use]
    pub fn delivers(self, err: &ClassifiedError) -> bool {
        match self {
            Self::Suppress => err.policy() == Policy::Reraise,
            Self::Surface => true,
        }
    }
}

/// A failed call, sorted by cause.
#[derive(Error, Debug)]
pub enum ClassifiedError {
    /// Only the wallet unlocker is listening; the main RPC server is not up.
    #[error("RPC server not active (wallet may be locked): {}", .0.message())]
    Unimplemented(Status),

    /// The daemon rejected the call because the wallet is locked.
    #[error("wallet locked: {}", .0.message())]
    WalletLocked(Status),

    /// The daemon could not be reached.
    #[error("daemon unavailable: {}", .0.message())]
    Unavailable(Status),

    /// `Unknown` status with any message other than the wallet-locked one.
    #[error("unknown RPC error: {}", .0.message())]
    Unknown(Status),

    /// The requested entity does not exist.
    #[error("not found: {}", .0.message())]
    NotFound(Status),

    /// The macaroon lacks a required permission.
    #[error("permission denied: {}", .0.message())]
    PermissionDenied(Status),

    /// Any other status, passed through unchanged.
    #[error("gRPC status error: {0}")]
    Other(Status),

    /// A failure that did not come from the RPC layer.
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl ClassifiedError {
    /// Sorts a status into its class.
    #[must_use]
    pub fn from_status(status: Status) -> Self {
        match status.code() {
            Code::Unimplemented => Self::Unimplemented(status),
            Code::Unavailable => Self::Unavailable(status),
            Code::Unknown if status.message() == WALLET_LOCKED_MESSAGE => {
                Self::WalletLocked(status)
            }
            Code::Unknown => Self::Unknown(status),
            Code::NotFound => Self::NotFound(status),
            Code::PermissionDenied => Self::PermissionDenied(status),
            _ => Self::Other(status),
        }
    }

    /// The fixed policy for this class.
    #[must_use]
    pub fn policy(&self) -> Policy {
        match self {
            Self::Unimplemented(_) | Self::WalletLocked(_) | Self::Other(_) => Policy::Reraise,
            Self::Unavailable(_)
            | Self::Unknown(_)
            | Self::NotFound(_)
            | Self::PermissionDenied(_)
            | Self::Unexpected(_) => Policy::Suppress,
        }
    }

    /// The underlying status, if the failure came from the RPC layer.
    #[must_use]
    pub fn status(&self) -> Option<&Status> {
        match self {
            Self::Unimplemented(s)
            | Self::WalletLocked(s)
            | Self::Unavailable(s)
            | Self::Unknown(s)
            | Self::NotFound(s)
            | Self::PermissionDenied(s)
            | Self::Other(s) => Some(s),
            Self::Unexpected(_) => None,
        }
    }

    /// Consumes the error, returning the underlying status.
    #[must_use]
    pub fn into_status(self) -> Option<Status> {
        match self {
            Self::Unimplemented(s)
            | Self::WalletLocked(s)
            | Self::Unavailable(s)
            | Self::Unknown(s)
            | Self::NotFound(s)
            | Self::PermissionDenied(s)
            | Self::Other(s) => Some(s),
            Self::Unexpected(_) => None,
        }
    }

    /// Emits the diagnostic for this failure.
    ///
    /// `Other` is passed through silently; every other class is logged with
    /// its code and details.
    pub fn log(&self) {
        match self {
            Self::Unimplemented(s) => tracing::warn!(
                code = ?s.code(),
                details = s.message(),
                "unimplemented: RPC server not active, wallet may be locked"
            ),
            Self::WalletLocked(s) => {
                tracing::error!(code = ?s.code(), details = s.message(), "wallet is locked")
            }
            Self::Unavailable(s) => tracing::warn!(
                code = ?s.code(),
                "UNAVAILABLE: error message: {}",
                s.message()
            ),
            Self::Unknown(s) => {
                tracing::warn!(code = ?s.code(), "unknown: error message: {}", s.message())
            }
            Self::NotFound(s) => {
                tracing::warn!(code = ?s.code(), "NOT FOUND: error message: {}", s.message())
            }
            Self::PermissionDenied(s) => tracing::warn!(
                code = ?s.code(),
                "PERMISSION_DENIED: error message: {}",
                s.message()
            ),
            Self::Other(s) => {
                tracing::trace!(code = ?s.code(), "passing RPC error through unchanged")
            }
            Self::Unexpected(msg) => tracing::error!("unknown exception: {msg}"),
        }
    }
}

impl From<Status> for ClassifiedError {
    fn from(status: Status) -> Self {
        Self::from_status(status)
    }
}

/// Applies the classifier to the outcome of one call.
///
/// Success yields `Ok(Some(value))`. A failure is logged, then either
/// returned as `Err` or swallowed into `Ok(None)` depending on `mode` and
/// the class's [`Policy`].
pub fn handle_rpc_errors<T>(
    result: Result<T, ClassifiedError>,
    mode: ErrorHandling,
) -> Result<Option<T>, ClassifiedError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            err.log();
            if mode.delivers(&err) {
                Err(err)
            } else {
                Ok(None)
            }
        }
    }
}
