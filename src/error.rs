//! Backend error taxonomy (spec §7).
//!
//! Every variant corresponds to a row of the `Kind` table in the
//! specification. Recovery policy (retry counts, terminal-ness) lives with
//! the callers that are allowed to retry (`SenseDecoder`, `MotorPlanner`,
//! `Transport` impls) — this type only carries the classification.

use thiserror::Error;

/// The SANE-shaped backend error taxonomy.
///
/// `Eq`/`Copy` where the source value is itself trivially copyable; sense
/// decoding and transport failures carry no payload beyond what's needed to
/// log them, matching the frontend's coarse `SANE_Status`-style surface.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BackendError {
    /// Any transport-level failure that isn't a bounded timeout.
    #[error("I/O error communicating with the device")]
    IoError,

    /// A transport operation exceeded its deadline. Retried once by the
    /// caller before escalating to `IoError` (§7 propagation policy).
    #[error("transport operation timed out")]
    Timeout,

    /// Sense 0x02 / repeated TEST_UNIT_READY busy. Retried 3x with backoff
    /// by the caller before being surfaced.
    #[error("device busy")]
    DeviceBusy,

    /// ADF cover open; sense 0x02/0x04/{0x80..0x84}. Never retried.
    #[error("cover open")]
    CoverOpen,

    /// No document in the feeder; surfaced only at `start`.
    #[error("no document present")]
    NoDocs,

    /// Feeder jam; sense 0x03/0x80/{1..9}. Homing is required before retry.
    #[error("document jammed")]
    Jammed,

    /// User-requested cancellation. Always terminal for the current scan.
    #[error("operation cancelled")]
    Cancelled,

    /// Normal end of scan data (sense END_OF_MEDIUM, or ring drained at the
    /// end of the motor program). Not a fault.
    #[error("end of scan data")]
    Eof,

    /// Option or parameter failed validation.
    #[error("invalid option or parameter")]
    Inval,

    /// Allocation failure (ring growth, buffer allocation).
    #[error("out of memory")]
    NoMem,

    /// Transport claim failed (parallel port held by another process).
    #[error("access denied")]
    AccessDenied,

    /// Frontend asked for something this device/session doesn't support.
    #[error("unsupported")]
    Unsupported,
}

impl BackendError {
    /// True for errors that leave the session unusable until `cancel` or
    /// `close` (§7: "A FAULTED session refuses all operations except
    /// `cancel` and `close`"). `NoDocs` is excluded: §7 surfaces it at
    /// `start` only, as a retriable "nothing to scan yet" result, not a
    /// device fault — the frontend can feed a sheet and call `start` again.
    pub fn is_faulting(self) -> bool {
        !matches!(self, BackendError::Eof | BackendError::Cancelled | BackendError::NoDocs)
    }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => BackendError::Timeout,
            std::io::ErrorKind::PermissionDenied => BackendError::AccessDenied,
            _ => BackendError::IoError,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;
