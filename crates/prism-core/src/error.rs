//! The closed error taxonomy shared by all backends.

use thiserror::Error;

/// Errors surfaced by the GPU abstraction.
///
/// The set is closed: every backend maps its native failure codes into one of
/// these variants. Callers can branch on the variant to decide between
/// retrying (swapchain conditions), degrading (exhaustion), and giving up
/// (device loss).
#[derive(Error, Debug)]
pub enum GfxError {
    /// A caller-contract violation: null/zero/out-of-range input.
    ///
    /// Never retried internally; indicates a programming error in the caller.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A native allocation failed. Recoverable only by freeing resources.
    #[error("out of memory")]
    OutOfMemory,

    /// The device was lost. Fatal; no automatic recreation is attempted.
    #[error("device lost")]
    DeviceLost,

    /// The presentation surface was destroyed. The caller must recreate it.
    #[error("surface lost")]
    SurfaceLost,

    /// The swapchain no longer matches the surface; recreate the swapchain.
    #[error("swapchain out of date")]
    OutOfDate,

    /// A wait expired before the awaited condition was reached.
    #[error("operation timed out")]
    Timeout,

    /// The queried state is not available yet; poll again.
    #[error("not ready")]
    NotReady,

    /// The requested feature is not available on this device.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),

    /// An internal native-API failure with no more specific mapping.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl GfxError {
    /// Expected conditions of normal swapchain operation plus exhaustion;
    /// the caller's main loop should handle these rather than abort.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::NotReady | Self::OutOfDate | Self::SurfaceLost | Self::OutOfMemory
        )
    }

    /// Effectively fatal conditions; the core performs no automatic recovery.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceLost | Self::Unknown(_))
    }
}

/// Result type alias using [`GfxError`].
pub type Result<T> = std::result::Result<T, GfxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(GfxError::Timeout.is_recoverable());
        assert!(GfxError::OutOfDate.is_recoverable());
        assert!(GfxError::SurfaceLost.is_recoverable());
        assert!(!GfxError::DeviceLost.is_recoverable());
    }

    #[test]
    fn fatal_classification() {
        assert!(GfxError::DeviceLost.is_fatal());
        assert!(GfxError::Unknown("submit failed".into()).is_fatal());
        assert!(!GfxError::InvalidArgument("size is zero".into()).is_fatal());
        assert!(!GfxError::Timeout.is_fatal());
    }
}
