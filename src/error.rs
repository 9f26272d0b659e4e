use alloc::collections::TryReserveError;
use core::{alloc::Layout, fmt};

/// The error returned by the fallible constructors [`Arc::try_new`] and
/// [`ArcSlice::try_new`] when memory could not be obtained.
///
/// Nothing is leaked when construction fails: an element buffer that was
/// already built is dropped before the error is returned.
///
/// [`Arc::try_new`]: crate::Arc::try_new
/// [`ArcSlice::try_new`]: crate::ArcSlice::try_new
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// The allocator refused the control block with this layout.
    Block(Layout),
    /// The element buffer could not be reserved.
    Buffer(TryReserveError),
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::Block(layout) => write!(
                f,
                "failed to allocate control block of {} bytes (align {})",
                layout.size(),
                layout.align()
            ),
            AllocError::Buffer(err) => write!(f, "failed to allocate element buffer: {}", err),
        }
    }
}

impl core::error::Error for AllocError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            AllocError::Block(_) => None,
            AllocError::Buffer(err) => Some(err),
        }
    }
}

impl From<TryReserveError> for AllocError {
    #[inline]
    fn from(err: TryReserveError) -> Self {
        AllocError::Buffer(err)
    }
}
