//! L0: the opaque OS handle wrapper.
//!
//! A `Handle` owns exactly one kernel object reference. There is exactly one
//! sentinel "invalid" value (parameterized via `INVALID` because POSIX file
//! descriptors are invalid at `-1` while Windows section/mapping handles are
//! invalid at `NULL` and Windows *file* handles are invalid at
//! `INVALID_HANDLE_VALUE`, i.e. also `-1`). Moving a `Handle` transfers
//! ownership and leaves the source invalid; dropping a valid handle always
//! closes it.
//!
//! Modeled on slitter's `LinearRef`: a thin newtype that forbids the footgun
//! (there, duplicate allocations; here, double-closing a kernel handle) by
//! construction rather than by runtime check.
use std::fmt;

#[cfg(unix)]
pub(crate) type Raw = isize;
#[cfg(windows)]
pub(crate) type Raw = isize;

#[cfg(unix)]
unsafe fn close_raw(raw: Raw) {
    libc::close(raw as std::os::unix::io::RawFd);
}

#[cfg(windows)]
unsafe fn close_raw(raw: Raw) {
    windows_sys::Win32::Foundation::CloseHandle(raw as windows_sys::Win32::Foundation::HANDLE);
}

/// An owned OS handle whose invalid sentinel is `INVALID`.
///
/// `INVALID = -1` models POSIX file descriptors and Windows
/// `INVALID_HANDLE_VALUE`-sentineled objects (files); `INVALID = 0` models
/// Windows `NULL`-sentineled objects (sections).
pub struct Handle<const INVALID: isize> {
    raw: Raw,
}

impl<const INVALID: isize> Handle<INVALID> {
    /// The canonical invalid handle.
    #[inline]
    pub const fn invalid() -> Self {
        Self { raw: INVALID }
    }

    /// Wraps a raw OS handle value, taking ownership.
    ///
    /// # Safety
    ///
    /// `raw` must be either `INVALID` or a valid, uniquely-owned handle of
    /// the expected kind.
    #[inline]
    pub const unsafe fn from_raw(raw: Raw) -> Self {
        Self { raw }
    }

    #[inline]
    pub fn raw(&self) -> Raw {
        self.raw
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.raw != INVALID
    }

    /// Takes ownership of the handle, leaving `self` invalid. Used by the
    /// Windows section-recreation path (§4.2), which must close the old
    /// section before opening the new one.
    #[inline]
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::invalid())
    }

    /// Replaces the handle with `new`, closing the previous one if valid.
    #[inline]
    pub fn reset(&mut self, new: Self) {
        *self = new;
    }
}

impl<const INVALID: isize> Drop for Handle<INVALID> {
    fn drop(&mut self) {
        if self.is_valid() {
            unsafe { close_raw(self.raw) };
        }
    }
}

impl<const INVALID: isize> fmt::Debug for Handle<INVALID> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("raw", &self.raw).finish()
    }
}

/// A file descriptor / file `HANDLE` (invalid at `-1` on both platforms).
pub type FileHandleRaw = Handle<-1>;
/// A section / anonymous-mapping handle (invalid at `NULL`/`-1`; POSIX has no
/// separate section object so it reuses the `-1`-sentineled fd handle).
#[cfg(windows)]
pub type SectionHandleRaw = Handle<0>;
#[cfg(unix)]
pub type SectionHandleRaw = Handle<-1>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_is_invalid() {
        let h: FileHandleRaw = Handle::invalid();
        assert!(!h.is_valid());
    }

    #[test]
    fn take_invalidates_source() {
        let mut h: FileHandleRaw = unsafe { Handle::from_raw(123) };
        let taken = h.take();
        assert!(!h.is_valid());
        assert!(taken.is_valid());
        // Don't actually close fd 123 on drop of `taken`: forget it, this is
        // a pure bookkeeping test with no real descriptor behind it.
        std::mem::forget(taken);
    }
}
