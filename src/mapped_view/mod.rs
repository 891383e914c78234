//! L3: `MappedView`, a window of address space bound to a `Mapping`.
//!
//! Growing a view never physically moves the region unless the platform
//! forces it to (Windows always does; POSIX only when `mremap` can't extend
//! in place) — callers that hold raw pointers into a view must treat any
//! `expand` as potentially invalidating them, exactly like `vm::expand_back`
//! one layer down. Shrinking is best-effort: where the platform can give
//! pages back (`VIEWS_DOWNSIZEABLE`, POSIX) it does; where it can't
//! (Windows) the view keeps its full physical extent and only the logical
//! length tracked here changes.
#[cfg(unix)]
mod posix;
#[cfg(unix)]
use posix as imp;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
use windows as imp;

use crate::error::Result;
use crate::mapping::Mapping;
use crate::vm::Protection;
use std::ffi::c_void;
use std::ptr::NonNull;

pub struct MappedView {
    ptr: NonNull<c_void>,
    /// Physical extent of the mapping (what was actually reserved/mapped).
    mapped_len: usize,
    /// Logical length a caller has asked for; `<= mapped_len` always, and
    /// `== mapped_len` on platforms without in-place shrink.
    len: usize,
    protection: Protection,
}

unsafe impl Send for MappedView {}
unsafe impl Sync for MappedView {}

impl MappedView {
    /// Maps `size` bytes of `mapping` starting at `offset`, with `protection`
    /// matching the access/share flags used to create the mapping.
    pub fn map(
        mapping: &Mapping,
        protection: Protection,
        offset: u64,
        size: usize,
    ) -> Result<Self> {
        let ptr = imp::map(mapping, protection, offset, size)?;
        Ok(Self {
            ptr,
            mapped_len: size,
            len: size,
            protection,
        })
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr() as *const u8
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr() as *mut u8
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn protection(&self) -> Protection {
        self.protection
    }

    /// Grows the view to `new_len`, remapping against `mapping` starting at
    /// `offset` if the platform can't extend the existing range in place.
    pub fn expand(&mut self, mapping: &Mapping, offset: u64, new_len: usize) -> Result<()> {
        if new_len <= self.mapped_len {
            self.len = new_len;
            return Ok(());
        }
        let (new_ptr, new_mapped_len) =
            imp::expand(self.ptr, self.mapped_len, mapping, self.protection, offset, new_len)?;
        self.ptr = new_ptr;
        self.mapped_len = new_mapped_len;
        self.len = new_len;
        Ok(())
    }

    /// Shrinks the logical length to `new_len`. Gives physical pages back to
    /// the OS where that's possible (POSIX); on Windows the physical extent
    /// is left untouched and only bookkeeping changes.
    pub fn shrink(&mut self, new_len: usize) -> Result<()> {
        assert!(new_len <= self.len);
        let new_mapped_len = imp::shrink(self.ptr, self.mapped_len, new_len)?;
        self.mapped_len = new_mapped_len;
        self.len = new_len;
        Ok(())
    }

    /// Schedules dirty pages for writeback without blocking.
    pub fn flush_async(&self) {
        imp::flush_async(self.ptr, self.len);
    }

    /// Flushes dirty pages and, for file-backed mappings, waits for the
    /// underlying file's data to reach stable storage.
    pub fn flush_blocking(&self, mapping: &Mapping) -> Result<()> {
        imp::flush_blocking(self.ptr, self.len, mapping)
    }

    /// Hints to the OS that `[offset, offset + len)` no longer holds data
    /// worth keeping resident (`MADV_DONTNEED` / `MEM_RESET`). Used by
    /// `mapped_storage::shrink_to_fit` to proactively release physical pages
    /// before the view itself is downsized; a no-op the OS is always free to
    /// ignore, never a correctness requirement.
    pub fn discard(&self, offset: usize, len: usize) {
        assert!(offset + len <= self.len);
        imp::discard(self.ptr, offset, len);
    }
}

impl Drop for MappedView {
    fn drop(&mut self) {
        imp::unmap(self.ptr, self.mapped_len);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::flags::{ChildProcess, ObjectAccess, ShareMode};
    use crate::mapping;

    fn anonymous_mapping(size: u64) -> Mapping {
        mapping::create_mapping(None, ObjectAccess::ReadWrite, ChildProcess::DoesNotInherit, ShareMode::Hidden, size)
            .expect("anonymous mapping should succeed")
    }

    #[test]
    fn map_and_write_round_trip() {
        let mapping = anonymous_mapping(4096);
        let mut view = MappedView::map(&mapping, Protection::ReadWrite, 0, 4096).expect("map should succeed");
        unsafe {
            std::ptr::write_bytes(view.as_mut_ptr(), 0x5a, view.len());
        }
        let slice = unsafe { std::slice::from_raw_parts(view.as_ptr(), view.len()) };
        assert!(slice.iter().all(|&b| b == 0x5a));
    }

    #[test]
    fn expand_preserves_existing_contents() {
        let mapping = anonymous_mapping(4 * 4096);
        let mut view = MappedView::map(&mapping, Protection::ReadWrite, 0, 4096).expect("map should succeed");
        unsafe {
            std::ptr::write_bytes(view.as_mut_ptr(), 0x11, 4096);
        }
        view.expand(&mapping, 0, 2 * 4096).expect("expand should succeed");
        assert_eq!(view.len(), 2 * 4096);
        let slice = unsafe { std::slice::from_raw_parts(view.as_ptr(), 4096) };
        assert!(slice.iter().all(|&b| b == 0x11));
    }

    #[test]
    fn shrink_then_expand_back_is_safe() {
        let mapping = anonymous_mapping(4 * 4096);
        let mut view = MappedView::map(&mapping, Protection::ReadWrite, 0, 2 * 4096).expect("map should succeed");
        view.shrink(4096).expect("shrink should succeed");
        assert_eq!(view.len(), 4096);
        view.expand(&mapping, 0, 2 * 4096).expect("re-expanding after shrink should succeed");
        assert_eq!(view.len(), 2 * 4096);
    }

    #[test]
    fn discard_does_not_change_logical_length() {
        let mapping = anonymous_mapping(4096);
        let view = MappedView::map(&mapping, Protection::ReadWrite, 0, 4096).expect("map should succeed");
        view.discard(0, 4096);
        assert_eq!(view.len(), 4096);
    }
}
