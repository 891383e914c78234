use crate::error::{Error, Result};
use crate::mapping::Mapping;
use crate::vm::Protection;
use std::ffi::c_void;
use std::ptr::NonNull;

fn prot_bits(kind: Protection) -> libc::c_int {
    match kind {
        Protection::NoAccess => libc::PROT_NONE,
        Protection::ReadOnly => libc::PROT_READ,
        Protection::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
    }
}

pub(super) fn map(
    mapping: &Mapping,
    protection: Protection,
    offset: u64,
    size: usize,
) -> Result<NonNull<c_void>> {
    let fd = mapping.raw_fd();
    let (flags, real_fd) = if fd >= 0 {
        (libc::MAP_SHARED, fd)
    } else {
        (libc::MAP_PRIVATE | libc::MAP_ANONYMOUS, -1)
    };
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            size,
            prot_bits(protection),
            flags,
            real_fd,
            offset as libc::off_t,
        )
    };
    if ptr == libc::MAP_FAILED {
        Err(Error::last_os_error())
    } else {
        NonNull::new(ptr).ok_or(Error::OutOfMemory)
    }
}

/// Tries `mremap(MAYMOVE)` first (Linux), which relocates without copying.
/// Everywhere else: for a file-backed mapping, a fresh `mmap` over the same
/// fd recovers the old contents for free; for an anonymous mapping there is
/// no backing object to re-map, so the old range's contents are copied into
/// the new one before it's released.
pub(super) fn expand(
    ptr: NonNull<c_void>,
    old_len: usize,
    mapping: &Mapping,
    protection: Protection,
    offset: u64,
    new_len: usize,
) -> Result<(NonNull<c_void>, usize)> {
    #[cfg(target_os = "linux")]
    {
        let new_ptr = unsafe { libc::mremap(ptr.as_ptr(), old_len, new_len, libc::MREMAP_MAYMOVE) };
        if new_ptr != libc::MAP_FAILED {
            return Ok((NonNull::new(new_ptr).ok_or(Error::OutOfMemory)?, new_len));
        }
    }
    let is_anonymous = mapping.raw_fd() < 0;
    if is_anonymous {
        let new_ptr = map(mapping, protection, offset, new_len)?;
        unsafe {
            std::ptr::copy_nonoverlapping(ptr.as_ptr() as *const u8, new_ptr.as_ptr() as *mut u8, old_len);
            libc::munmap(ptr.as_ptr(), old_len);
        }
        return Ok((new_ptr, new_len));
    }
    unsafe {
        libc::munmap(ptr.as_ptr(), old_len);
    }
    let new_ptr = map(mapping, protection, offset, new_len)?;
    Ok((new_ptr, new_len))
}

/// Gives back the pages past `new_len` via a partial `munmap`, per
/// `Mapping::VIEWS_DOWNSIZEABLE = true` on this platform.
pub(super) fn shrink(ptr: NonNull<c_void>, old_len: usize, new_len: usize) -> Result<usize> {
    if new_len == old_len {
        return Ok(old_len);
    }
    let tail = unsafe { (ptr.as_ptr() as *mut u8).add(new_len) as *mut c_void };
    unsafe {
        libc::munmap(tail, old_len - new_len);
    }
    Ok(new_len)
}

pub(super) fn unmap(ptr: NonNull<c_void>, len: usize) {
    unsafe {
        libc::munmap(ptr.as_ptr(), len);
    }
}

pub(super) fn flush_async(ptr: NonNull<c_void>, len: usize) {
    unsafe {
        libc::msync(ptr.as_ptr(), len, libc::MS_ASYNC);
    }
}

pub(super) fn discard(ptr: NonNull<c_void>, offset: usize, len: usize) {
    unsafe {
        let addr = (ptr.as_ptr() as *mut u8).add(offset) as *mut c_void;
        libc::madvise(addr, len, libc::MADV_DONTNEED);
    }
}

pub(super) fn flush_blocking(ptr: NonNull<c_void>, len: usize, _mapping: &Mapping) -> Result<()> {
    let ret = unsafe { libc::msync(ptr.as_ptr(), len, libc::MS_SYNC) };
    if ret == 0 {
        Ok(())
    } else {
        Err(Error::last_os_error())
    }
}
