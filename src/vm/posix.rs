//! POSIX backend for L1: `mmap`/`mprotect`/`mremap`/`munmap`.
use super::{ExpandMethod, ExpandResult, Protection, Relocation};
use std::ffi::c_void;
use std::ptr::NonNull;

pub(super) fn query_page_size() -> usize {
    let ret = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    assert!(ret > 0, "sysconf(_SC_PAGESIZE) failed");
    ret as usize
}

pub(super) fn query_reserve_granularity() -> usize {
    query_page_size()
}

fn prot_bits(kind: Protection) -> libc::c_int {
    match kind {
        Protection::NoAccess => libc::PROT_NONE,
        Protection::ReadOnly => libc::PROT_READ,
        Protection::ReadWrite => libc::PROT_READ | libc::PROT_WRITE,
    }
}

/// `mmap`s an anonymous, non-reserving (`MAP_NORESERVE`) range with `prot`.
/// Pages are demand-faulted and zero-filled the first time each is touched
/// with write access, which is what lets `reserve` (PROT_NONE) and `commit`
/// (mprotect to PROT_READ|WRITE) behave like the Windows two-step
/// reserve-then-commit even though Linux's overcommit model doesn't need it.
unsafe fn mmap_anon(addr: *mut c_void, size: usize, prot: libc::c_int, fixed: bool) -> *mut c_void {
    let mut flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE;
    if fixed {
        flags |= libc::MAP_FIXED;
    }
    libc::mmap(addr, size, prot, flags, -1, 0)
}

pub(super) fn reserve(size: usize) -> Option<NonNull<c_void>> {
    let ptr = unsafe { mmap_anon(std::ptr::null_mut(), size, libc::PROT_NONE, false) };
    if ptr == libc::MAP_FAILED {
        None
    } else {
        NonNull::new(ptr)
    }
}

pub(super) fn allocate(size: usize) -> Option<NonNull<c_void>> {
    let ptr = unsafe { mmap_anon(std::ptr::null_mut(), size, libc::PROT_READ | libc::PROT_WRITE, false) };
    if ptr == libc::MAP_FAILED {
        None
    } else {
        NonNull::new(ptr)
    }
}

pub(super) fn allocate_fixed(addr: NonNull<c_void>, size: usize, kind: Protection) -> bool {
    let ptr = unsafe { mmap_anon(addr.as_ptr(), size, prot_bits(kind), true) };
    ptr == addr.as_ptr()
}

pub(super) fn commit(addr: NonNull<c_void>, size: usize) -> bool {
    unsafe { libc::mprotect(addr.as_ptr(), size, libc::PROT_READ | libc::PROT_WRITE) == 0 }
}

/// Re-maps the range `PROT_NONE` over itself; this both revokes access and
/// (per the kernel's anonymous-mapping semantics) discards the physical
/// pages backing it, so a later `commit` sees zero-filled memory again.
pub(super) fn decommit(addr: NonNull<c_void>, size: usize) {
    unsafe {
        mmap_anon(addr.as_ptr(), size, libc::PROT_NONE, true);
    }
}

pub(super) fn free(addr: NonNull<c_void>, size: usize) {
    unsafe {
        libc::munmap(addr.as_ptr(), size);
    }
}

pub(super) fn protect(addr: NonNull<c_void>, size: usize, bits: Protection) -> bool {
    unsafe { libc::mprotect(addr.as_ptr(), size, prot_bits(bits)) == 0 }
}

#[cfg(target_os = "linux")]
unsafe fn try_mremap(
    addr: *mut c_void,
    old_size: usize,
    new_size: usize,
    reloc: Relocation,
) -> *mut c_void {
    let flags = match reloc {
        Relocation::Fixed => 0,
        Relocation::Moveable => libc::MREMAP_MAYMOVE,
    };
    libc::mremap(addr, old_size, new_size, flags)
}

#[cfg(target_os = "linux")]
pub(super) fn expand_back(
    base: NonNull<c_void>,
    current_size: usize,
    required_size: usize,
    used: usize,
    kind: Protection,
    reloc: Relocation,
) -> ExpandResult {
    let new_ptr = unsafe { try_mremap(base.as_ptr(), current_size, required_size, reloc) };
    if new_ptr != libc::MAP_FAILED as *mut c_void {
        let method = if new_ptr == base.as_ptr() {
            ExpandMethod::BackExtended
        } else {
            ExpandMethod::Moved
        };
        // Newly-grown tail pages are zero-filled by the kernel already;
        // `commit`/`allocate_fixed` at a narrower protection is only needed
        // when `kind` requests less than read-write.
        let _ = kind;
        return ExpandResult {
            new_base: NonNull::new(new_ptr),
            new_size: required_size,
            method,
        };
    }
    reserve_copy_release(base, current_size, required_size, used, kind)
}

#[cfg(not(target_os = "linux"))]
pub(super) fn expand_back(
    base: NonNull<c_void>,
    current_size: usize,
    required_size: usize,
    used: usize,
    kind: Protection,
    _reloc: Relocation,
) -> ExpandResult {
    reserve_copy_release(base, current_size, required_size, used, kind)
}

pub(super) fn expand_front(
    base: NonNull<c_void>,
    current_size: usize,
    required_size: usize,
    used: usize,
    kind: Protection,
    _reloc: Relocation,
) -> ExpandResult {
    // POSIX has no native front-extending remap; reserve a larger region and
    // copy `used` bytes to the *tail* of it so the logical front has grown.
    let mut new_size = required_size;
    let new_base = match super::reserve(&mut new_size) {
        Some(p) => p,
        None => return ExpandResult::failed(),
    };
    if !commit(new_base, new_size) {
        super::free(new_base, new_size);
        return ExpandResult::failed();
    }
    let delta = new_size - current_size;
    unsafe {
        std::ptr::copy_nonoverlapping(
            base.as_ptr() as *const u8,
            (new_base.as_ptr() as *mut u8).add(delta),
            used,
        );
    }
    let _ = kind;
    super::free(base, current_size);
    ExpandResult {
        new_base: Some(new_base),
        new_size,
        method: ExpandMethod::FrontExtended,
    }
}

fn reserve_copy_release(
    base: NonNull<c_void>,
    current_size: usize,
    required_size: usize,
    used: usize,
    kind: Protection,
) -> ExpandResult {
    let mut new_size = required_size;
    let new_base = match super::reserve(&mut new_size) {
        Some(p) => p,
        None => return ExpandResult::failed(),
    };
    if !commit(new_base, new_size) {
        super::free(new_base, new_size);
        return ExpandResult::failed();
    }
    unsafe {
        std::ptr::copy_nonoverlapping(base.as_ptr() as *const u8, new_base.as_ptr() as *mut u8, used);
    }
    let _ = kind;
    super::free(base, current_size);
    ExpandResult {
        new_base: Some(new_base),
        new_size,
        method: ExpandMethod::Moved,
    }
}
