//! Windows backend for L1: `VirtualAlloc`/`VirtualAlloc2`/`VirtualFree`.
//!
//! In-place back-extension uses the placeholder-splitting dance documented
//! at https://learn.microsoft.com/windows/win32/memory/placeholder-memory-regions:
//! reserve `[base, base+current_size)` as a placeholder up front (callers of
//! this module always go through `reserve`, which does so), then, to grow,
//! reserve a *new* placeholder immediately after the old range and replace
//! both with a single, larger placeholder. If the address range right after
//! `base + current_size` is already spoken for, that fails and we fall back
//! to reserve-new/copy/release, exactly as spec.md §4.1 describes for the
//! "otherwise" branch.
use super::{ExpandMethod, ExpandResult, Protection, Relocation};
use std::ffi::c_void;
use std::ptr::NonNull;
use windows_sys::Win32::System::Memory::{
    VirtualAlloc, VirtualAlloc2, VirtualFree, VirtualProtect, MEM_COMMIT, MEM_DECOMMIT,
    MEM_RELEASE, MEM_REPLACE_PLACEHOLDER, MEM_RESERVE, MEM_RESERVE_PLACEHOLDER, PAGE_NOACCESS,
    PAGE_READONLY, PAGE_READWRITE,
};
use windows_sys::Win32::System::SystemInformation::GetSystemInfo;

pub(super) fn query_page_size() -> usize {
    unsafe {
        let mut info = std::mem::zeroed();
        GetSystemInfo(&mut info);
        info.dwPageSize as usize
    }
}

pub(super) fn query_reserve_granularity() -> usize {
    unsafe {
        let mut info = std::mem::zeroed();
        GetSystemInfo(&mut info);
        info.dwAllocationGranularity as usize
    }
}

fn page_protection(kind: Protection) -> u32 {
    match kind {
        Protection::NoAccess => PAGE_NOACCESS,
        Protection::ReadOnly => PAGE_READONLY,
        Protection::ReadWrite => PAGE_READWRITE,
    }
}

pub(super) fn reserve(size: usize) -> Option<NonNull<c_void>> {
    let ptr = unsafe {
        VirtualAlloc(
            std::ptr::null(),
            size,
            MEM_RESERVE | MEM_RESERVE_PLACEHOLDER,
            PAGE_NOACCESS,
        )
    };
    NonNull::new(ptr)
}

pub(super) fn allocate(size: usize) -> Option<NonNull<c_void>> {
    let ptr = unsafe { VirtualAlloc(std::ptr::null(), size, MEM_RESERVE | MEM_COMMIT, PAGE_READWRITE) };
    NonNull::new(ptr)
}

pub(super) fn allocate_fixed(addr: NonNull<c_void>, size: usize, kind: Protection) -> bool {
    let flags = MEM_COMMIT;
    let ptr = unsafe { VirtualAlloc(addr.as_ptr(), size, flags, page_protection(kind)) };
    ptr == addr.as_ptr()
}

pub(super) fn commit(addr: NonNull<c_void>, size: usize) -> bool {
    let ptr = unsafe { VirtualAlloc(addr.as_ptr(), size, MEM_COMMIT, PAGE_READWRITE) };
    !ptr.is_null()
}

pub(super) fn decommit(addr: NonNull<c_void>, size: usize) {
    unsafe {
        VirtualFree(addr.as_ptr(), size, MEM_DECOMMIT);
    }
}

pub(super) fn free(addr: NonNull<c_void>, _size: usize) {
    unsafe {
        // MEM_RELEASE requires size == 0 and addr == the original reservation base.
        VirtualFree(addr.as_ptr(), 0, MEM_RELEASE);
    }
}

pub(super) fn protect(addr: NonNull<c_void>, size: usize, bits: Protection) -> bool {
    let mut old = 0u32;
    unsafe { VirtualProtect(addr.as_ptr(), size, page_protection(bits), &mut old) != 0 }
}

/// Tries to reserve a placeholder immediately after `[base, base+old_size)`
/// and coalesce it with the existing one into a single `new_size`
/// placeholder, then commits/protects the grown tail per `kind`.
fn try_placeholder_extend(
    base: NonNull<c_void>,
    old_size: usize,
    new_size: usize,
    kind: Protection,
) -> bool {
    let extra = new_size - old_size;
    let extension_addr = unsafe { (base.as_ptr() as *mut u8).add(old_size) as *mut c_void };
    let extension = unsafe {
        VirtualAlloc2(
            0,
            extension_addr,
            extra,
            MEM_RESERVE | MEM_RESERVE_PLACEHOLDER,
            PAGE_NOACCESS,
            std::ptr::null_mut(),
            0,
        )
    };
    if extension.is_null() || extension != extension_addr {
        if !extension.is_null() {
            unsafe {
                VirtualFree(extension, 0, MEM_RELEASE);
            }
        }
        return false;
    }
    // Coalesce [base, base+old_size) and the extension into one placeholder,
    // then commit the now-contiguous range.
    let coalesced = unsafe {
        VirtualAlloc2(
            0,
            base.as_ptr(),
            new_size,
            MEM_RESERVE | MEM_REPLACE_PLACEHOLDER,
            PAGE_NOACCESS,
            std::ptr::null_mut(),
            0,
        )
    };
    if coalesced.is_null() {
        unsafe {
            VirtualFree(extension, 0, MEM_RELEASE);
        }
        return false;
    }
    allocate_fixed(base, new_size, kind)
}

pub(super) fn expand_back(
    base: NonNull<c_void>,
    current_size: usize,
    required_size: usize,
    used: usize,
    kind: Protection,
    _reloc: Relocation,
) -> ExpandResult {
    if try_placeholder_extend(base, current_size, required_size, kind) {
        return ExpandResult {
            new_base: Some(base),
            new_size: required_size,
            method: ExpandMethod::BackExtended,
        };
    }
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
    // Windows has no placeholder trick for growing "backwards"; always
    // reserve a new, larger region and copy the tail into place.
    let mut new_size = required_size;
    let new_base = match super::reserve(&mut new_size) {
        Some(p) => p,
        None => return ExpandResult::failed(),
    };
    if !allocate_fixed(new_base, new_size, kind) {
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
    if !allocate_fixed(new_base, new_size, kind) {
        super::free(new_base, new_size);
        return ExpandResult::failed();
    }
    unsafe {
        std::ptr::copy_nonoverlapping(base.as_ptr() as *const u8, new_base.as_ptr() as *mut u8, used);
    }
    super::free(base, current_size);
    ExpandResult {
        new_base: Some(new_base),
        new_size,
        method: ExpandMethod::Moved,
    }
}
