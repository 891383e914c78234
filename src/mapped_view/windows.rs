use crate::error::{Error, Result};
use crate::mapping::Mapping;
use crate::vm::Protection;
use std::ffi::c_void;
use std::ptr::NonNull;
use windows_sys::Win32::System::Memory::{
    FlushViewOfFile, MapViewOfFile, UnmapViewOfFile, VirtualAlloc, FILE_MAP_READ, FILE_MAP_WRITE,
    MEMORY_MAPPED_VIEW_ADDRESS, MEM_RESET, PAGE_READWRITE,
};

fn access_flags(kind: Protection) -> u32 {
    match kind {
        Protection::NoAccess => 0,
        Protection::ReadOnly => FILE_MAP_READ,
        Protection::ReadWrite => FILE_MAP_READ | FILE_MAP_WRITE,
    }
}

pub(super) fn map(
    mapping: &Mapping,
    protection: Protection,
    offset: u64,
    size: usize,
) -> Result<NonNull<c_void>> {
    let ptr = unsafe {
        MapViewOfFile(
            mapping.section_raw() as windows_sys::Win32::Foundation::HANDLE,
            access_flags(protection),
            (offset >> 32) as u32,
            offset as u32,
            size,
        )
    };
    if ptr.Value.is_null() {
        Err(Error::last_os_error())
    } else {
        NonNull::new(ptr.Value).ok_or(Error::OutOfMemory)
    }
}

/// No in-place view extension on this platform: unmap and remap the whole
/// range against the (already-ceiling-sized, for anonymous mappings)
/// section. Always reports `Moved`-equivalent semantics to the caller.
pub(super) fn expand(
    ptr: NonNull<c_void>,
    old_len: usize,
    mapping: &Mapping,
    protection: Protection,
    offset: u64,
    new_len: usize,
) -> Result<(NonNull<c_void>, usize)> {
    unmap(ptr, old_len);
    let new_ptr = map(mapping, protection, offset, new_len)?;
    Ok((new_ptr, new_len))
}

/// `Mapping::VIEWS_DOWNSIZEABLE = false` on this platform: the physical view
/// keeps its full extent, only the logical length (tracked by the caller)
/// shrinks.
pub(super) fn shrink(_ptr: NonNull<c_void>, old_len: usize, _new_len: usize) -> Result<usize> {
    Ok(old_len)
}

pub(super) fn discard(ptr: NonNull<c_void>, offset: usize, len: usize) {
    unsafe {
        let addr = (ptr.as_ptr() as *mut u8).add(offset) as *mut c_void;
        VirtualAlloc(addr, len, MEM_RESET, PAGE_READWRITE);
    }
}

pub(super) fn unmap(ptr: NonNull<c_void>, _len: usize) {
    unsafe {
        UnmapViewOfFile(MEMORY_MAPPED_VIEW_ADDRESS { Value: ptr.as_ptr() });
    }
}

pub(super) fn flush_async(ptr: NonNull<c_void>, len: usize) {
    unsafe {
        FlushViewOfFile(ptr.as_ptr(), len);
    }
}

pub(super) fn flush_blocking(ptr: NonNull<c_void>, len: usize, mapping: &Mapping) -> Result<()> {
    unsafe {
        if FlushViewOfFile(ptr.as_ptr(), len) == 0 {
            return Err(Error::last_os_error());
        }
    }
    if let Some(file) = mapping.underlying_file() {
        file.flush_buffers();
    }
    Ok(())
}
