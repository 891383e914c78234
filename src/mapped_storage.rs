//! L4: `MappedStorage`, the header+data region that `tr_vector`/`vm_vector`
//! grow and shrink into. Composes a `Mapping` (L2) and a `MappedView` (L3)
//! behind a single on-disk/in-memory layout:
//!
//! ```text
//! [ sizes_hdr | caller header (HeaderInfo) | element data... ]
//! ```
//!
//! `sizes_hdr` is written by this module and never exposed to callers; it's
//! what lets `map_file` reopen an existing file and recover the element
//! count and the caller's header layout without the caller re-specifying
//! them, while still validating that the stored layout matches what's
//! requested.
use crate::error::{Error, Result};
use crate::file::{self, FileHandle};
use crate::flags::{view_protection, ChildProcess, CreationDisposition, ObjectAccess, ShareMode};
use crate::mapped_view::MappedView;
use crate::mapping::{self, Mapping};
use crate::vm;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Describes the caller-owned header region that precedes element data.
/// `add_header` composes descriptors the way a struct-of-structs layout
/// would, rounding each new piece up to its own alignment before appending
/// it; the running total's alignment is the max of every piece chained in.
///
/// `extendable` relaxes `map_file`'s reopen check from exact-match to
/// prefix-match: a file written with a *shorter* header than the one now
/// requested is accepted, and the file's own (smaller) stored offset is
/// trusted for where data actually starts — the usual escape hatch for a
/// header struct that has grown fields across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    size: usize,
    align: usize,
    extendable: bool,
}

impl HeaderInfo {
    pub const NONE: HeaderInfo = HeaderInfo { size: 0, align: 1, extendable: false };

    pub fn new(size: usize, align: usize) -> Self {
        assert!(align.is_power_of_two());
        Self { size, align, extendable: false }
    }

    pub fn add_header(self, size: usize, align: usize) -> Self {
        assert!(align.is_power_of_two());
        let offset = round_up(self.size, align);
        Self {
            size: offset + size,
            align: self.align.max(align),
            extendable: self.extendable,
        }
    }

    /// Marks this layout as accepting a shorter, already-on-disk header as
    /// a valid prefix of itself on reopen.
    pub fn extendable(mut self) -> Self {
        self.extendable = true;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }

    pub fn is_extendable(&self) -> bool {
        self.extendable
    }
}

fn round_up(n: usize, granularity: usize) -> usize {
    (n + granularity - 1) / granularity * granularity
}

/// The fixed-layout prefix this module owns. Packs the same facts the
/// source's `sizes_hdr` does (data offset, this header's own footprint, the
/// logical data size in bytes) into a fixed-size, `repr(C)` struct so it can
/// be read/written as a byte blob at offset 0.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct SizesHeader {
    magic: u32,
    data_offset: u32,
    element_size: u32,
    header_size: u32,
    data_size: u64,
}

const SIZES_HEADER_MAGIC: u32 = 0x7674_6d61; // "vmt" + version nibble
const SIZES_HEADER_LEN: usize = std::mem::size_of::<SizesHeader>();

// The on-disk layout is read back with a raw byte-array transmute
// (`SizesHeader::from_bytes`); it must stay free of padding surprises
// across platforms that disagree on `u64` alignment inside `repr(C)`.
static_assertions::const_assert_eq!(SIZES_HEADER_LEN, 24);

impl SizesHeader {
    fn to_bytes(self) -> [u8; SIZES_HEADER_LEN] {
        unsafe { std::mem::transmute(self) }
    }

    fn from_bytes(bytes: [u8; SIZES_HEADER_LEN]) -> Self {
        unsafe { std::mem::transmute(bytes) }
    }
}

lazy_static::lazy_static! {
    static ref TEMP_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

/// Overrides the directory `map_memory`'s backing temp file is created in.
/// Mirrors the teacher's directory-override knob for anonymous/file-backed
/// allocations; primarily useful in tests that want temp files on a
/// specific filesystem (e.g. one mounted `tmpfs` vs one that isn't).
pub fn set_temp_dir(dir: Option<PathBuf>) {
    *TEMP_DIR.lock().unwrap() = dir;
}

pub(crate) fn temp_dir() -> Option<PathBuf> {
    TEMP_DIR.lock().unwrap().clone()
}

pub struct MappedStorage {
    mapping: Mapping,
    view: MappedView,
    header_info: HeaderInfo,
    data_offset: usize,
    element_size: usize,
    len: usize,
    temp_path: Option<tempfile::TempPath>,
}

impl MappedStorage {
    /// Opens or creates `path` as the backing file, validating (for an
    /// existing file) or writing (for a new one) the `sizes_hdr`/header
    /// layout, then maps a view sized to `initial_len` elements.
    pub fn map_file(
        path: &Path,
        disposition: CreationDisposition,
        header_info: HeaderInfo,
        element_size: usize,
        initial_len: usize,
    ) -> Result<Self> {
        let handle = file::create_file(path, disposition)?;
        let existing_size = handle.get_size();
        let requested_data_offset = round_up(SIZES_HEADER_LEN, header_info.align().max(1)) + header_info.size();
        let requested_data_offset = round_up(requested_data_offset, header_info.align().max(1));

        let (data_offset, len, file_len) = if existing_size > 0 {
            if existing_size < SIZES_HEADER_LEN as u64 {
                tracing::warn!(existing_size, "map_file: existing file too short to hold sizes_hdr");
                return Err(Error::InvalidData);
            }
            let hdr = read_sizes_header(&handle)?;
            validate_sizes_header(&hdr, requested_data_offset, element_size, header_info.is_extendable())?;
            // Trust the offset actually stored on disk, not the one this
            // call would compute fresh: under `extendable`, the two may
            // legitimately differ (the file predates a header that grew).
            let data_offset = hdr.data_offset as usize;
            if existing_size < data_offset as u64 {
                tracing::warn!(existing_size, data_offset, "map_file: file shorter than its own stored header");
                return Err(Error::InvalidData);
            }
            // An existing file's element count is whatever's stored, not
            // the caller's `initial_len` (that only applies to a fresh
            // file) — a reopen must recover exactly what was persisted.
            let len = (hdr.data_size / (element_size.max(1) as u64)) as usize;
            (data_offset, len, existing_size.max(data_offset as u64))
        } else {
            let data_size = (initial_len * element_size) as u64;
            let file_len = requested_data_offset as u64 + data_size;
            (requested_data_offset, initial_len, file_len)
        };

        let mapping = mapping::create_mapping(
            Some(handle),
            ObjectAccess::ReadWrite,
            ChildProcess::DoesNotInherit,
            ShareMode::Shared,
            file_len,
        )?;

        let view_size = data_offset + len * element_size;
        let protection = view_protection(ObjectAccess::ReadWrite, ShareMode::Shared);
        let mut view = MappedView::map(&mapping, protection, 0, view_size.max(vm::page_size()))?;
        write_header_into_view(&mut view, data_offset, element_size, len);

        Ok(Self {
            mapping,
            view,
            header_info,
            data_offset,
            element_size,
            len,
            temp_path: None,
        })
    }

    /// Anonymous, process-private storage. Backed by a real (unlinked-on-
    /// drop via `tempfile`) temp file on POSIX so the same `sizes_hdr`
    /// machinery applies uniformly; on Windows the `Mapping` is a
    /// pagefile-backed section and no temp file is involved.
    pub fn map_memory(header_info: HeaderInfo, element_size: usize, initial_len: usize) -> Result<Self> {
        let data_offset = round_up(SIZES_HEADER_LEN, header_info.align().max(1)) + header_info.size();
        let data_offset = round_up(data_offset, header_info.align().max(1));
        let data_size = (initial_len * element_size) as u64;

        #[cfg(unix)]
        let (mapping, temp_path) = {
            let (handle, path) = file::temp_file()?;
            handle.set_size(data_offset as u64 + data_size)?;
            let mapping = mapping::create_mapping(
                Some(handle),
                ObjectAccess::ReadWrite,
                ChildProcess::DoesNotInherit,
                ShareMode::Hidden,
                data_offset as u64 + data_size,
            )?;
            (mapping, Some(path))
        };
        #[cfg(windows)]
        let (mapping, temp_path) = {
            let mapping = mapping::create_mapping(
                None,
                ObjectAccess::ReadWrite,
                ChildProcess::DoesNotInherit,
                ShareMode::Hidden,
                data_offset as u64 + data_size,
            )?;
            (mapping, None)
        };

        let view_size = data_offset + initial_len * element_size;
        let protection = view_protection(ObjectAccess::ReadWrite, ShareMode::Hidden);
        let mut view = MappedView::map(&mapping, protection, 0, view_size.max(vm::page_size()))?;
        write_header_into_view(&mut view, data_offset, element_size, initial_len);

        Ok(Self {
            mapping,
            view,
            header_info,
            data_offset,
            element_size,
            len: initial_len,
            temp_path,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements the current view can hold without growing.
    pub fn capacity(&self) -> usize {
        (self.view.len().saturating_sub(self.data_offset)) / self.element_size.max(1)
    }

    pub fn header(&self) -> &[u8] {
        let start = SIZES_HEADER_LEN;
        let end = self.data_offset;
        unsafe { std::slice::from_raw_parts(self.view.as_ptr().add(start), end - start) }
    }

    pub fn header_mut(&mut self) -> &mut [u8] {
        let start = SIZES_HEADER_LEN;
        let end = self.data_offset;
        unsafe { std::slice::from_raw_parts_mut(self.view.as_mut_ptr().add(start), end - start) }
    }

    pub fn data_ptr(&self) -> *const u8 {
        unsafe { self.view.as_ptr().add(self.data_offset) }
    }

    pub fn data_mut_ptr(&mut self) -> *mut u8 {
        unsafe { self.view.as_mut_ptr().add(self.data_offset) }
    }

    /// Grows the backing mapping/view, if needed, so `capacity() >=
    /// new_capacity`. This is a pure capacity operation: it never touches
    /// the logical length `TrVector` tracks, nor the persisted
    /// `sizes_hdr.data_size` — callers that mean to grow the *logical*
    /// length must also call `set_len` (see its doc comment for why the two
    /// are kept separate). Backing growth is geometric (`max(new_capacity,
    /// capacity * 3 / 2)` elements) so repeated single-element growth stays
    /// amortized constant; the view is sized to the padded capacity, not
    /// just `new_capacity`.
    pub fn grow_to(&mut self, new_capacity: usize) -> Result<()> {
        if new_capacity <= self.capacity() {
            return Ok(());
        }
        let target_capacity = new_capacity.max(self.capacity() * 3 / 2);
        tracing::debug!(target_capacity, current = self.capacity(), "growing mapped_storage backing");
        self.reserve_backing(target_capacity)?;
        let view_size = self.data_offset + target_capacity * self.element_size;
        self.view.expand(&self.mapping, 0, view_size)
    }

    /// Shrinks backing capacity to exactly `new_capacity` (`<=
    /// capacity()`), releasing the view's tail pages where the platform
    /// allows it. Like `grow_to`, this never touches the logical length or
    /// the persisted `sizes_hdr.data_size` — call `set_len` first if the
    /// logical length is also shrinking. The backing mapping's on-disk/
    /// section size is left at `new_capacity`; call `shrink_to_fit` to trim
    /// a file-based mapping down to the logical length instead.
    pub fn shrink_to(&mut self, new_capacity: usize) -> Result<()> {
        assert!(new_capacity <= self.capacity());
        if new_capacity < self.capacity() {
            let dropped_offset = self.data_offset + new_capacity * self.element_size;
            let dropped_len = (self.capacity() - new_capacity) * self.element_size;
            self.view.discard(dropped_offset, dropped_len);
        }
        let view_size = self.data_offset + new_capacity * self.element_size;
        self.view.shrink(view_size)
    }

    /// Sets the persisted logical length to `new_len`, which must be `<=
    /// capacity()` — callers grow capacity first via `grow_to`. This is the
    /// single place `sizes_hdr.data_size` is written, so every
    /// length-changing operation (push, pop, insert, remove, truncate — not
    /// just the ones that also happen to grow/shrink capacity) must route
    /// through here for a reopened `map_file` to recover the right element
    /// count.
    pub fn set_len(&mut self, new_len: usize) -> Result<()> {
        assert!(new_len <= self.capacity());
        self.len = new_len;
        self.persist_data_size()
    }

    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let target = self.len + additional;
        self.grow_to(target)
    }

    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        if new_len > self.capacity() {
            self.grow_to(new_len)?;
        }
        self.set_len(new_len)?;
        if new_len < self.capacity() {
            self.shrink_to(new_len)?;
        }
        Ok(())
    }

    /// Shrinks the backing mapping's size (file length / anonymous region)
    /// down to exactly fit `len`.
    pub fn shrink_to_fit(&mut self) -> Result<()> {
        let exact_size = self.data_offset as u64 + (self.len * self.element_size) as u64;
        if self.mapping.is_file_based() {
            self.mapping.set_size(exact_size)?;
        }
        Ok(())
    }

    fn reserve_backing(&mut self, target_capacity: usize) -> Result<()> {
        let new_size = self.data_offset as u64 + (target_capacity * self.element_size) as u64;
        if new_size > self.mapping.get_size() {
            self.mapping.set_size(new_size)?;
        }
        Ok(())
    }

    fn persist_data_size(&mut self) -> Result<()> {
        write_header_into_view(&mut self.view, self.data_offset, self.element_size, self.len);
        self.view.flush_async();
        Ok(())
    }

    pub fn flush_async(&self) {
        self.view.flush_async();
    }

    pub fn flush_blocking(&self) -> Result<()> {
        self.view.flush_blocking(&self.mapping)
    }

    pub fn header_info(&self) -> HeaderInfo {
        self.header_info
    }
}

/// Writes `sizes_hdr` directly into `view`'s own memory. Infallible: the
/// main view always physically covers `[0, data_offset)` by construction
/// (both `map_file` and `map_memory` size it that way before this is ever
/// called), so there's no separate transient mapping that could fail the
/// way a dedicated `MappedView::map` call for just these 24 bytes could.
fn write_header_into_view(view: &mut MappedView, data_offset: usize, element_size: usize, len: usize) {
    let hdr = SizesHeader {
        magic: SIZES_HEADER_MAGIC,
        data_offset: data_offset as u32,
        element_size: element_size as u32,
        header_size: (data_offset - SIZES_HEADER_LEN) as u32,
        data_size: (len * element_size) as u64,
    };
    let bytes = hdr.to_bytes();
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), view.as_mut_ptr(), SIZES_HEADER_LEN);
    }
}

#[cfg(unix)]
fn read_sizes_header(handle: &FileHandle) -> Result<SizesHeader> {
    let mut bytes = [0u8; SIZES_HEADER_LEN];
    unsafe {
        let ret = libc::pread(
            handle.raw() as i32,
            bytes.as_mut_ptr() as *mut libc::c_void,
            SIZES_HEADER_LEN,
            0,
        );
        if ret != SIZES_HEADER_LEN as isize {
            return Err(Error::InvalidData);
        }
    }
    Ok(SizesHeader::from_bytes(bytes))
}

#[cfg(windows)]
fn read_sizes_header(handle: &FileHandle) -> Result<SizesHeader> {
    use windows_sys::Win32::Storage::FileSystem::{ReadFile, SetFilePointerEx};
    let mut bytes = [0u8; SIZES_HEADER_LEN];
    unsafe {
        let mut new_pos = 0i64;
        if SetFilePointerEx(handle.raw() as isize, 0, &mut new_pos, 0) == 0 {
            return Err(Error::last_os_error());
        }
        let mut read = 0u32;
        let ok = ReadFile(
            handle.raw() as isize,
            bytes.as_mut_ptr(),
            SIZES_HEADER_LEN as u32,
            &mut read,
            std::ptr::null_mut(),
        );
        if ok == 0 || read as usize != SIZES_HEADER_LEN {
            return Err(Error::InvalidData);
        }
    }
    Ok(SizesHeader::from_bytes(bytes))
}

fn validate_sizes_header(
    hdr: &SizesHeader,
    expected_data_offset: usize,
    expected_element_size: usize,
    extendable: bool,
) -> Result<()> {
    if hdr.magic != SIZES_HEADER_MAGIC {
        tracing::warn!(magic = hdr.magic, "map_file: bad sizes_hdr magic");
        return Err(Error::InvalidData);
    }
    // Under `extendable`, a file written with an older, shorter header is a
    // valid prefix of the currently-requested layout; its stored offset
    // must be <= what's requested, never more (a *longer* on-disk header
    // than what's requested means the caller's HeaderInfo regressed).
    let offset_ok = if extendable {
        hdr.data_offset as usize <= expected_data_offset
    } else {
        hdr.data_offset as usize == expected_data_offset
    };
    if !offset_ok {
        tracing::warn!(
            stored = hdr.data_offset,
            expected_data_offset,
            extendable,
            "map_file: header layout does not match requested HeaderInfo"
        );
        return Err(Error::InvalidData);
    }
    if hdr.element_size as usize != expected_element_size {
        tracing::warn!(
            stored = hdr.element_size,
            expected_element_size,
            "map_file: element size does not match stored layout"
        );
        return Err(Error::InvalidData);
    }
    Ok(())
}
