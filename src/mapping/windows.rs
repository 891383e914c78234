//! Windows backend for L2: a kernel section object (`CreateFileMappingW`).
//!
//! Unlike POSIX, Windows has no atomic "resize a section in place" for
//! file-backed sections: growing or shrinking means closing the section,
//! adjusting the file length, and reopening a new section over it (see
//! `set_size` below; views mapped against the old section stay valid until
//! they're explicitly unmapped/remapped by `mapped_view`, but the `Mapping`
//! itself has no strong exception guarantee mid-resize — an error here
//! leaves the mapping closed, never half-resized).
//!
//! Anonymous (pagefile-backed) sections are created once, up front, at
//! `MAX_ANON_PF_SIZE` with `SEC_RESERVE`, so that `get_size`/`set_size` on an
//! anonymous mapping never touch the kernel at all: only the view's commit
//! charge actually grows.
use crate::error::{Error, Result};
use crate::file::FileHandle;
use crate::flags::{ChildProcess, ObjectAccess, ShareMode};
use crate::handle::SectionHandleRaw;
use std::ptr::null;
use windows_sys::Win32::Security::SECURITY_ATTRIBUTES;
use windows_sys::Win32::Storage::FileSystem::{
    FlushFileBuffers, SetEndOfFile, SetFilePointerEx,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, PAGE_READONLY, PAGE_READWRITE, SEC_RESERVE,
};

pub struct Mapping {
    section: SectionHandleRaw,
    file: FileHandle,
    access: ObjectAccess,
    share: ShareMode,
    child: ChildProcess,
    protection: u32,
}

impl Mapping {
    pub const CREATE_MAPPING_CAN_SET_SOURCE_SIZE: bool = true;
    pub const SUPPORTS_ZERO_SIZED_MAPPINGS: bool = false;
    pub const VIEWS_DOWNSIZEABLE: bool = false;

    /// Anonymous sections are reserved once at this ceiling (mirrors the
    /// `max_anonymous_pf_mapping_size` invariant the original keeps): only
    /// `SEC_RESERVE` pages are committed on demand as views grow into it.
    pub const MAX_ANON_PF_SIZE: u64 = i32::MAX as u64;

    pub(crate) fn create(
        file: FileHandle,
        access: ObjectAccess,
        child: ChildProcess,
        share: ShareMode,
        size: u64,
    ) -> Result<Self> {
        let protection = match access {
            ObjectAccess::MetaRead | ObjectAccess::Read => PAGE_READONLY,
            _ => PAGE_READWRITE,
        };
        let is_file_based = file.is_valid();
        let section_size = if is_file_based {
            size
        } else {
            Self::MAX_ANON_PF_SIZE
        };
        let section = create_section(
            is_file_based.then(|| file.raw() as isize),
            protection,
            is_file_based,
            section_size,
            child,
        )?;
        Ok(Self {
            section,
            file,
            access,
            share,
            child,
            protection,
        })
    }

    pub fn is_file_based(&self) -> bool {
        self.file.is_valid()
    }

    pub fn is_anonymous(&self) -> bool {
        !self.is_file_based()
    }

    pub fn access(&self) -> ObjectAccess {
        self.access
    }

    pub fn share(&self) -> ShareMode {
        self.share
    }

    pub fn child_process(&self) -> ChildProcess {
        self.child
    }

    pub fn underlying_file(&self) -> Option<&FileHandle> {
        self.is_file_based().then(|| &self.file)
    }

    pub(crate) fn section_raw(&self) -> isize {
        self.section.raw()
    }

    /// Anonymous mappings report the fixed ceiling, not the committed
    /// amount — only the view layer tracks how much of it is in use.
    pub fn get_size(&self) -> u64 {
        if self.is_file_based() {
            self.file.get_size()
        } else {
            Self::MAX_ANON_PF_SIZE
        }
    }

    /// Closes the current section, grows/truncates the file, and reopens a
    /// new section over it. No-op for anonymous mappings (there's nothing to
    /// resize: the pagefile-backed section already spans the ceiling).
    pub fn set_size(&mut self, new_size: u64) -> Result<()> {
        if !self.is_file_based() {
            return Ok(());
        }
        tracing::debug!(
            old_size = self.get_size(),
            new_size,
            "recreating file-backed section across resize"
        );
        // Drop the old section before touching the file's length: Windows
        // won't let a section's backing file be extended while the section
        // that spans the old length is still open, and shrinking past a
        // mapped section's extent is rejected outright. There is no strong
        // exception guarantee across this window: a failure below leaves
        // `self.section` invalid rather than retrying.
        let old_section = self.section.take();
        drop(old_section);

        if let Err(e) = set_file_size(&self.file, new_size) {
            tracing::warn!(error = ?e, "file resize failed mid section-recreation");
            return Err(e);
        }

        self.section = create_section(
            Some(self.file.raw() as isize),
            self.protection,
            true,
            new_size,
            self.child,
        )
        .map_err(|e| {
            tracing::warn!(error = ?e, "section recreation failed after file resize");
            e
        })?;
        Ok(())
    }
}

fn set_file_size(file: &FileHandle, new_size: u64) -> Result<()> {
    unsafe {
        let mut distance = new_size as i64;
        if SetFilePointerEx(file.raw() as isize, distance, &mut distance, 0) == 0 {
            return Err(Error::last_os_error());
        }
        if SetEndOfFile(file.raw() as isize) == 0 {
            return Err(Error::last_os_error());
        }
        FlushFileBuffers(file.raw() as isize);
    }
    Ok(())
}

fn create_section(
    file_handle: Option<isize>,
    protection: u32,
    file_based: bool,
    size: u64,
    child: ChildProcess,
) -> Result<SectionHandleRaw> {
    let flags = if file_based {
        protection
    } else {
        protection | SEC_RESERVE
    };
    let inherit = matches!(child, ChildProcess::Inherits) as i32;
    let mut sa: SECURITY_ATTRIBUTES = unsafe { std::mem::zeroed() };
    sa.nLength = std::mem::size_of::<SECURITY_ATTRIBUTES>() as u32;
    sa.bInheritHandle = inherit;

    let raw_handle = file_handle.unwrap_or(0);
    let handle = unsafe {
        CreateFileMappingW(
            raw_handle as windows_sys::Win32::Foundation::HANDLE,
            if inherit != 0 { &sa } else { null() },
            flags,
            (size >> 32) as u32,
            size as u32,
            null(),
        )
    };
    if handle == 0 {
        return Err(Error::last_os_error());
    }
    Ok(unsafe { SectionHandleRaw::from_raw(handle) })
}
