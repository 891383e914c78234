//! Minimal file-handle plumbing.
//!
//! spec.md §1 keeps file open/create/delete *policy* (permission structs,
//! deletion helpers) out of scope as an external collaborator. This module
//! is the private exception: `mapped_storage::map_file` (§4.4) needs to open
//! or create a backing file and read/set its length, so it carries just
//! enough of a `file_handle` RAII type to do that — nothing public, nothing
//! beyond the disposition table spec.md already enumerates.
use crate::error::{Error, Result};
use crate::flags::CreationDisposition;
use crate::handle::FileHandleRaw;
use std::path::Path;

pub struct FileHandle(FileHandleRaw);

impl FileHandle {
    pub(crate) fn raw(&self) -> crate::handle::Raw {
        self.0.raw()
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.0.is_valid()
    }

    pub(crate) fn invalid() -> Self {
        Self(FileHandleRaw::invalid())
    }

    #[cfg(unix)]
    pub(crate) fn get_size(&self) -> u64 {
        if !self.is_valid() {
            return 0;
        }
        unsafe {
            let mut st: libc::stat = std::mem::zeroed();
            if libc::fstat(self.raw() as i32, &mut st) != 0 {
                return 0;
            }
            st.st_size as u64
        }
    }

    #[cfg(windows)]
    pub(crate) fn get_size(&self) -> u64 {
        use windows_sys::Win32::Storage::FileSystem::GetFileSizeEx;
        if !self.is_valid() {
            return 0;
        }
        unsafe {
            let mut size: i64 = 0;
            if GetFileSizeEx(self.raw() as isize, &mut size) == 0 {
                return 0;
            }
            size as u64
        }
    }

    #[cfg(unix)]
    pub(crate) fn set_size(&self, new_size: u64) -> Result<()> {
        let ret = unsafe { libc::ftruncate(self.raw() as i32, new_size as libc::off_t) };
        if ret == 0 {
            Ok(())
        } else {
            Err(Error::last_os_error())
        }
    }

    #[cfg(windows)]
    pub(crate) fn set_size(&self, new_size: u64) -> Result<()> {
        use windows_sys::Win32::Storage::FileSystem::{SetEndOfFile, SetFilePointerEx};
        unsafe {
            let mut distance = new_size as i64;
            if SetFilePointerEx(self.raw() as isize, distance, &mut distance, 0) == 0 {
                return Err(Error::last_os_error());
            }
            if SetEndOfFile(self.raw() as isize) == 0 {
                return Err(Error::last_os_error());
            }
        }
        Ok(())
    }

    #[cfg(windows)]
    pub(crate) fn flush_buffers(&self) {
        use windows_sys::Win32::Storage::FileSystem::FlushFileBuffers;
        if self.is_valid() {
            unsafe {
                FlushFileBuffers(self.raw() as isize);
            }
        }
    }
}

#[cfg(unix)]
pub(crate) fn create_file(path: &Path, disposition: CreationDisposition) -> Result<FileHandle> {
    use std::os::unix::ffi::OsStrExt;
    let mut cpath: Vec<u8> = path.as_os_str().as_bytes().to_vec();
    cpath.push(0);

    let (oflags, _truncate_after_open) = match disposition {
        CreationDisposition::CreateNew => (libc::O_CREAT | libc::O_EXCL, false),
        CreationDisposition::CreateNewOrTruncateExisting => {
            (libc::O_CREAT | libc::O_TRUNC, false)
        }
        CreationDisposition::OpenExisting => (0, false),
        CreationDisposition::OpenOrCreate => (libc::O_CREAT, false),
        CreationDisposition::OpenAndTruncateExisting => (libc::O_TRUNC, false),
    };

    let fd = unsafe {
        libc::open(
            cpath.as_ptr() as *const libc::c_char,
            libc::O_RDWR | oflags,
            0o644,
        )
    };
    if fd < 0 {
        return Err(Error::last_os_error());
    }
    Ok(FileHandle(unsafe { FileHandleRaw::from_raw(fd as isize) }))
}

#[cfg(windows)]
pub(crate) fn create_file(path: &Path, disposition: CreationDisposition) -> Result<FileHandle> {
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Foundation::INVALID_HANDLE_VALUE;
    use windows_sys::Win32::Storage::FileSystem::{
        CreateFileW, FILE_ATTRIBUTE_NORMAL, FILE_GENERIC_READ, FILE_GENERIC_WRITE,
        FILE_SHARE_READ, CREATE_ALWAYS, CREATE_NEW, OPEN_ALWAYS, OPEN_EXISTING, TRUNCATE_EXISTING,
    };

    let win_disposition = match disposition {
        CreationDisposition::CreateNew => CREATE_NEW,
        CreationDisposition::CreateNewOrTruncateExisting => CREATE_ALWAYS,
        CreationDisposition::OpenExisting => OPEN_EXISTING,
        CreationDisposition::OpenOrCreate => OPEN_ALWAYS,
        CreationDisposition::OpenAndTruncateExisting => TRUNCATE_EXISTING,
    };

    let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
    wide.push(0);

    let handle = unsafe {
        CreateFileW(
            wide.as_ptr(),
            FILE_GENERIC_READ | FILE_GENERIC_WRITE,
            FILE_SHARE_READ,
            std::ptr::null(),
            win_disposition,
            FILE_ATTRIBUTE_NORMAL,
            0,
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        return Err(Error::last_os_error());
    }
    Ok(FileHandle(unsafe { FileHandleRaw::from_raw(handle as isize) }))
}

/// Opens a private, unnamed temp file good for one process's lifetime;
/// mirrors slitter's `file_backed_mapper::get_temp_file`, down to honoring a
/// global override directory (see `mapped_storage::set_temp_dir`).
pub(crate) fn temp_file() -> Result<(FileHandle, tempfile::TempPath)> {
    let dir = crate::mapped_storage::temp_dir();
    let named = match dir {
        Some(dir) => tempfile::NamedTempFile::new_in(dir),
        None => tempfile::NamedTempFile::new(),
    }
    .map_err(|e| Error::Os(e.raw_os_error().unwrap_or(0)))?;
    let (file, path) = named.into_parts();
    let handle = into_file_handle(file);
    Ok((handle, path))
}

#[cfg(unix)]
fn into_file_handle(file: std::fs::File) -> FileHandle {
    use std::os::unix::io::IntoRawFd;
    FileHandle(unsafe { FileHandleRaw::from_raw(file.into_raw_fd() as isize) })
}

#[cfg(windows)]
fn into_file_handle(file: std::fs::File) -> FileHandle {
    use std::os::windows::io::IntoRawHandle;
    FileHandle(unsafe { FileHandleRaw::from_raw(file.into_raw_handle() as isize) })
}
