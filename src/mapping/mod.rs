//! L2: the `Mapping` object — a kernel section (Windows) or a file
//! descriptor reference plus mapping parameters (POSIX).
//!
//! As with L1, the source's single template-on-platform-tag type becomes a
//! pair of `Mapping` structs selected by `cfg`; both expose the identical
//! surface named in spec.md §4.2 (`get_size`/`set_size`/`is_file_based`/
//! `underlying_file`/the three capability constants).
#[cfg(unix)]
mod posix;
#[cfg(unix)]
pub use posix::Mapping;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::Mapping;

use crate::error::Result;
use crate::file::FileHandle;
use crate::flags::{ChildProcess, ObjectAccess, ShareMode};

/// Creates a mapping backed by `file`, or an anonymous one if `file` is
/// `None`.
pub fn create_mapping(
    file: Option<FileHandle>,
    access: ObjectAccess,
    child: ChildProcess,
    share: ShareMode,
    size: u64,
) -> Result<Mapping> {
    let is_file_based = file.is_some();
    tracing::debug!(is_file_based, size, "creating mapping");
    Mapping::create(file.unwrap_or_else(FileHandle::invalid), access, child, share, size)
}
