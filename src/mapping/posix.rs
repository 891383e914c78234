use crate::error::Result;
use crate::file::FileHandle;
use crate::flags::{ChildProcess, ObjectAccess, ShareMode};
use std::cell::Cell;

/// POSIX has no standalone "section" kernel object: a mapping is either a
/// file descriptor reference (file-backed) or nothing at all (anonymous),
/// with size tracked directly since there's no section to query for
/// anonymous regions.
pub struct Mapping {
    file: FileHandle,
    access: ObjectAccess,
    share: ShareMode,
    child: ChildProcess,
    size: Cell<u64>,
}

impl Mapping {
    pub const CREATE_MAPPING_CAN_SET_SOURCE_SIZE: bool = false;
    pub const SUPPORTS_ZERO_SIZED_MAPPINGS: bool = true;
    pub const VIEWS_DOWNSIZEABLE: bool = true;

    pub(crate) fn create(
        file: FileHandle,
        access: ObjectAccess,
        child: ChildProcess,
        share: ShareMode,
        size: u64,
    ) -> Result<Self> {
        // POSIX has no section object to size independently of the file: a
        // mapping's "size" for a file-backed mapping *is* the file's length.
        if file.is_valid() && file.get_size() != size {
            file.set_size(size)?;
        }
        Ok(Self {
            file,
            access,
            share,
            child,
            size: Cell::new(size),
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

    /// `fstat`s the fd for file-backed mappings; returns the tracked size
    /// for anonymous ones (there's no kernel object to query). Never faults
    /// on a closed/invalid handle (returns 0, per spec.md §4.2).
    pub fn get_size(&self) -> u64 {
        if self.is_file_based() {
            self.file.get_size()
        } else {
            self.size.get()
        }
    }

    /// `ftruncate`s the fd for file-backed mappings; views stay live
    /// (spec.md §4.2). Anonymous mappings just update the tracked size —
    /// the actual backing is (re)allocated by `mapped_view::expand`/`shrink`.
    pub fn set_size(&mut self, new_size: u64) -> Result<()> {
        if self.is_file_based() {
            self.file.set_size(new_size)?;
        }
        self.size.set(new_size);
        Ok(())
    }

    pub(crate) fn raw_fd(&self) -> i32 {
        if self.is_file_based() {
            self.file.raw() as i32
        } else {
            -1
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::file;
    use crate::flags::CreationDisposition;

    #[test]
    fn creating_a_file_backed_mapping_sizes_the_file() {
        let path = std::env::temp_dir().join(format!("vmtr-mapping-test-{}", std::process::id()));
        let handle =
            file::create_file(&path, CreationDisposition::CreateNewOrTruncateExisting).expect("file should be creatable");
        let mapping = Mapping::create(handle, ObjectAccess::ReadWrite, ChildProcess::DoesNotInherit, ShareMode::Shared, 8192)
            .expect("mapping::create should succeed");
        assert_eq!(mapping.get_size(), 8192);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn anonymous_mapping_tracks_size_without_a_file() {
        let mapping = Mapping::create(
            FileHandle::invalid(),
            ObjectAccess::ReadWrite,
            ChildProcess::DoesNotInherit,
            ShareMode::Hidden,
            4096,
        )
        .expect("anonymous mapping::create should succeed");
        assert!(mapping.is_anonymous());
        assert_eq!(mapping.get_size(), 4096);
    }

    #[test]
    fn set_size_resizes_a_file_backed_mapping() {
        let path = std::env::temp_dir().join(format!("vmtr-mapping-resize-test-{}", std::process::id()));
        let handle =
            file::create_file(&path, CreationDisposition::CreateNewOrTruncateExisting).expect("file should be creatable");
        let mut mapping = Mapping::create(handle, ObjectAccess::ReadWrite, ChildProcess::DoesNotInherit, ShareMode::Shared, 4096)
            .expect("mapping::create should succeed");
        mapping.set_size(16384).expect("set_size should succeed");
        assert_eq!(mapping.get_size(), 16384);
        std::fs::remove_file(&path).ok();
    }
}
