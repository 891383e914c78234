//! `VmVector<T>`: a `TrVector` backed by `mapped_storage` instead of the
//! heap, so its contents live in a memory-mapped file (or, via
//! `map_memory`, an anonymous mapping that still goes through the same
//! `mapped_storage` layout/growth code paths as the file-backed case).
//!
//! `map_file` requires `T: Persistable`: the whole point of a file-backed
//! vector is that a *different* process can later map the same file and
//! read the elements back, which only makes sense for types with no
//! process-local addresses baked into their bit pattern.
use crate::error::Result;
use crate::flags::CreationDisposition;
use crate::mapped_storage::{HeaderInfo, MappedStorage};
use crate::relocatable::{Persistable, TriviallyRelocatable};
use crate::storage::VectorBacking;
use crate::tr_vector::TrVector;
use std::marker::PhantomData;
use std::path::Path;

/// Adapts the byte-oriented `MappedStorage` to `VectorBacking<T>`.
pub struct MappedBacking<T> {
    storage: MappedStorage,
    _marker: PhantomData<T>,
}

impl<T> MappedBacking<T> {
    fn new(storage: MappedStorage) -> Self {
        Self {
            storage,
            _marker: PhantomData,
        }
    }

    pub fn flush_async(&self) {
        self.storage.flush_async();
    }

    pub fn flush_blocking(&self) -> Result<()> {
        self.storage.flush_blocking()
    }

    pub fn header(&self) -> &[u8] {
        self.storage.header()
    }

    pub fn header_mut(&mut self) -> &mut [u8] {
        self.storage.header_mut()
    }
}

unsafe impl<T: TriviallyRelocatable> VectorBacking<T> for MappedBacking<T> {
    fn data(&self) -> *const T {
        self.storage.data_ptr() as *const T
    }

    fn data_mut(&mut self) -> *mut T {
        self.storage.data_mut_ptr() as *mut T
    }

    fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    fn grow_to(&mut self, new_capacity: usize) -> Result<()> {
        self.storage.grow_to(new_capacity)
    }

    fn shrink_to(&mut self, new_capacity: usize) -> Result<()> {
        self.storage.shrink_to(new_capacity)
    }

    fn notify_len(&mut self, len: usize) {
        self.storage
            .set_len(len)
            .expect("persisting a vm_vector's length should never fail once its capacity already covers it");
    }
}

pub type VmVector<T> = TrVector<T, MappedBacking<T>>;

/// Opens (or creates, per `disposition`) a file-backed `VmVector<T>`.
/// Reopening an existing file recovers its element count from the stored
/// header and validates the layout matches `header_info`/`size_of::<T>()`.
pub fn map_file<T: Persistable>(
    path: &Path,
    disposition: CreationDisposition,
    header_info: HeaderInfo,
) -> Result<VmVector<T>> {
    let storage = MappedStorage::map_file(path, disposition, header_info, std::mem::size_of::<T>(), 0)?;
    let len = storage.len();
    let mut vector = TrVector::with_backing(MappedBacking::new(storage));
    unsafe {
        vector.set_len(len);
    }
    Ok(vector)
}

/// Anonymous, process-private `VmVector<T>` that still goes through
/// `mapped_storage`'s geometric-growth and view-sizing code paths (useful
/// for testing that path, or for large vectors a caller wants kept off the
/// regular heap allocator).
pub fn map_memory<T: TriviallyRelocatable>(header_info: HeaderInfo) -> Result<VmVector<T>> {
    let storage = MappedStorage::map_memory(header_info, std::mem::size_of::<T>(), 0)?;
    Ok(TrVector::with_backing(MappedBacking::new(storage)))
}
