//! Heap-backed `VectorBacking`: a thin wrapper over `std::alloc`, playing
//! the role the source's `crt_vector`/`crt_aligned_allocator` plays for a
//! `tr_vector` that isn't memory-mapped. `Layout` already carries arbitrary
//! (power-of-two) alignment, so there's no need for the source's manual
//! `posix_memalign`/`_aligned_realloc` branch: one realloc path handles both
//! the default and over-aligned cases.
use crate::error::{Error, Result};
use std::alloc::{self, Layout};
use std::marker::PhantomData;
use std::ptr::NonNull;

pub struct HeapStorage<T> {
    ptr: Option<NonNull<T>>,
    capacity: usize,
    align: usize,
    _marker: PhantomData<T>,
}

impl<T> HeapStorage<T> {
    pub fn new() -> Self {
        Self {
            ptr: None,
            capacity: 0,
            align: std::mem::align_of::<T>(),
            _marker: PhantomData,
        }
    }

    /// Requests at least `align` bytes of alignment for the allocation,
    /// which must be a power of two no smaller than `align_of::<T>()`.
    /// Used by containers that want SIMD-friendly or cacheline-aligned
    /// storage beyond what `T`'s natural alignment provides.
    pub fn with_alignment(align: usize) -> Self {
        assert!(align.is_power_of_two());
        assert!(align >= std::mem::align_of::<T>());
        Self {
            ptr: None,
            capacity: 0,
            align,
            _marker: PhantomData,
        }
    }

    fn layout(&self, capacity: usize) -> Result<Layout> {
        Layout::from_size_align(
            capacity
                .checked_mul(std::mem::size_of::<T>())
                .ok_or(Error::OutOfMemory)?,
            self.align,
        )
        .map_err(|_| Error::OutOfMemory)
    }
}

impl<T> Default for HeapStorage<T> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<T> crate::storage::VectorBacking<T> for HeapStorage<T> {
    fn data(&self) -> *const T {
        self.ptr.map_or(std::ptr::NonNull::dangling().as_ptr(), |p| p.as_ptr())
    }

    fn data_mut(&mut self) -> *mut T {
        self.ptr.map_or(std::ptr::NonNull::dangling().as_ptr(), |p| p.as_ptr())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn grow_to(&mut self, new_capacity: usize) -> Result<()> {
        if new_capacity <= self.capacity {
            return Ok(());
        }
        if std::mem::size_of::<T>() == 0 {
            self.capacity = new_capacity;
            return Ok(());
        }
        let new_layout = self.layout(new_capacity)?;
        let new_ptr = match self.ptr {
            None => unsafe { alloc::alloc(new_layout) },
            Some(old) => {
                let old_layout = self.layout(self.capacity)?;
                unsafe { alloc::realloc(old.as_ptr() as *mut u8, old_layout, new_layout.size()) }
            }
        };
        let new_ptr = NonNull::new(new_ptr as *mut T).ok_or(Error::OutOfMemory)?;
        self.ptr = Some(new_ptr);
        self.capacity = new_capacity;
        Ok(())
    }

    fn shrink_to(&mut self, new_capacity: usize) -> Result<()> {
        assert!(new_capacity <= self.capacity);
        if std::mem::size_of::<T>() == 0 {
            self.capacity = new_capacity;
            return Ok(());
        }
        let Some(old) = self.ptr else {
            return Ok(());
        };
        if new_capacity == 0 {
            let old_layout = self.layout(self.capacity)?;
            unsafe {
                alloc::dealloc(old.as_ptr() as *mut u8, old_layout);
            }
            self.ptr = None;
            self.capacity = 0;
            return Ok(());
        }
        let old_layout = self.layout(self.capacity)?;
        let new_layout = self.layout(new_capacity)?;
        let new_ptr = unsafe { alloc::realloc(old.as_ptr() as *mut u8, old_layout, new_layout.size()) };
        let new_ptr = NonNull::new(new_ptr as *mut T).ok_or(Error::OutOfMemory)?;
        self.ptr = Some(new_ptr);
        self.capacity = new_capacity;
        Ok(())
    }
}

impl<T> Drop for HeapStorage<T> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr {
            if std::mem::size_of::<T>() != 0 {
                if let Ok(layout) = self.layout(self.capacity) {
                    unsafe {
                        alloc::dealloc(ptr.as_ptr() as *mut u8, layout);
                    }
                }
            }
        }
    }
}
