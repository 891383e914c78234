//! The storage abstraction `TrVector`/`VmVector` grow into.
//!
//! The source composes a vector with its backing store via multiple
//! inheritance (a `contiguous_storage` mixin the vector derives from).
//! Rust has no multiple inheritance, so this crate uses composition behind
//! a trait instead: `TrVector<T, S>` holds an `S: VectorBacking<T>` and
//! forwards capacity management to it. `HeapStorage` and `mapped_storage`'s
//! adapter are the two implementations; `FixedStorage` is a third that
//! never grows past its const-generic capacity.
use crate::error::Result;

/// Growable, contiguous backing for `T` elements. Implementors own the
/// allocation; `TrVector` owns the logical length and drives construction/
/// destruction of individual elements within `[0, len)`.
///
/// # Safety
///
/// `data`/`data_mut` must return a pointer valid for reads (and, for
/// `data_mut`, writes) of `capacity()` elements of `T`, properly aligned,
/// for as long as `self` isn't mutated through a capacity-changing method.
pub unsafe trait VectorBacking<T> {
    /// Pointer to the first element slot. May be dangling iff `capacity() ==
    /// 0`.
    fn data(&self) -> *const T;
    fn data_mut(&mut self) -> *mut T;

    /// Elements the current allocation can hold without reallocating.
    fn capacity(&self) -> usize;

    /// Grows the allocation to hold at least `new_capacity` elements,
    /// without changing the logical length `TrVector` tracks separately.
    /// Implementors that can relocate elements in place for
    /// `T: TriviallyRelocatable` should do so; `TrVector` always falls back
    /// to move-construct-then-drop when the backing can't guarantee that.
    fn grow_to(&mut self, new_capacity: usize) -> Result<()>;

    /// Shrinks the allocation to exactly `new_capacity`, which must be `<=
    /// capacity()`. Implementors that can't give memory back in place
    /// (Windows-backed mapped storage) may treat this as a no-op.
    fn shrink_to(&mut self, new_capacity: usize) -> Result<()>;

    /// Whether this backing can relocate its contents with `memcpy` when
    /// growing/shrinking (true for heap and mapped storage, both of which
    /// move the whole allocation rather than leaving old slots behind).
    fn relocates_bitwise(&self) -> bool {
        true
    }

    /// Notifies the backing of the vector's current logical length.
    ///
    /// `TrVector` calls this after *every* operation that changes `len()` —
    /// push, pop, insert, remove, truncate — not just the ones that also
    /// call `grow_to`/`shrink_to` (those only fire when capacity is
    /// exceeded or explicitly released). Backings with no out-of-band
    /// notion of length (heap, fixed-inline) ignore it; `mapped_storage`'s
    /// adapter persists it into `sizes_hdr` so a reopen recovers the real
    /// element count rather than whatever capacity happened to be reserved.
    fn notify_len(&mut self, _len: usize) {}
}
