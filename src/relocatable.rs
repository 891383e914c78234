//! Marker traits for container element types.
//!
//! `TriviallyRelocatable` lets `TrVector`/`VmVector` move elements with
//! `memcpy` instead of move-construct-then-destroy during capacity changes
//! and erase/insert shifts, the same optimization the source's
//! `is_trivially_moveable` trait unlocks. `Persistable` is the stricter bar
//! `VmVector::map_file` requires: a type whose bit pattern is meaningful
//! across process runs, so it can't hold raw pointers, `Box`, `Vec`, or
//! anything else that encodes an address.
/// # Safety
///
/// Implementors must guarantee that a `memcpy` of `size_of::<Self>()` bytes
/// produces a bitwise-identical, independently valid value at the
/// destination, with no remaining obligation on the source (i.e. the source
/// bytes may be freed/overwritten without running `Drop`). This holds for
/// any `Copy` type and for move-only types with no internal self-reference
/// or address stored out-of-band (e.g. `Box<T>`, `Vec<T>`, `String`).
pub unsafe trait TriviallyRelocatable {}

unsafe impl TriviallyRelocatable for u8 {}
unsafe impl TriviallyRelocatable for u16 {}
unsafe impl TriviallyRelocatable for u32 {}
unsafe impl TriviallyRelocatable for u64 {}
unsafe impl TriviallyRelocatable for u128 {}
unsafe impl TriviallyRelocatable for usize {}
unsafe impl TriviallyRelocatable for i8 {}
unsafe impl TriviallyRelocatable for i16 {}
unsafe impl TriviallyRelocatable for i32 {}
unsafe impl TriviallyRelocatable for i64 {}
unsafe impl TriviallyRelocatable for i128 {}
unsafe impl TriviallyRelocatable for isize {}
unsafe impl TriviallyRelocatable for f32 {}
unsafe impl TriviallyRelocatable for f64 {}
unsafe impl TriviallyRelocatable for bool {}
unsafe impl TriviallyRelocatable for char {}
unsafe impl<T> TriviallyRelocatable for Box<T> {}
unsafe impl<T: TriviallyRelocatable> TriviallyRelocatable for Option<T> {}
unsafe impl<T: TriviallyRelocatable, const N: usize> TriviallyRelocatable for [T; N] {}

/// # Safety
///
/// Implementors must guarantee that every bit pattern `Self` can legally
/// hold contains no process-local address: no raw pointer, no `Box`/`Vec`/
/// `String`/`Rc`/`Arc`, and no type that embeds one. A value written to a
/// `vm_vector`-backed file by one process must be a valid `Self` when a
/// different process later maps the same file and reads it back.
pub unsafe trait Persistable: TriviallyRelocatable {}

unsafe impl Persistable for u8 {}
unsafe impl Persistable for u16 {}
unsafe impl Persistable for u32 {}
unsafe impl Persistable for u64 {}
unsafe impl Persistable for u128 {}
unsafe impl Persistable for usize {}
unsafe impl Persistable for i8 {}
unsafe impl Persistable for i16 {}
unsafe impl Persistable for i32 {}
unsafe impl Persistable for i64 {}
unsafe impl Persistable for i128 {}
unsafe impl Persistable for isize {}
unsafe impl Persistable for f32 {}
unsafe impl Persistable for f64 {}
unsafe impl Persistable for bool {}
unsafe impl Persistable for char {}
unsafe impl<T: Persistable, const N: usize> Persistable for [T; N] {}
