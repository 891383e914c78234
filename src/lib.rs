//! Cross-platform virtual-memory toolkit: persistent, memory-mapped,
//! contiguous containers built up from raw VM primitives.
//!
//! Layers, bottom to top:
//!
//! - [`handle`] (L0): RAII wrapper around a single OS handle/descriptor.
//! - [`vm`] (L1): reserve/commit/decommit/release/protect/expand over raw
//!   anonymous address ranges.
//! - [`mapping`] (L2): a kernel section (Windows) or file descriptor
//!   (POSIX) plus the parameters needed to map views of it.
//! - [`mapped_view`] (L3): an address-space window bound to a `Mapping`.
//! - [`mapped_storage`] (L4): the header+data region `tr_vector`/`vm_vector`
//!   grow and shrink into.
//! - [`tr_vector`] / [`vm_vector`] (L5): the containers themselves, generic
//!   over their backing store ([`storage::VectorBacking`]).
//!
//! [`heap_storage`] and [`fixed_storage`] are the two non-mapped backings a
//! `TrVector` can use instead of `mapped_storage`.
pub mod error;
pub mod handle;
pub mod vm;

pub mod file;
pub mod flags;
pub mod mapping;
pub mod mapped_view;
pub mod mapped_storage;

pub mod relocatable;
pub mod storage;

pub mod fixed_storage;
pub mod heap_storage;
pub mod tr_vector;
pub mod vm_vector;

pub use error::{Error, Result};
pub use flags::{ChildProcess, CreationDisposition, ObjectAccess, ShareMode, SystemHints};
pub use mapped_storage::{set_temp_dir, HeaderInfo, MappedStorage};
pub use mapped_view::MappedView;
pub use mapping::Mapping;
pub use relocatable::{Persistable, TriviallyRelocatable};
pub use storage::VectorBacking;
pub use tr_vector::TrVector;
pub use vm_vector::{map_file, map_memory, VmVector};
