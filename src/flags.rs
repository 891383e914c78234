//! The flag/enum surface spec.md §6.3 treats as opaque. These are consumed
//! by `mapping`/`mapped_storage` but, per spec.md §1, are themselves out of
//! scope for elaboration beyond the enumerated set of recognized values.
use crate::vm::Protection;

/// Object access rights requested for a mapping, crossed with `ShareMode`
/// to derive the `vm::Protection` used when mapping a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectAccess {
    MetaRead,
    Read,
    Write,
    Execute,
    ReadWrite,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareMode {
    /// Changes are visible to other mappers of the same backing object.
    Shared,
    /// Copy-on-write: changes are private to this mapping.
    Hidden,
}

/// The five-way disposition table from spec.md §4.2/§4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationDisposition {
    CreateNew,
    CreateNewOrTruncateExisting,
    OpenExisting,
    OpenOrCreate,
    OpenAndTruncateExisting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildProcess {
    Inherits,
    DoesNotInherit,
}

/// A bitset of platform hints (e.g. `FILE_FLAG_SEQUENTIAL_SCAN`,
/// `MADV_SEQUENTIAL`) the core forwards without interpreting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemHints(pub u32);

/// Derives the `vm::Protection` a view should be mapped with for a given
/// `(access, share)` pair. `MetaRead` and `Read` both yield read-only views;
/// `Write`/`ReadWrite`/`All`/`Execute` all yield a writable view (this crate
/// does not distinguish execute protection at the view layer: a consumer
/// that needs W^X should `protect()` the view explicitly after mapping).
pub fn view_protection(access: ObjectAccess, _share: ShareMode) -> Protection {
    match access {
        ObjectAccess::MetaRead | ObjectAccess::Read => Protection::ReadOnly,
        ObjectAccess::Write
        | ObjectAccess::ReadWrite
        | ObjectAccess::All
        | ObjectAccess::Execute => Protection::ReadWrite,
    }
}
