//! The fallible-result type shared by the mapping, view, and storage
//! layers. Destructors and `shrink_*`/`unmap`/`close` never return this:
//! they are `noexcept` the way the source's were (see `mapped_storage`).

/// Errors surfaced by L1-L4 operations.
///
/// `Os` carries a raw errno (POSIX) or `GetLastError` code (Windows); use
/// `std::io::Error::from_raw_os_error` at the call site if a `std::io::Error`
/// is more convenient.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("OS error {0}")]
    Os(i32),
    #[error("stored header does not match the requested layout")]
    InvalidData,
    #[error("anonymous mapping cannot be extended past its ceiling")]
    SectionNotExtended,
    #[error("out of memory")]
    OutOfMemory,
    #[error("index out of range")]
    OutOfRange,
}

impl Error {
    /// Captures the platform's last error as an `Error::Os`.
    pub(crate) fn last_os_error() -> Self {
        Error::Os(std::io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
