//! Append-only byte stores underneath the log engine.
//!
//! A backend knows nothing about frames or records. The log engine appends
//! whole frames, reads the file back on open, and truncates a torn tail.

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::InMemoryBackend;

use crate::error::StorageResult;

/// An append-only byte store.
///
/// # Invariants
///
/// - `append` returns the offset where the bytes landed
/// - `read_at` returns exactly what was appended at that offset
/// - after `sync` returns, appended bytes survive process termination
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`crate::StorageError::ReadPastEnd`] if the range extends
    /// past the current size, or on I/O failure.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    fn flush(&mut self) -> StorageResult<()>;

    /// Current size in bytes; the offset of the next append.
    ///
    /// # Errors
    ///
    /// Fails if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Forces data and metadata to durable media.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    fn sync(&mut self) -> StorageResult<()>;

    /// Cuts the store back to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// Fails if `new_size` exceeds the current size, or on I/O failure.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Reads the entire contents.
    ///
    /// # Errors
    ///
    /// Fails on I/O failure.
    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let size = self.size()?;
        let len = usize::try_from(size)
            .map_err(|_| crate::StorageError::corrupted(format!("log too large: {size} bytes")))?;
        self.read_at(0, len)
    }
}

fn truncate_error(new_size: u64, current: u64) -> crate::StorageError {
    crate::StorageError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("cannot grow by truncation: requested {new_size}, current size {current}"),
    ))
}
