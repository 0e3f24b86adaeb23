use std::io::Cursor;
use thiserror::Error;

/// crate specific Result type
pub type Result<T> = std::result::Result<T, Error>;

/// crate specific Error enum
#[derive(Error, Debug)]
pub enum Error {
    /// No registered format claims the extension of the source name
    #[error("no decoder registered for {:?}", .0)]
    UnsupportedFormat(String),

    /// Fetching the raw bytes of a source failed
    #[error("source {name:?} is unavailable")]
    SourceUnavailable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The leading magic id does not match the format
    #[error("corrupt {format} header: expected magic id {expected}, found {found}")]
    CorruptHeader {
        format: crate::Format,
        expected: u16,
        found: u16,
    },

    /// A computed offset or length runs past the end of the buffer
    #[error("buffer truncated: {needed} bytes needed at offset {offset}, buffer holds {len}")]
    TruncatedBuffer { offset: usize, needed: usize, len: usize },

    /// The compressed payload could not be decompressed
    #[error("decompression failed: {}", .0)]
    DecompressionError(String),
}

impl Error {
    /// Maps a failed cursor read at `offset` to [Error::TruncatedBuffer].
    ///
    /// Reads over an in-memory buffer only fail on end of data.
    pub(crate) fn truncated(offset: u64, needed: usize, len: usize) -> Self {
        Error::TruncatedBuffer {
            offset: offset as usize,
            needed,
            len,
        }
    }
}

/// Runs a fixed-width read on `cursor`, reporting a short buffer as [Error::TruncatedBuffer].
pub(crate) fn read_field<T, F>(cursor: &mut Cursor<&[u8]>, needed: usize, read: F) -> Result<T>
where
    F: FnOnce(&mut Cursor<&[u8]>) -> std::io::Result<T>,
{
    let offset = cursor.position();
    let len = cursor.get_ref().len();
    read(cursor).map_err(|_| Error::truncated(offset, needed, len))
}
