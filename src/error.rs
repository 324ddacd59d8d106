//! Error type definitions.

use std::borrow::Cow;
use std::io::ErrorKind;
pub use std::io::Error as IoError;
pub use std::io::Result as IoResult;
use std::convert::TryFrom;
use std::error;
use std::fmt;
use smallvec::SmallVec;
use crate::id::Id;


// Export types

/// A result that may contain an iff error.
pub type Result<T> = std::result::Result<T, Error>;

/// A result that, if ok, contains nothing, and otherwise contains an iff error.
pub type UnitResult = Result<()>;

/// The chain of chunk ids from the outermost group down to a failing chunk.
pub type ChunkPath = SmallVec<[Id; 6]>;


/// An error that may happen while reading, validating or writing an iff file.
/// Distinguishes between malformed structure, invalid contents,
/// compression errors, and file system errors.
#[derive(Debug)]
pub enum Error {

    /// The eight byte chunk header could not be read,
    /// or the structure is unreasonable, for example nested too deeply.
    MalformedHeader(Cow<'static, str>),

    /// A chunk consumed or produced a different number of bytes than declared,
    /// or the children of a group do not add up to the size of the group.
    SizeMismatch {

        /// The chunk whose size was violated.
        id: Id,

        /// The byte count the size field promised.
        declared: u64,

        /// The byte count that was actually processed.
        actual: u64,
    },

    /// The stream ended before a declared size was satisfied.
    TruncatedStream,

    /// A null-terminated text did not end within its maximum length.
    UnboundedString {

        /// The maximum number of bytes, including the terminator.
        max_length: usize,
    },

    /// The contents violate a rule of the format, for example
    /// an inverted color range or a missing bitmap header.
    Invalid(Cow<'static, str>),

    /// The run-length codec would have read or written out of bounds.
    CompressionBounds(Cow<'static, str>),

    /// The data uses a feature that this implementation does not handle.
    NotSupported(Cow<'static, str>),

    /// The underlying byte stream could not be read or written.
    Io(IoError),

    /// Another error, annotated with the chunk it happened in.
    InChunk {

        /// Ids from the outermost chunk down to the failing chunk.
        path: ChunkPath,

        /// Byte offset of the innermost failing chunk header, if known.
        offset: Option<usize>,

        /// What actually went wrong.
        cause: Box<Error>,
    },
}


impl Error {

    /// Create an error of the variant `Invalid`.
    pub(crate) fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Invalid(message.into())
    }

    /// Create an error of the variant `NotSupported`.
    pub(crate) fn unsupported(message: impl Into<Cow<'static, str>>) -> Self {
        Error::NotSupported(message.into())
    }

    /// Create an error of the variant `MalformedHeader`.
    pub(crate) fn malformed(message: impl Into<Cow<'static, str>>) -> Self {
        Error::MalformedHeader(message.into())
    }

    /// Create an error of the variant `CompressionBounds`.
    pub(crate) fn compression_bounds(message: impl Into<Cow<'static, str>>) -> Self {
        Error::CompressionBounds(message.into())
    }

    /// Create an error of the variant `SizeMismatch`.
    pub(crate) fn size_mismatch(id: Id, declared: impl Into<u64>, actual: impl Into<u64>) -> Self {
        Error::SizeMismatch { id, declared: declared.into(), actual: actual.into() }
    }

    /// Annotate this error with the chunk it happened in.
    /// Called once per nesting level while the error travels to the root,
    /// so the outermost id ends up first. The offset of the innermost chunk is kept.
    pub fn within(self, id: Id, offset: Option<usize>) -> Self {
        match self {
            Error::InChunk { mut path, offset: inner_offset, cause } => {
                path.insert(0, id);
                Error::InChunk { path, offset: inner_offset.or(offset), cause }
            },

            cause => Error::InChunk {
                path: smallvec![ id ],
                offset,
                cause: Box::new(cause),
            },
        }
    }

    /// The innermost error, without the chunk context.
    pub fn cause(&self) -> &Error {
        match self {
            Error::InChunk { cause, .. } => cause.cause(),
            other => other,
        }
    }

    /// The ids from the root to the failing chunk, if known.
    pub fn chunk_path(&self) -> &[Id] {
        match self {
            Error::InChunk { path, .. } => path.as_slice(),
            _ => &[],
        }
    }
}


/// Enable using the `?` operator on `std::io::Result`.
impl From<IoError> for Error {
    fn from(error: IoError) -> Self {
        if error.kind() == ErrorKind::UnexpectedEof {
            Error::TruncatedStream
        }
        else {
            Error::Io(error)
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::InChunk { ref cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedHeader(message) => write!(formatter, "malformed chunk header: {}", message),
            Error::SizeMismatch { id, declared, actual } => write!(
                formatter, "size mismatch in chunk {}: declared {} bytes, processed {} bytes",
                id, declared, actual
            ),
            Error::TruncatedStream => write!(formatter, "stream ended before the declared size was reached"),
            Error::UnboundedString { max_length } => write!(formatter, "text exceeds the maximum length of {} bytes", max_length),
            Error::Invalid(message) => write!(formatter, "invalid contents: {}", message),
            Error::CompressionBounds(message) => write!(formatter, "compressed data out of bounds: {}", message),
            Error::NotSupported(message) => write!(formatter, "not supported: {}", message),
            Error::Io(err) => fmt::Display::fmt(err, formatter),

            Error::InChunk { path, offset, cause } => {
                for (index, id) in path.iter().enumerate() {
                    if index != 0 { write!(formatter, " > ")?; }
                    write!(formatter, "{}", id)?;
                }

                if let Some(offset) = offset {
                    write!(formatter, " (at byte {})", offset)?;
                }

                write!(formatter, ": {}", cause)
            },
        }
    }
}


/// Convert a size from a chunk header to a `usize`.
#[inline]
pub(crate) fn u32_to_usize(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// Convert a computed byte count to a chunk header size,
/// returning an error if the chunk would be too large for the format.
#[inline]
pub(crate) fn usize_to_u32(value: usize, id: Id) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::size_mismatch(id, u32::MAX, value as u64))
}
