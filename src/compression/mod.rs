//! Contains the compression mode definition
//! and methods to compress and decompress pixel rows.


pub mod byterun;


use crate::error::{Result, Error};


/// A byte vector.
pub type ByteVec = Vec<u8>;

/// A byte slice.
pub type Bytes<'s> = &'s [u8];


/// Specifies how the rows of a bitmap body are stored.
/// Every row of every plane is compressed on its own,
/// so a run never spans two rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {

    /// Store the interleaved rows as-is.
    /// Fastest to read and write, but large.
    None,

    /// Run-length encoding with literal and replicate runs.
    /// Works best for images with large flat areas, which is most pixel art.
    /// This compression method is lossless.
    ByteRun,
}

impl Compression {

    /// The value of the compression byte in a bitmap header.
    pub fn to_byte(self) -> u8 {
        match self {
            Compression::None => 0,
            Compression::ByteRun => 1,
        }
    }

    /// Interpret the compression byte of a bitmap header.
    /// Returns `None` for vendor-specific compression methods.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Compression::None),
            1 => Some(Compression::ByteRun),
            _ => None,
        }
    }

    /// Like `from_byte`, but returns an error for unknown methods.
    pub fn from_byte_or_err(byte: u8) -> Result<Self> {
        Self::from_byte(byte).ok_or_else(|| Error::unsupported(format!("compression method {}", byte)))
    }

    /// Compress consecutive rows of `row_bytes` bytes each.
    pub fn compress_rows(self, rows: Bytes<'_>, row_bytes: usize) -> Result<ByteVec> {
        match self {
            Compression::None => Ok(rows.to_vec()),
            Compression::ByteRun => byterun::compress_rows(rows, row_bytes),
        }
    }

    /// Decompress `row_count` rows of `row_bytes` bytes each.
    /// The result always has exactly `row_bytes * row_count` bytes.
    pub fn decompress_rows(self, compressed: Bytes<'_>, row_bytes: usize, row_count: usize) -> Result<ByteVec> {
        match self {
            Compression::None => {
                let expected_byte_size = row_bytes.checked_mul(row_count)
                    .ok_or_else(|| Error::invalid("row dimensions too large"))?;

                // uncompressed bodies may carry a trailing pad byte
                if compressed.len() < expected_byte_size {
                    return Err(Error::invalid(format!(
                        "uncompressed body has {} bytes, but {} bytes are required",
                        compressed.len(), expected_byte_size
                    )));
                }

                Ok(compressed[.. expected_byte_size].to_vec())
            },

            Compression::ByteRun => byterun::decompress_rows(compressed, row_bytes, row_count),
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} compression", match self {
            Compression::None => "no",
            Compression::ByteRun => "byte run",
        })
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_byte(){
        assert_eq!(Compression::from_byte(0), Some(Compression::None));
        assert_eq!(Compression::from_byte(1), Some(Compression::ByteRun));
        assert_eq!(Compression::from_byte(2), None);
        assert!(matches!(Compression::from_byte_or_err(7), Err(Error::NotSupported(_))));
        assert_eq!(Compression::ByteRun.to_byte(), 1);
    }

    #[test]
    fn uncompressed_rows_ignore_padding(){
        let rows = [1, 2, 3, 4, 0];
        let decoded = Compression::None.decompress_rows(&rows, 2, 2).unwrap();
        assert_eq!(decoded, [1, 2, 3, 4]);

        assert!(Compression::None.decompress_rows(&rows, 3, 2).is_err());
    }

    #[test]
    fn rows_roundtrip(){
        let rows: Vec<u8> = (0 .. 64_u8).map(|index| index / 5).collect();

        for &compression in &[Compression::None, Compression::ByteRun] {
            let compressed = compression.compress_rows(&rows, 16).unwrap();
            let decompressed = compression.decompress_rows(&compressed, 16, 4).unwrap();
            assert_eq!(decompressed, rows, "{}", compression);
        }
    }
}
